// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::AppResult;
use crate::app::types::{InstancePool, RunOutput, RunSnapshot, Workflow};

#[async_trait]
/// Capability facade over the remote compute platform.
/// One client is built per process and shared as `Arc<dyn ClusterClientPort>`;
/// every failure surfaces the platform's error payload and is never retried here.
pub trait ClusterClientPort: Send + Sync {
    /// User name of the authenticated identity.
    async fn current_user(&self) -> AppResult<String>;

    async fn submit_run(&self, workflow: &Workflow) -> AppResult<i64>;
    async fn cancel_run(&self, run_id: i64) -> AppResult<()>;
    async fn get_run(&self, run_id: i64) -> AppResult<RunSnapshot>;
    async fn get_run_output(&self, task_run_id: i64) -> AppResult<RunOutput>;

    async fn list_instance_pools(&self) -> AppResult<Vec<InstancePool>>;

    /// Hierarchical workspace storage. Creating an existing directory is not an error.
    async fn workspace_mkdirs(&self, path: &str) -> AppResult<()>;
    async fn workspace_import(&self, path: &str, content: &[u8]) -> AppResult<()>;

    /// Flat object storage. Creating an existing directory is not an error.
    async fn object_mkdirs(&self, path: &str) -> AppResult<()>;
    async fn object_upload(&self, path: &str, content: &[u8]) -> AppResult<()>;
}
