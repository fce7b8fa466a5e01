// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::OnceCell;

use crate::app::errors::{AppError, AppResult};
use crate::app::ports::ClusterClientPort;

/// Prefix of a by-name instance pool reference inside a compute spec.
pub const POOL_MARKER: &str = "instance-pool://";

/// Compute-spec keys that may carry a pool reference.
pub const POOL_KEYS: [&str; 2] = ["instance_pool_id", "driver_instance_pool_id"];

/// Resolves `instance-pool://<name>` references to platform pool ids.
/// The name index is fetched on the first marker lookup and reused afterwards.
pub struct PoolResolver {
    client: Arc<dyn ClusterClientPort>,
    index: OnceCell<BTreeMap<String, String>>,
}

impl PoolResolver {
    pub fn new(client: Arc<dyn ClusterClientPort>) -> Self {
        Self {
            client,
            index: OnceCell::new(),
        }
    }

    pub async fn lookup(&self, reference: &str) -> AppResult<String> {
        let Some(name) = reference.strip_prefix(POOL_MARKER) else {
            return Ok(reference.to_string());
        };
        let index = self.index().await?;
        match index.get(name) {
            Some(id) => {
                tracing::debug!(pool = name, id = %id, "resolved instance pool");
                Ok(id.clone())
            }
            None => {
                let known: Vec<&str> = index.keys().map(String::as_str).collect();
                Err(AppError::invalid_argument(format!(
                    "instance pool '{name}' not found; known pools: [{}]",
                    known.join(", ")
                )))
            }
        }
    }

    /// Returns a copy of `spec` with every pool reference resolved.
    pub async fn resolve_compute_spec(&self, spec: &Value) -> AppResult<Value> {
        let mut resolved = spec.clone();
        let Some(fields) = resolved.as_object_mut() else {
            return Err(AppError::invalid_argument(
                "cluster specification must be a JSON object",
            ));
        };
        for key in POOL_KEYS {
            let Some(value) = fields.get(key) else {
                continue;
            };
            let Some(reference) = value.as_str() else {
                return Err(AppError::invalid_argument(format!(
                    "cluster field '{key}' must be a string"
                )));
            };
            let id = self.lookup(reference).await?;
            fields.insert(key.to_string(), Value::String(id));
        }
        Ok(resolved)
    }

    async fn index(&self) -> AppResult<&BTreeMap<String, String>> {
        self.index
            .get_or_try_init(|| async {
                let pools = self.client.list_instance_pools().await?;
                tracing::debug!(count = pools.len(), "listed instance pools");
                Ok::<_, AppError>(
                    pools
                        .into_iter()
                        .map(|pool| (pool.instance_pool_name, pool.instance_pool_id))
                        .collect(),
                )
            })
            .await
    }
}
