// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Recording fakes shared by the use case and service tests.

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use time::macros::datetime;

use crate::app::errors::{AppError, AppResult, codes};
use crate::app::ports::{ClockPort, ClusterClientPort, SubmitHandoffPort};
use crate::app::types::{
    InstancePool, LifeCycleState, ResultState, RunOutput, RunSnapshot, RunState, RunTaskAttempt,
    Workflow,
};

#[derive(Default)]
pub(crate) struct FakeCluster {
    pub user: String,
    pub pools: Vec<InstancePool>,
    pub submit_error: Option<AppError>,
    pub next_run_id: i64,
    /// Served in order; the last one repeats.
    pub runs: Mutex<VecDeque<RunSnapshot>>,
    /// Per task run id, served in order; the last one repeats.
    pub outputs: Mutex<HashMap<i64, VecDeque<AppResult<RunOutput>>>>,
    pub calls: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
    pub submitted: Mutex<Vec<Workflow>>,
}

impl FakeCluster {
    pub fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
            next_run_id: 1001,
            ..Self::default()
        }
    }

    pub fn with_pools(mut self, pools: &[(&str, &str)]) -> Self {
        self.pools = pools
            .iter()
            .map(|(name, id)| InstancePool {
                instance_pool_name: name.to_string(),
                instance_pool_id: id.to_string(),
            })
            .collect();
        self
    }

    pub fn push_run(&self, snapshot: RunSnapshot) {
        self.runs.lock().unwrap().push_back(snapshot);
    }

    pub fn push_output(&self, task_run_id: i64, output: AppResult<RunOutput>) {
        self.outputs
            .lock()
            .unwrap()
            .entry(task_run_id)
            .or_default()
            .push_back(output);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn next_of<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[async_trait]
impl ClusterClientPort for FakeCluster {
    async fn current_user(&self) -> AppResult<String> {
        self.record("current_user".to_string());
        Ok(self.user.clone())
    }

    async fn submit_run(&self, workflow: &Workflow) -> AppResult<i64> {
        self.record("submit_run".to_string());
        if let Some(err) = &self.submit_error {
            return Err(err.clone());
        }
        self.submitted.lock().unwrap().push(workflow.clone());
        Ok(self.next_run_id)
    }

    async fn cancel_run(&self, run_id: i64) -> AppResult<()> {
        self.record(format!("cancel_run {run_id}"));
        Ok(())
    }

    async fn get_run(&self, run_id: i64) -> AppResult<RunSnapshot> {
        self.record(format!("get_run {run_id}"));
        next_of(&mut self.runs.lock().unwrap())
            .ok_or_else(|| AppError::remote(codes::NOT_FOUND, format!("run {run_id} not found")))
    }

    async fn get_run_output(&self, task_run_id: i64) -> AppResult<RunOutput> {
        self.record(format!("get_run_output {task_run_id}"));
        let mut outputs = self.outputs.lock().unwrap();
        match outputs.get_mut(&task_run_id).and_then(next_of) {
            Some(output) => output,
            None => Ok(RunOutput::default()),
        }
    }

    async fn list_instance_pools(&self) -> AppResult<Vec<InstancePool>> {
        self.record("list_instance_pools".to_string());
        Ok(self.pools.clone())
    }

    async fn workspace_mkdirs(&self, path: &str) -> AppResult<()> {
        self.record(format!("workspace_mkdirs {path}"));
        Ok(())
    }

    async fn workspace_import(&self, path: &str, content: &[u8]) -> AppResult<()> {
        self.record(format!("workspace_import {path}"));
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_string(), content.to_vec()));
        Ok(())
    }

    async fn object_mkdirs(&self, path: &str) -> AppResult<()> {
        self.record(format!("object_mkdirs {path}"));
        Ok(())
    }

    async fn object_upload(&self, path: &str, content: &[u8]) -> AppResult<()> {
        self.record(format!("object_upload {path}"));
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_string(), content.to_vec()));
        Ok(())
    }
}

pub(crate) struct FakeClock {
    pub now: OffsetDateTime,
    pub sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            now: datetime!(2026-10-18 09:41:07 UTC),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClockPort for FakeClock {
    fn now_utc(&self) -> OffsetDateTime {
        self.now
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Records the job file instead of replacing the process.
#[derive(Default)]
pub(crate) struct FakeHandoff {
    pub handed_off: Mutex<Vec<(PathBuf, String)>>,
}

impl SubmitHandoffPort for FakeHandoff {
    fn hand_off(&self, job_file: &Path) -> AppResult<Infallible> {
        let body = std::fs::read_to_string(job_file).unwrap_or_default();
        self.handed_off
            .lock()
            .unwrap()
            .push((job_file.to_path_buf(), body));
        Err(AppError::local("platform CLI not available in tests"))
    }
}

/// Hand-off port for tests that must never reach it.
pub(crate) struct PanicHandoff;

impl SubmitHandoffPort for PanicHandoff {
    fn hand_off(&self, _job_file: &Path) -> AppResult<Infallible> {
        panic!("hand_off should not be called")
    }
}

pub(crate) fn state(life: LifeCycleState, result: Option<ResultState>) -> RunState {
    RunState {
        life_cycle_state: life,
        result_state: result,
        state_message: None,
    }
}

pub(crate) fn attempt(key: &str, run_id: i64, number: i64, state: RunState) -> RunTaskAttempt {
    RunTaskAttempt {
        task_key: key.to_string(),
        run_id,
        attempt_number: number,
        state,
    }
}

pub(crate) fn snapshot(run_id: i64, state: RunState, tasks: Vec<RunTaskAttempt>) -> RunSnapshot {
    RunSnapshot {
        run_id,
        run_page_url: Some(format!("https://cluster.example/#job/runs/{run_id}")),
        state,
        tasks,
    }
}

pub(crate) fn logs(text: &str) -> AppResult<RunOutput> {
    Ok(RunOutput {
        logs: Some(text.to_string()),
        error: None,
    })
}
