// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const MULTI_TASK_FORMAT: &str = "MULTI_TASK";
pub const DEFAULT_RUN_NAME: &str = "Testing Run";

/// Remote storage flavour used for staged artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadBackend {
    /// Hierarchical storage rooted in the user's workspace home.
    #[default]
    Workspace,
    /// Flat, prefix-rooted object storage.
    ObjectStore,
}

impl UploadBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadBackend::Workspace => "workspace",
            UploadBackend::ObjectStore => "object-store",
        }
    }
}

impl fmt::Display for UploadBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "workspace" => Ok(UploadBackend::Workspace),
            "object-store" | "objectstore" | "dbfs" => Ok(UploadBackend::ObjectStore),
            other => Err(format!(
                "unknown upload backend '{other}'; expected 'workspace' or 'object-store'"
            )),
        }
    }
}

/// What happens after a live upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// Submit, return the run id and let the caller poll later.
    Detached,
    /// Replace this process with the platform CLI's waiting submit.
    HandOff,
}

/// A staged artifact: where it lives locally and where it will live remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub remote: String,
    pub local: PathBuf,
}

/// A task path that passed containment validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTask {
    /// Posix path relative to the parent of the test tree, e.g. `tests/unit`.
    pub path: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub run_name: String,
    pub format: String,
    pub tasks: Vec<TaskEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub task_key: String,
    pub libraries: Vec<serde_json::Value>,
    pub spark_python_task: PythonTask,
    pub new_cluster: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PythonTask {
    pub python_file: String,
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstancePool {
    pub instance_pool_name: String,
    pub instance_pool_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifeCycleState {
    #[default]
    Pending,
    Queued,
    Blocked,
    WaitingForRetry,
    Running,
    Terminating,
    Terminated,
    Skipped,
    InternalError,
    #[serde(other)]
    Unknown,
}

impl LifeCycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifeCycleState::Pending => "PENDING",
            LifeCycleState::Queued => "QUEUED",
            LifeCycleState::Blocked => "BLOCKED",
            LifeCycleState::WaitingForRetry => "WAITING_FOR_RETRY",
            LifeCycleState::Running => "RUNNING",
            LifeCycleState::Terminating => "TERMINATING",
            LifeCycleState::Terminated => "TERMINATED",
            LifeCycleState::Skipped => "SKIPPED",
            LifeCycleState::InternalError => "INTERNAL_ERROR",
            LifeCycleState::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultState {
    Success,
    Failed,
    Timedout,
    Canceled,
    MaximumConcurrentRunsReached,
    Excluded,
    SuccessWithFailures,
    UpstreamFailed,
    UpstreamCanceled,
    #[serde(other)]
    Unknown,
}

impl ResultState {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultState::Success => "SUCCESS",
            ResultState::Failed => "FAILED",
            ResultState::Timedout => "TIMEDOUT",
            ResultState::Canceled => "CANCELED",
            ResultState::MaximumConcurrentRunsReached => "MAXIMUM_CONCURRENT_RUNS_REACHED",
            ResultState::Excluded => "EXCLUDED",
            ResultState::SuccessWithFailures => "SUCCESS_WITH_FAILURES",
            ResultState::UpstreamFailed => "UPSTREAM_FAILED",
            ResultState::UpstreamCanceled => "UPSTREAM_CANCELED",
            ResultState::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub life_cycle_state: LifeCycleState,
    #[serde(default)]
    pub result_state: Option<ResultState>,
    #[serde(default)]
    pub state_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Submitted,
    Running,
    Terminated(RunOutcome),
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Terminated(_))
    }
}

impl RunState {
    pub fn phase(&self) -> RunPhase {
        match self.life_cycle_state {
            LifeCycleState::Pending
            | LifeCycleState::Queued
            | LifeCycleState::Blocked
            | LifeCycleState::WaitingForRetry
            | LifeCycleState::Unknown => RunPhase::Submitted,
            LifeCycleState::Running | LifeCycleState::Terminating => RunPhase::Running,
            LifeCycleState::Skipped | LifeCycleState::InternalError => {
                RunPhase::Terminated(RunOutcome::Failed)
            }
            LifeCycleState::Terminated => match self.result_state {
                Some(ResultState::Success) => RunPhase::Terminated(RunOutcome::Success),
                Some(ResultState::Canceled) => RunPhase::Terminated(RunOutcome::Cancelled),
                _ => RunPhase::Terminated(RunOutcome::Failed),
            },
        }
    }

    /// Short label used in status summaries: the result if known, else the life cycle.
    pub fn label(&self) -> String {
        match self.result_state {
            Some(result) => result.as_str().to_string(),
            None => self.life_cycle_state.as_str().to_string(),
        }
    }
}

/// One attempt of one task inside a run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunTaskAttempt {
    pub task_key: String,
    /// Run id of this task attempt; used to query its output.
    pub run_id: i64,
    #[serde(default)]
    pub attempt_number: i64,
    #[serde(default)]
    pub state: RunState,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunSnapshot {
    pub run_id: i64,
    #[serde(default)]
    pub run_page_url: Option<String>,
    #[serde(default)]
    pub state: RunState,
    #[serde(default)]
    pub tasks: Vec<RunTaskAttempt>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunOutput {
    #[serde(default)]
    pub logs: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_backend_parses_aliases() {
        assert_eq!(
            "workspace".parse::<UploadBackend>(),
            Ok(UploadBackend::Workspace)
        );
        assert_eq!(
            "DBFS".parse::<UploadBackend>(),
            Ok(UploadBackend::ObjectStore)
        );
        assert!("s3".parse::<UploadBackend>().is_err());
    }

    #[test]
    fn run_snapshot_deserializes_platform_payload() {
        let raw = r#"{
            "run_id": 42,
            "run_page_url": "https://example/run/42",
            "state": {"life_cycle_state": "TERMINATED", "result_state": "SUCCESS"},
            "tasks": [
                {"task_key": "tests_unit", "run_id": 43, "attempt_number": 0,
                 "state": {"life_cycle_state": "TERMINATED", "result_state": "SUCCESS"}},
                {"task_key": "tests_other", "run_id": 44,
                 "state": {"life_cycle_state": "SOMETHING_NEW"}}
            ]
        }"#;
        let snapshot: RunSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snapshot.run_id, 42);
        assert_eq!(
            snapshot.state.phase(),
            RunPhase::Terminated(RunOutcome::Success)
        );
        assert_eq!(snapshot.tasks[1].attempt_number, 0);
        assert_eq!(
            snapshot.tasks[1].state.life_cycle_state,
            LifeCycleState::Unknown
        );
    }

    #[test]
    fn phase_mapping_covers_terminal_states() {
        let state = |life, result| RunState {
            life_cycle_state: life,
            result_state: result,
            state_message: None,
        };
        assert_eq!(
            state(LifeCycleState::Pending, None).phase(),
            RunPhase::Submitted
        );
        assert_eq!(
            state(LifeCycleState::Terminating, None).phase(),
            RunPhase::Running
        );
        assert_eq!(
            state(LifeCycleState::Terminated, Some(ResultState::Canceled)).phase(),
            RunPhase::Terminated(RunOutcome::Cancelled)
        );
        assert_eq!(
            state(LifeCycleState::Terminated, Some(ResultState::Timedout)).phase(),
            RunPhase::Terminated(RunOutcome::Failed)
        );
        assert_eq!(
            state(LifeCycleState::InternalError, None).phase(),
            RunPhase::Terminated(RunOutcome::Failed)
        );
    }

    #[test]
    fn label_prefers_result_state() {
        let running = RunState {
            life_cycle_state: LifeCycleState::Running,
            result_state: None,
            state_message: None,
        };
        assert_eq!(running.label(), "RUNNING");
        let done = RunState {
            life_cycle_state: LifeCycleState::Terminated,
            result_state: Some(ResultState::Failed),
            state_message: None,
        };
        assert_eq!(done.label(), "FAILED");
    }

    #[test]
    fn workflow_serializes_fields_in_document_order() {
        let workflow = Workflow {
            run_name: DEFAULT_RUN_NAME.to_string(),
            format: MULTI_TASK_FORMAT.to_string(),
            tasks: vec![],
        };
        let text = serde_json::to_string(&workflow).unwrap();
        assert_eq!(
            text,
            r#"{"run_name":"Testing Run","format":"MULTI_TASK","tasks":[]}"#
        );
    }
}
