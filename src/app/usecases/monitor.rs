// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::app::errors::{AppError, AppResult};
use crate::app::ports::{ClockPort, ClusterClientPort};
use crate::app::types::{RunPhase, RunSnapshot, RunTaskAttempt};

pub const LOG_UNAVAILABLE: &str = "[log unavailable]";

/// How long to wait for a finished task's output to materialise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl LogPollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    pub fn single() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// Latest attempt per task key, ordered by key. Ties keep the first listed.
pub fn latest_attempts(tasks: &[RunTaskAttempt]) -> Vec<&RunTaskAttempt> {
    let mut latest: BTreeMap<&str, &RunTaskAttempt> = BTreeMap::new();
    for task in tasks {
        match latest.get(task.task_key.as_str()) {
            Some(current) if current.attempt_number >= task.attempt_number => {}
            _ => {
                latest.insert(task.task_key.as_str(), task);
            }
        }
    }
    latest.into_values().collect()
}

pub struct RunMonitor {
    client: Arc<dyn ClusterClientPort>,
    clock: Arc<dyn ClockPort>,
    log_poll: Option<LogPollPolicy>,
    snapshot: RunSnapshot,
}

impl RunMonitor {
    pub async fn attach(
        client: Arc<dyn ClusterClientPort>,
        clock: Arc<dyn ClockPort>,
        run_id: i64,
        log_poll: Option<LogPollPolicy>,
    ) -> AppResult<Self> {
        let snapshot = client.get_run(run_id).await?;
        Ok(Self {
            client,
            clock,
            log_poll,
            snapshot,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.snapshot.run_id
    }

    pub fn snapshot(&self) -> &RunSnapshot {
        &self.snapshot
    }

    pub fn phase(&self) -> RunPhase {
        self.snapshot.state.phase()
    }

    pub async fn refresh(&mut self) -> AppResult<&RunSnapshot> {
        self.snapshot = self.client.get_run(self.snapshot.run_id).await?;
        Ok(&self.snapshot)
    }

    /// Requests cancellation unless the run already finished.
    /// Returns whether a cancel request was sent.
    pub async fn cancel(&mut self) -> AppResult<bool> {
        self.refresh().await?;
        if self.phase().is_terminal() {
            tracing::debug!(run_id = self.run_id(), "run already terminal; nothing to cancel");
            return Ok(false);
        }
        self.client.cancel_run(self.run_id()).await?;
        tracing::info!(run_id = self.run_id(), "cancellation requested");
        Ok(true)
    }

    pub async fn get_stdout(&mut self, task_key: &str) -> AppResult<String> {
        self.refresh().await?;
        let attempt = self.select_attempt(task_key)?;
        self.fetch_logs(task_key, attempt.run_id).await
    }

    fn select_attempt(&self, task_key: &str) -> AppResult<RunTaskAttempt> {
        let matching: Vec<&RunTaskAttempt> = self
            .snapshot
            .tasks
            .iter()
            .filter(|task| task.task_key == task_key)
            .collect();
        let Some(highest) = matching.iter().map(|task| task.attempt_number).max() else {
            return Err(AppError::invalid_argument(format!(
                "run {} has no task '{task_key}'",
                self.run_id()
            )));
        };
        let latest: Vec<&&RunTaskAttempt> = matching
            .iter()
            .filter(|task| task.attempt_number == highest)
            .collect();
        match latest.as_slice() {
            [only] => Ok((**only).clone()),
            _ => Err(AppError::invalid_argument(format!(
                "run {} has {} tasks '{task_key}' at attempt {highest}",
                self.run_id(),
                latest.len()
            ))),
        }
    }

    /// Polls run-output until logs appear. A not-found answer means "not yet";
    /// any other platform failure is returned as is.
    async fn fetch_logs(&self, task_key: &str, task_run_id: i64) -> AppResult<String> {
        let policy = self.log_poll.unwrap_or_else(LogPollPolicy::single);
        let mut last_problem = String::from("no log produced");
        for attempt in 1..=policy.max_attempts {
            match self.client.get_run_output(task_run_id).await {
                Ok(output) => match output.logs {
                    Some(logs) => return Ok(logs),
                    None => {
                        if let Some(error) = output.error {
                            last_problem = error;
                        }
                    }
                },
                Err(err) if err.is_not_found() => {
                    tracing::debug!(task = task_key, attempt, error = %err, "log not available yet");
                    last_problem = err.to_string();
                }
                Err(err) => return Err(err),
            }
            if attempt < policy.max_attempts {
                self.clock.sleep(policy.interval).await;
            }
        }
        tracing::warn!(
            task = task_key,
            attempts = policy.max_attempts,
            "giving up waiting for task log"
        );
        Ok(format!(
            "{LOG_UNAVAILABLE} task '{task_key}': {last_problem} after {} attempt(s)",
            policy.max_attempts
        ))
    }
}
