// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use crate::app::errors::{AppError, AppResult};
use crate::app::ports::{ClockPort, ClusterClientPort};
use crate::app::services::sanitizer;
use crate::app::types::{RunOutcome, RunPhase, RunSnapshot};
use crate::app::usecases::monitor::{LogPollPolicy, RunMonitor, latest_attempts};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Cancel the run as soon as one task fails.
    pub fail_fast: bool,
    pub poll_interval: Duration,
}

/// Follows a run to completion and prints each finished task's log once.
pub struct Fetcher {
    client: Arc<dyn ClusterClientPort>,
    clock: Arc<dyn ClockPort>,
    log_poll: Option<LogPollPolicy>,
}

impl Fetcher {
    pub fn new(
        client: Arc<dyn ClusterClientPort>,
        clock: Arc<dyn ClockPort>,
        log_poll: Option<LogPollPolicy>,
    ) -> Self {
        Self {
            client,
            clock,
            log_poll,
        }
    }

    /// Status lines go to `status`; cleaned task logs go to `logs`, or to
    /// `status` when no separate sink is given.
    #[tracing::instrument(name = "fetch", skip(self, options, status, logs))]
    pub async fn fetch(
        &self,
        run_id: i64,
        options: FetchOptions,
        status: &mut (dyn Write + Send),
        mut logs: Option<&mut (dyn Write + Send)>,
    ) -> AppResult<RunOutcome> {
        let mut monitor = RunMonitor::attach(
            self.client.clone(),
            self.clock.clone(),
            run_id,
            self.log_poll,
        )
        .await?;
        let url = monitor
            .snapshot()
            .run_page_url
            .clone()
            .unwrap_or_else(|| format!("run {run_id}"));
        emit(status, &format!("Job details: {url}"))?;

        let mut reported: HashSet<i64> = HashSet::new();
        let mut last_summary = String::new();
        let mut cancelled = false;
        loop {
            let snapshot = monitor.snapshot().clone();
            let summary = summarize(&snapshot);
            if summary != last_summary {
                emit(status, &summary)?;
                last_summary = summary;
            }

            for task in latest_attempts(&snapshot.tasks) {
                if !task.state.phase().is_terminal() || !reported.insert(task.run_id) {
                    continue;
                }
                emit(status, &format!("Getting stdout for {}", task.task_key))?;
                let raw = monitor.get_stdout(&task.task_key).await?;
                let cleaned = sanitizer::clean(&raw);
                match logs.as_deref_mut() {
                    Some(sink) => emit_raw(sink, &cleaned)?,
                    None => emit_raw(status, &cleaned)?,
                }

                let failed = task.state.phase() != RunPhase::Terminated(RunOutcome::Success);
                if options.fail_fast && failed && !cancelled && !snapshot.state.phase().is_terminal()
                {
                    tracing::warn!(task = %task.task_key, "task failed; cancelling run");
                    emit(status, &format!("Task {} failed, cancelling run", task.task_key))?;
                    monitor.cancel().await?;
                    cancelled = true;
                }
            }

            if let RunPhase::Terminated(outcome) = snapshot.state.phase() {
                emit(status, &format!("Run result {}!", snapshot.state.label()))?;
                return Ok(outcome);
            }
            self.clock.sleep(options.poll_interval).await;
            monitor.refresh().await?;
        }
    }
}

/// `Overall state: RUNNING | Task states: PENDING: 1, SUCCESS: 2`
pub fn summarize(snapshot: &RunSnapshot) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for task in latest_attempts(&snapshot.tasks) {
        *counts.entry(task.state.label()).or_default() += 1;
    }
    let tasks: Vec<String> = counts
        .iter()
        .map(|(label, count)| format!("{label}: {count}"))
        .collect();
    format!(
        "Overall state: {} | Task states: {}",
        snapshot.state.label(),
        tasks.join(", ")
    )
}

fn emit(out: &mut (dyn Write + Send), line: &str) -> AppResult<()> {
    writeln!(out, "{line}").map_err(write_error)
}

fn emit_raw(out: &mut (dyn Write + Send), text: &str) -> AppResult<()> {
    out.write_all(text.as_bytes()).map_err(write_error)?;
    if !text.ends_with('\n') {
        out.write_all(b"\n").map_err(write_error)?;
    }
    out.flush().map_err(write_error)
}

fn write_error(err: std::io::Error) -> AppError {
    AppError::local(format!("failed to write output: {err}"))
}
