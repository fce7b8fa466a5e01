// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Value, json};

use crate::app::errors::{AppError, AppResult};
use crate::app::ports::{ClockPort, ClusterClientPort, SubmitHandoffPort};
use crate::app::services::archive::{self, ARCHIVE_FILE_NAME};
use crate::app::services::launcher::{self, DEFAULT_LAUNCHER, LAUNCHER_FILE_NAME};
use crate::app::services::pools::PoolResolver;
use crate::app::services::random;
use crate::app::services::remote_location::{RemoteLocation, backend_for};
use crate::app::services::staging::{StagingArea, StagingMode};
use crate::app::services::tasks;
use crate::app::types::{
    DEFAULT_RUN_NAME, MULTI_TASK_FORMAT, PythonTask, ResolvedTask, SubmitMode, TaskEntry,
    UploadBackend, Workflow,
};

/// Job document name at the staging root; never uploaded.
pub const JOB_FILE_NAME: &str = "job.json";
pub const DEFAULT_WHEEL_GLOB: &str = "dist/*.whl";
const WHEEL_DIR: &str = "libs";

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub tests_root: PathBuf,
    pub tasks: Vec<PathBuf>,
    pub tasks_from: Vec<PathBuf>,
    pub wheels: String,
    /// Compute spec template; must be a JSON object.
    pub cluster: Value,
    /// Extra dependency specs; must be a JSON array of objects.
    pub libraries: Value,
    pub requirements: Vec<String>,
    /// Launcher script content; the built-in launcher when absent.
    pub launcher: Option<String>,
    pub runner_args: Vec<String>,
    pub dry_run: bool,
    pub backend: UploadBackend,
    pub mode: SubmitMode,
    pub run_name: String,
    /// Where a dry run keeps its staging area.
    pub inspect_dir: Option<PathBuf>,
    /// Parent of the temporary staging area of a live submit.
    pub stage_parent: Option<PathBuf>,
}

impl SubmitRequest {
    pub fn new(tests_root: impl Into<PathBuf>, cluster: Value) -> Self {
        Self {
            tests_root: tests_root.into(),
            tasks: Vec::new(),
            tasks_from: Vec::new(),
            wheels: DEFAULT_WHEEL_GLOB.to_string(),
            cluster,
            libraries: Value::Array(Vec::new()),
            requirements: Vec::new(),
            launcher: None,
            runner_args: Vec::new(),
            dry_run: false,
            backend: UploadBackend::default(),
            mode: SubmitMode::Detached,
            run_name: DEFAULT_RUN_NAME.to_string(),
            inspect_dir: None,
            stage_parent: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    DryRun {
        document: String,
        stage_dir: PathBuf,
        remote_base: String,
    },
    Submitted {
        run_id: i64,
        run_page_url: Option<String>,
        remote_base: String,
    },
}

enum Staged {
    Finished(SubmitOutcome),
    /// Uploaded; the document still has to reach the platform CLI.
    HandOff(String),
}

struct SubmitPlan {
    tree_root: PathBuf,
    tasks: Vec<ResolvedTask>,
    cluster: Value,
    libraries: Vec<Value>,
}

pub struct Submitter {
    client: Arc<dyn ClusterClientPort>,
    clock: Arc<dyn ClockPort>,
    handoff: Arc<dyn SubmitHandoffPort>,
}

impl Submitter {
    pub fn new(
        client: Arc<dyn ClusterClientPort>,
        clock: Arc<dyn ClockPort>,
        handoff: Arc<dyn SubmitHandoffPort>,
    ) -> Self {
        Self {
            client,
            clock,
            handoff,
        }
    }

    #[tracing::instrument(name = "submit", skip_all, fields(tests = %request.tests_root.display(), dry_run = request.dry_run))]
    pub async fn submit(&self, request: &SubmitRequest) -> AppResult<SubmitOutcome> {
        let plan = plan(request)?;
        let key = random::unique_key(self.clock.now_utc())?;
        let mode = if request.dry_run {
            StagingMode::Retained(
                request
                    .inspect_dir
                    .clone()
                    .unwrap_or_else(|| std::env::temp_dir().join(format!("testjob-{key}"))),
            )
        } else {
            StagingMode::Ephemeral {
                parent: request.stage_parent.clone(),
            }
        };

        let area = StagingArea::acquire(mode)?;
        let result = self.submit_staged(request, &plan, &key, area.path()).await;
        match area.release() {
            Ok(Some(path)) => tracing::info!(path = %path.display(), "staging area kept"),
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, "failed to remove staging area"),
        }

        match result? {
            Staged::Finished(outcome) => Ok(outcome),
            Staged::HandOff(document) => self.hand_off(request, &document),
        }
    }

    /// Writes the job document to a standalone file and passes it to the
    /// platform CLI. The file outlives this process on success.
    fn hand_off(&self, request: &SubmitRequest, document: &str) -> AppResult<SubmitOutcome> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("testjob-job-").suffix(".json");
        let file = match &request.stage_parent {
            Some(parent) => builder.tempfile_in(parent),
            None => builder.tempfile(),
        }
        .map_err(|err| AppError::local(format!("failed to create job file: {err}")))?;
        fs::write(file.path(), document).map_err(|err| {
            AppError::local(format!(
                "failed to write {}: {err}",
                file.path().display()
            ))
        })?;
        let (_, job_file) = file
            .keep()
            .map_err(|err| AppError::local(format!("failed to keep job file: {err}")))?;

        tracing::info!(job_file = %job_file.display(), "handing off to platform CLI");
        let err = match self.handoff.hand_off(&job_file) {
            Ok(never) => match never {},
            Err(err) => err,
        };
        if let Err(remove_err) = fs::remove_file(&job_file) {
            tracing::warn!(job_file = %job_file.display(), error = %remove_err, "failed to remove job file");
        }
        Err(err)
    }

    async fn submit_staged(
        &self,
        request: &SubmitRequest,
        plan: &SubmitPlan,
        key: &str,
        stage_root: &Path,
    ) -> AppResult<Staged> {
        let owner = self.client.current_user().await?;
        let cluster = PoolResolver::new(self.client.clone())
            .resolve_compute_spec(&plan.cluster)
            .await?;

        let backend = backend_for(request.backend, self.client.clone(), &owner, key);
        let location = RemoteLocation::new(stage_root, backend)?;
        let remote_base = location.remote_base();
        tracing::info!(remote_base = %remote_base, backend = %request.backend, "staging artifacts");

        let mut libraries = stage_wheels(&request.wheels, &location)?;
        libraries.extend(plan.libraries.iter().cloned());

        let archive = location.new_local_file(ARCHIVE_FILE_NAME)?;
        archive::create_tree_archive(&plan.tree_root, &archive.local)?;

        let launcher = location.new_local_file(LAUNCHER_FILE_NAME)?;
        let script = request.launcher.as_deref().unwrap_or(DEFAULT_LAUNCHER);
        fs::write(&launcher.local, script).map_err(|err| {
            AppError::local(format!(
                "failed to stage launcher {}: {err}",
                launcher.local.display()
            ))
        })?;

        let workflow = build_workflow(
            &request.run_name,
            &plan.tasks,
            &libraries,
            &launcher.remote,
            &remote_base,
            &request.runner_args,
            &cluster,
        )?;
        let document = serde_json::to_string_pretty(&workflow)
            .map_err(|err| AppError::local(format!("failed to encode job document: {err}")))?;
        let job_file = stage_root.join(JOB_FILE_NAME);
        fs::write(&job_file, &document).map_err(|err| {
            AppError::local(format!("failed to write {}: {err}", job_file.display()))
        })?;

        if request.dry_run {
            return Ok(Staged::Finished(SubmitOutcome::DryRun {
                document,
                stage_dir: stage_root.to_path_buf(),
                remote_base,
            }));
        }

        location.upload().await?;

        match request.mode {
            SubmitMode::Detached => {
                let run_id = match self.client.submit_run(&workflow).await {
                    Ok(run_id) => run_id,
                    Err(err) => {
                        tracing::error!(error = %err, document = %document, "job submission rejected");
                        return Err(err);
                    }
                };
                tracing::info!(run_id, tasks = workflow.tasks.len(), "submitted run");
                let run_page_url = match self.client.get_run(run_id).await {
                    Ok(snapshot) => snapshot.run_page_url,
                    Err(err) => {
                        tracing::warn!(run_id, error = %err, "failed to look up run page");
                        None
                    }
                };
                Ok(Staged::Finished(SubmitOutcome::Submitted {
                    run_id,
                    run_page_url,
                    remote_base,
                }))
            }
            SubmitMode::HandOff => Ok(Staged::HandOff(document)),
        }
    }
}

fn plan(request: &SubmitRequest) -> AppResult<SubmitPlan> {
    let tree_root = tasks::canonical_tree_root(&request.tests_root)?;
    if !request.cluster.is_object() {
        return Err(AppError::invalid_argument(
            "cluster specification must be a JSON object",
        ));
    }

    let mut libraries = match &request.libraries {
        Value::Null => Vec::new(),
        Value::Array(items) => {
            if let Some(pos) = items.iter().position(|item| !item.is_object()) {
                return Err(AppError::invalid_argument(format!(
                    "library specification #{} must be a JSON object",
                    pos + 1
                )));
            }
            items.clone()
        }
        _ => {
            return Err(AppError::invalid_argument(
                "library specifications must be a JSON array",
            ));
        }
    };
    for requirement in &request.requirements {
        let requirement = requirement.trim();
        if !requirement.is_empty() {
            libraries.push(json!({ "pypi": { "package": requirement } }));
        }
    }

    let tasks = tasks::resolve_all(&tree_root, &request.tasks, &request.tasks_from)?;
    Ok(SubmitPlan {
        tree_root,
        tasks,
        cluster: request.cluster.clone(),
        libraries,
    })
}

fn stage_wheels(pattern: &str, location: &RemoteLocation) -> AppResult<Vec<Value>> {
    let paths = glob::glob(pattern).map_err(|err| {
        AppError::invalid_argument(format!("invalid wheel pattern '{pattern}': {err}"))
    })?;
    let mut wheels = Vec::new();
    for path in paths {
        let path = path.map_err(|err| AppError::local(format!("failed to match wheels: {err}")))?;
        if !path.is_file() {
            continue;
        }
        let remote = location.add_local_path(&path, Some(WHEEL_DIR))?;
        tracing::debug!(wheel = %path.display(), remote = %remote, "staged wheel");
        wheels.push(json!({ "whl": remote }));
    }
    if wheels.is_empty() {
        tracing::debug!(pattern, "no wheels matched");
    }
    Ok(wheels)
}

/// One task entry per resolved task, all sharing libraries, launcher and compute spec.
pub fn build_workflow(
    run_name: &str,
    tasks: &[ResolvedTask],
    libraries: &[Value],
    launcher_remote: &str,
    remote_base: &str,
    runner_args: &[String],
    cluster: &Value,
) -> AppResult<Workflow> {
    let mut entries = Vec::with_capacity(tasks.len());
    for task in tasks {
        entries.push(TaskEntry {
            task_key: task.key.clone(),
            libraries: libraries.to_vec(),
            spark_python_task: PythonTask {
                python_file: launcher_remote.to_string(),
                parameters: launcher::launcher_parameters(remote_base, &task.path, runner_args)?,
            },
            new_cluster: cluster.clone(),
        });
    }
    Ok(Workflow {
        run_name: run_name.to_string(),
        format: MULTI_TASK_FORMAT.to_string(),
        tasks: entries,
    })
}
