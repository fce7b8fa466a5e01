// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Turns parsed command-line arguments into use case requests.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::cli::{RunArgs, SubmitArgs};
use crate::app::errors::{AppError, AppResult};
use crate::app::types::SubmitMode;
use crate::app::usecases::SubmitRequest;
use crate::config::Config;

#[derive(Debug, Serialize, Deserialize)]
struct RunIdFile {
    run_id: i64,
}

pub fn build_submit_request(args: &SubmitArgs, config: &Config) -> AppResult<SubmitRequest> {
    let cluster = json_argument(args.cluster.as_deref(), args.cluster_file.as_deref(), "cluster")?
        .ok_or_else(|| AppError::invalid_argument("a cluster specification is required"))?;
    let libraries =
        json_argument(args.sparklibs.as_deref(), args.sparklibs_file.as_deref(), "sparklibs")?
            .unwrap_or_else(|| Value::Array(Vec::new()));
    let launcher = match &args.main_script {
        Some(path) => Some(read_text(path, "launcher script")?),
        None => None,
    };

    let mut request = SubmitRequest::new(&args.tests, cluster);
    request.tasks = args.tasks.clone();
    request.tasks_from = args.tasks_from.clone();
    request.wheels = args.wheels.clone();
    request.libraries = libraries;
    request.requirements = requirements_from(&args.requirements, args.requirements_file.as_deref())?;
    request.launcher = launcher;
    request.runner_args = args
        .pytest_args
        .as_deref()
        .map(|raw| raw.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    request.dry_run = args.dry_run;
    request.backend = config.upload_backend;
    request.mode = if args.no_wait {
        SubmitMode::Detached
    } else {
        SubmitMode::HandOff
    };
    request.run_name = args.run_name.clone();
    request.inspect_dir = inspect_dir(args.stage_dir.as_deref(), config.stage_dir.as_deref());
    request.stage_parent = config.stage_dir.clone();
    Ok(request)
}

fn inspect_dir(flag: Option<&Path>, configured_parent: Option<&Path>) -> Option<PathBuf> {
    match (flag, configured_parent) {
        (Some(dir), _) => Some(dir.to_path_buf()),
        (None, Some(parent)) => Some(parent.join(format!("dry-run-{}", std::process::id()))),
        (None, None) => None,
    }
}

/// Reads a JSON value given inline or as a file; at most one may be set.
pub fn json_argument(inline: Option<&str>, file: Option<&Path>, what: &str) -> AppResult<Option<Value>> {
    let (text, origin) = match (inline, file) {
        (Some(_), Some(_)) => {
            return Err(AppError::invalid_argument(format!(
                "--{what} and --{what}-file are mutually exclusive"
            )));
        }
        (Some(text), None) => (text.to_string(), format!("--{what}")),
        (None, Some(path)) => (read_text(path, what)?, path.display().to_string()),
        (None, None) => return Ok(None),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|err| AppError::invalid_argument(format!("{origin} is not valid JSON: {err}")))
}

pub fn requirements_from(inline: &[String], file: Option<&Path>) -> AppResult<Vec<String>> {
    let mut requirements: Vec<String> = inline
        .iter()
        .map(|req| req.trim().to_string())
        .filter(|req| !req.is_empty())
        .collect();
    if let Some(path) = file {
        requirements.extend(parse_requirements(&read_text(path, "requirements file")?));
    }
    Ok(requirements)
}

/// One requirement per line; blank lines and `#` comments are skipped.
/// A `#` only starts a comment at the line start or after whitespace, so URL
/// fragments such as `#egg=` survive.
pub fn parse_requirements(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_comment)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_comment(line: &str) -> &str {
    let line = line.trim();
    if line.starts_with('#') {
        return "";
    }
    match line.find(" #").or_else(|| line.find("\t#")) {
        Some(idx) => line[..idx].trim(),
        None => line,
    }
}

pub fn run_id_from(args: &RunArgs) -> AppResult<i64> {
    match (args.runid, &args.runid_json) {
        (Some(run_id), None) => Ok(run_id),
        (None, Some(path)) => {
            let text = read_text(path, "run id file")?;
            let parsed: RunIdFile = serde_json::from_str(&text).map_err(|err| {
                AppError::invalid_argument(format!(
                    "{} does not hold a run id: {err}",
                    path.display()
                ))
            })?;
            Ok(parsed.run_id)
        }
        _ => Err(AppError::invalid_argument(
            "exactly one of --runid and --runid-json is required",
        )),
    }
}

pub fn write_run_id(path: &Path, run_id: i64) -> AppResult<()> {
    let body = serde_json::to_string(&RunIdFile { run_id })
        .map_err(|err| AppError::local(format!("failed to encode run id: {err}")))?;
    fs::write(path, body)
        .map_err(|err| AppError::local(format!("failed to write {}: {err}", path.display())))
}

fn read_text(path: &Path, what: &str) -> AppResult<String> {
    fs::read_to_string(path).map_err(|err| {
        AppError::invalid_argument(format!("cannot read {what} {}: {err}", path.display()))
    })
}
