// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::errors::{AppError, AppResult};

pub const LAUNCHER_FILE_NAME: &str = "main.py";

/// Printed by the launcher right before the test runner starts.
pub const OUTPUT_MARKER: &str = "##### testjob: test runner output follows #####";

pub const DEFAULT_LAUNCHER: &str = include_str!("launcher/default_main.py");

pub fn launcher_parameters(
    remote_base: &str,
    folder: &str,
    runner_args: &[String],
) -> AppResult<Vec<String>> {
    let args = serde_json::to_string(runner_args)
        .map_err(|err| AppError::local(format!("failed to encode runner args: {err}")))?;
    Ok(vec![
        format!("--basedir={remote_base}"),
        format!("--folder={folder}"),
        format!("--pytestargs={args}"),
    ])
}
