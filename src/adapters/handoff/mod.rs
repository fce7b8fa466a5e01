// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::convert::Infallible;
use std::path::Path;
use std::process::Command;

use crate::app::errors::{AppError, AppResult};
use crate::app::ports::SubmitHandoffPort;
use crate::config::{HOST_ENV_VAR, TOKEN_ENV_VAR};

/// Replaces this process with `<cli> jobs submit --json=@<job file>`, which
/// submits the run and waits for it.
pub struct CliHandoff {
    binary: String,
    host: Option<String>,
    token: Option<String>,
}

impl CliHandoff {
    pub fn new(binary: &str, host: Option<String>, token: Option<String>) -> Self {
        Self {
            binary: binary.to_string(),
            host,
            token,
        }
    }

    pub fn command(&self, job_file: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("jobs")
            .arg("submit")
            .arg(format!("--json=@{}", job_file.display()));
        if let Some(host) = &self.host {
            command.env(HOST_ENV_VAR, host);
        }
        if let Some(token) = &self.token {
            command.env(TOKEN_ENV_VAR, token);
        }
        command
    }

    fn launch_error(&self, err: std::io::Error) -> AppError {
        AppError::local(format!(
            "failed to launch '{}': {err}; is the platform CLI installed and on PATH?",
            self.binary
        ))
    }
}

impl SubmitHandoffPort for CliHandoff {
    fn hand_off(&self, job_file: &Path) -> AppResult<Infallible> {
        tracing::debug!(binary = %self.binary, job_file = %job_file.display(), "exec platform CLI");
        exec(self, self.command(job_file))
    }
}

#[cfg(unix)]
fn exec(handoff: &CliHandoff, mut command: Command) -> AppResult<Infallible> {
    use std::os::unix::process::CommandExt;

    let err = command.exec();
    Err(handoff.launch_error(err))
}

#[cfg(not(unix))]
fn exec(handoff: &CliHandoff, mut command: Command) -> AppResult<Infallible> {
    let status = command
        .status()
        .map_err(|err| handoff.launch_error(err))?;
    std::process::exit(status.code().unwrap_or(crate::app::errors::EXIT_CODE_OTHER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn command_points_the_cli_at_the_job_file() {
        let handoff = CliHandoff::new(
            "databricks",
            Some("https://adb-1.example".to_string()),
            None,
        );
        let command = handoff.command(Path::new("/tmp/stage/job.json"));

        assert_eq!(command.get_program(), "databricks");
        let args: Vec<&OsStr> = command.get_args().collect();
        assert_eq!(args, ["jobs", "submit", "--json=@/tmp/stage/job.json"]);
        let envs: Vec<_> = command.get_envs().collect();
        assert_eq!(
            envs,
            [(OsStr::new(HOST_ENV_VAR), Some(OsStr::new("https://adb-1.example")))]
        );
    }

    #[test]
    fn missing_binary_is_reported_instead_of_exiting() {
        let handoff = CliHandoff::new("/nonexistent/testjob-platform-cli", None, None);
        let err = handoff
            .hand_off(Path::new("/tmp/job.json"))
            .unwrap_err();
        assert!(err.message().contains("failed to launch"));
    }
}
