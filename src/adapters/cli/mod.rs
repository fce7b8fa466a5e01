// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod inputs;

use std::path::PathBuf;

use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand};

use crate::app::types::{DEFAULT_RUN_NAME, UploadBackend};
use crate::app::usecases::submit::DEFAULT_WHEEL_GLOB;

#[derive(Parser)]
#[command(
    name = "testjob",
    version,
    about = "Run a test suite as a remote job on a managed compute cluster",
    long_about = None,
    after_help = "Configuration precedence: defaults < config file < DATABRICKS_HOST/DATABRICKS_TOKEN < command-line flags.\n\
Config path precedence: default location < TESTJOB_CONFIG_PATH < --config.\n\
Logs go to stderr; set TESTJOB_LOG, TESTJOB_LOG_FORMAT (json|pretty|compact) or TESTJOB_LOG_FILE to adjust them."
)]
pub struct Opts {
    #[arg(
        short,
        long,
        global = true,
        value_name = "PATH",
        help = "Path to a TOML config file. When omitted, testjob uses TESTJOB_CONFIG_PATH if set, otherwise the default config file location if available."
    )]
    pub config: Option<PathBuf>,
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::SetTrue,
        help = "Enable debug logging. Overrides `verbose` from the config file."
    )]
    pub verbose: bool,
    #[arg(
        long,
        global = true,
        value_name = "URL",
        help = "Workspace URL. Overrides DATABRICKS_HOST and `host` from the config file."
    )]
    pub host: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Stage the test tree and submit one task per test folder.
    Submit(SubmitArgs),
    /// Follow a submitted run and print each task's test output.
    Fetch(FetchArgs),
    /// Cancel a submitted run.
    Cancel(RunArgs),
}

#[derive(Args)]
pub struct SubmitArgs {
    #[arg(long, value_name = "DIR", help = "Root of the test tree to archive.")]
    pub tests: PathBuf,
    #[arg(
        long = "task",
        value_name = "PATH",
        help = "Test folder to run as one task, e.g. tests/unit. Repeatable."
    )]
    pub tasks: Vec<PathBuf>,
    #[arg(
        long = "tasks-from",
        value_name = "DIR",
        help = "Run every non-hidden subfolder of DIR as its own task. Repeatable."
    )]
    pub tasks_from: Vec<PathBuf>,
    #[arg(
        long,
        value_name = "JSON",
        conflicts_with = "cluster_file",
        required_unless_present = "cluster_file",
        help = "Cluster specification as a JSON object. Pool ids may be given as instance-pool://<name>."
    )]
    pub cluster: Option<String>,
    #[arg(long, value_name = "FILE", help = "Read the cluster specification from FILE.")]
    pub cluster_file: Option<PathBuf>,
    #[arg(
        long,
        value_name = "JSON",
        conflicts_with = "sparklibs_file",
        help = "Extra libraries as a JSON array of library specifications."
    )]
    pub sparklibs: Option<String>,
    #[arg(long, value_name = "FILE", help = "Read extra libraries from FILE.")]
    pub sparklibs_file: Option<PathBuf>,
    #[arg(
        long = "requirement",
        value_name = "REQ",
        conflicts_with = "requirements_file",
        help = "Python package requirement to install on the cluster. Repeatable."
    )]
    pub requirements: Vec<String>,
    #[arg(
        long,
        value_name = "FILE",
        help = "Read requirements from FILE, one per line; blank lines and # comments are ignored."
    )]
    pub requirements_file: Option<PathBuf>,
    #[arg(
        long,
        value_name = "GLOB",
        default_value = DEFAULT_WHEEL_GLOB,
        help = "Wheels to install on the cluster."
    )]
    pub wheels: String,
    #[arg(
        long,
        value_name = "FILE",
        help = "Custom launcher script to use instead of the built-in one."
    )]
    pub main_script: Option<PathBuf>,
    #[arg(
        long,
        value_name = "ARGS",
        allow_hyphen_values = true,
        help = "Extra arguments for the test runner, split on whitespace."
    )]
    pub pytest_args: Option<String>,
    #[arg(
        long,
        value_name = "BACKEND",
        help = "Where to upload artifacts: workspace or object-store. Overrides `upload_backend` from the config file."
    )]
    pub upload_to: Option<UploadBackend>,
    #[arg(
        long,
        action = clap::ArgAction::SetTrue,
        help = "Submit and return the run id instead of waiting through the platform CLI."
    )]
    pub no_wait: bool,
    #[arg(
        long,
        value_name = "FILE",
        requires = "no_wait",
        help = "Write {\"run_id\": N} to FILE after a --no-wait submit."
    )]
    pub out_json: Option<PathBuf>,
    #[arg(
        long,
        action = clap::ArgAction::SetTrue,
        help = "Stage everything and print the job document without uploading or submitting."
    )]
    pub dry_run: bool,
    #[arg(
        long,
        value_name = "DIR",
        help = "Directory to keep the dry-run staging area in; must not exist yet."
    )]
    pub stage_dir: Option<PathBuf>,
    #[arg(long, value_name = "NAME", default_value = DEFAULT_RUN_NAME)]
    pub run_name: String,
}

#[derive(Args)]
pub struct RunArgs {
    #[arg(
        long,
        value_name = "ID",
        conflicts_with = "runid_json",
        required_unless_present = "runid_json",
        help = "Run id returned by submit."
    )]
    pub runid: Option<i64>,
    #[arg(
        long,
        value_name = "FILE",
        help = "Read the run id from a file written by submit --out-json."
    )]
    pub runid_json: Option<PathBuf>,
}

#[derive(Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub run: RunArgs,
    #[arg(
        long,
        value_name = "FILE",
        help = "Write task logs to FILE instead of stdout."
    )]
    pub stdout: Option<PathBuf>,
    #[arg(
        long,
        action = clap::ArgAction::SetTrue,
        help = "Cancel the run as soon as one task fails."
    )]
    pub failfast: bool,
}

pub struct ParsedOpts {
    pub opts: Opts,
    pub verbose_override: Option<bool>,
}

pub fn cli_command() -> clap::Command {
    Opts::command()
}

pub fn parse_opts() -> ParsedOpts {
    let matches = cli_command().get_matches();
    let verbose_override = if matches.get_flag("verbose") {
        Some(true)
    } else {
        None
    };
    let opts = Opts::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    ParsedOpts {
        opts,
        verbose_override,
    }
}
