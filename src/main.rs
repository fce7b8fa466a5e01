// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use testjob::adapters;
use testjob::adapters::cli::{Command, FetchArgs, ParsedOpts, RunArgs, SubmitArgs, inputs};
use testjob::app::errors::{AppError, EXIT_CODE_OTHER};
use testjob::app::ports::{ClockPort, ClusterClientPort};
use testjob::app::types::RunOutcome;
use testjob::app::usecases::{
    FetchOptions, Fetcher, LogPollPolicy, RunMonitor, SubmitOutcome, Submitter,
};
use testjob::config;

fn log_config_report(report: &config::ConfigReport) {
    match (&report.config_path, report.config_path_source) {
        (Some(path), Some(source)) => tracing::debug!(
            path = %path.display(),
            source = source.as_str(),
            present = report.config_file_present,
            "config path"
        ),
        (Some(path), None) => tracing::debug!(
            path = %path.display(),
            present = report.config_file_present,
            "config path"
        ),
        (None, _) => tracing::debug!("config path: (none)"),
    }
    tracing::debug!(
        value = report.host.value.as_deref().unwrap_or("(unset)"),
        source = report.host.source.as_str(),
        "config host"
    );
    tracing::debug!(source = report.token_source.as_str(), "config token");
    tracing::debug!(
        value = %report.upload_backend.value,
        source = report.upload_backend.source.as_str(),
        "config upload_backend"
    );
    tracing::debug!(
        value = %report.cli_binary.value,
        source = report.cli_binary.source.as_str(),
        "config cli_binary"
    );
    tracing::debug!(
        attempts = report.log_poll_attempts.value,
        attempts_source = report.log_poll_attempts.source.as_str(),
        interval_secs = report.log_poll_interval_secs.value,
        interval_source = report.log_poll_interval_secs.source.as_str(),
        "config log poll"
    );
    tracing::debug!(
        value = report.fetch_poll_interval_secs.value,
        source = report.fetch_poll_interval_secs.source.as_str(),
        "config fetch_poll_interval_secs"
    );
    tracing::debug!(
        value = report.request_timeout_secs.value,
        source = report.request_timeout_secs.source.as_str(),
        "config request_timeout_secs"
    );
    tracing::debug!(
        value = ?report.stage_dir.value,
        source = report.stage_dir.source.as_str(),
        "config stage_dir"
    );
    tracing::debug!(
        value = report.verbose.value,
        source = report.verbose.source.as_str(),
        "config verbose"
    );
}

fn build_client(config: &config::Config) -> Result<Arc<dyn ClusterClientPort>, AppError> {
    let host = config.host.as_deref().ok_or_else(|| {
        AppError::invalid_argument(
            "no workspace host configured; pass --host, set DATABRICKS_HOST or `host` in the config file",
        )
    })?;
    let token = config.token.as_deref().ok_or_else(|| {
        AppError::invalid_argument(
            "no access token configured; set DATABRICKS_TOKEN or `token` in the config file",
        )
    })?;
    let client = adapters::platform::PlatformClient::new(
        host,
        token,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    Ok(Arc::new(client))
}

async fn run_submit(
    args: SubmitArgs,
    config: &config::Config,
    client: Arc<dyn ClusterClientPort>,
    clock: Arc<dyn ClockPort>,
) -> anyhow::Result<i32> {
    let request = inputs::build_submit_request(&args, config)?;
    let handoff = Arc::new(adapters::handoff::CliHandoff::new(
        &config.cli_binary,
        config.host.clone(),
        config.token.clone(),
    ));
    let submitter = Submitter::new(client, clock, handoff);

    match submitter.submit(&request).await? {
        SubmitOutcome::DryRun {
            document,
            stage_dir,
            remote_base,
        } => {
            println!("{document}");
            eprintln!(
                "Dry run: nothing uploaded or submitted. Staged files for {remote_base} kept in {}",
                stage_dir.display()
            );
        }
        SubmitOutcome::Submitted {
            run_id,
            run_page_url,
            ..
        } => {
            println!("Started run with ID {run_id}");
            if let Some(url) = run_page_url {
                println!("Follow job details at {url}");
            }
            if let Some(path) = &args.out_json {
                inputs::write_run_id(path, run_id)?;
            }
        }
    }
    Ok(0)
}

async fn run_fetch(
    args: FetchArgs,
    config: &config::Config,
    client: Arc<dyn ClusterClientPort>,
    clock: Arc<dyn ClockPort>,
) -> anyhow::Result<i32> {
    let run_id = inputs::run_id_from(&args.run)?;
    let log_poll = LogPollPolicy::new(
        config.log_poll_attempts,
        Duration::from_secs(config.log_poll_interval_secs),
    );
    let fetcher = Fetcher::new(client, clock, Some(log_poll));
    let options = FetchOptions {
        fail_fast: args.failfast,
        poll_interval: Duration::from_secs(config.fetch_poll_interval_secs),
    };

    let mut status = std::io::stdout();
    let outcome = match &args.stdout {
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let sink: &mut (dyn Write + Send) = &mut file;
            fetcher.fetch(run_id, options, &mut status, Some(sink)).await?
        }
        None => fetcher.fetch(run_id, options, &mut status, None).await?,
    };

    if outcome == RunOutcome::Success {
        Ok(0)
    } else {
        eprintln!("Run failed");
        Ok(EXIT_CODE_OTHER)
    }
}

async fn run_cancel(
    args: RunArgs,
    client: Arc<dyn ClusterClientPort>,
    clock: Arc<dyn ClockPort>,
) -> anyhow::Result<i32> {
    let run_id = inputs::run_id_from(&args)?;
    let mut monitor = RunMonitor::attach(client, clock, run_id, None).await?;
    if monitor.cancel().await? {
        println!("Cancellation requested for run {run_id}");
    } else {
        println!(
            "Run {run_id} already finished ({})",
            monitor.snapshot().state.label()
        );
    }
    Ok(0)
}

async fn run(parsed: ParsedOpts) -> anyhow::Result<i32> {
    let opts = parsed.opts;
    let upload_backend = match &opts.command {
        Command::Submit(args) => args.upload_to,
        _ => None,
    };
    let config::LoadResult { config, report } = config::load_with_report(
        opts.config,
        config::Overrides {
            host: opts.host,
            upload_backend,
            verbose: parsed.verbose_override,
        },
    )?;
    testjob::logging::init(config.verbose)?;
    log_config_report(&report);

    let client = build_client(&config)?;
    let clock: Arc<dyn ClockPort> = Arc::new(adapters::time::SystemClock::new());
    match opts.command {
        Command::Submit(args) => run_submit(args, &config, client, clock).await,
        Command::Fetch(args) => run_fetch(args, &config, client, clock).await,
        Command::Cancel(args) => run_cancel(args, client, clock).await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let parsed = adapters::cli::parse_opts();
    let code = match run(parsed).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            err.downcast_ref::<AppError>()
                .map(AppError::exit_code)
                .unwrap_or(EXIT_CODE_OTHER)
        }
    };
    std::process::exit(code);
}
