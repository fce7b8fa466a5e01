// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Diagnostics go to stderr (and optionally a file); stdout is reserved for
//! job documents, run ids and task logs.

use std::env;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{EnvFilter, Layer, Registry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOG_ENV_VAR: &str = "TESTJOB_LOG";
const FORMAT_ENV_VAR: &str = "TESTJOB_LOG_FORMAT";
const SPAN_EVENTS_ENV_VAR: &str = "TESTJOB_LOG_SPAN_EVENTS";
const FILE_ENV_VAR: &str = "TESTJOB_LOG_FILE";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LogFormat {
    Json,
    Pretty,
    Compact,
}

pub fn init(verbose: bool) -> Result<()> {
    let format = parse_format(env_setting(FORMAT_ENV_VAR).as_deref());
    let span_events = parse_span_events(env_setting(SPAN_EVENTS_ENV_VAR).as_deref());

    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(
        format,
        span_events.clone(),
        std::io::stderr,
        true,
    )];
    if let Some((writer, guard)) = build_file_writer() {
        layers.push(fmt_layer(format, span_events, writer, false));
        let _ = FILE_GUARD.set(guard);
    }

    Registry::default()
        .with(layers)
        .with(build_filter(verbose))
        .with(tracing_error::ErrorLayer::default())
        .try_init()
        .context("failed to install tracing subscriber")
}

fn fmt_layer<W>(format: LogFormat, span_events: FmtSpan, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_timer(UtcTime::rfc_3339())
        .with_span_events(span_events);
    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

fn build_filter(verbose: bool) -> EnvFilter {
    match env::var(LOG_ENV_VAR) {
        Ok(value) => EnvFilter::new(value),
        Err(_) => {
            if verbose {
                EnvFilter::new("debug")
            } else {
                EnvFilter::new("info")
            }
        }
    }
}

fn env_setting(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
}

fn parse_format(value: Option<&str>) -> LogFormat {
    match value {
        Some("json") => LogFormat::Json,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::Compact,
    }
}

fn parse_span_events(value: Option<&str>) -> FmtSpan {
    match value {
        Some("new") => FmtSpan::NEW,
        Some("enter") => FmtSpan::ENTER,
        Some("exit") => FmtSpan::EXIT,
        Some("close") => FmtSpan::CLOSE,
        _ => FmtSpan::NONE,
    }
}

fn build_file_writer() -> Option<(NonBlocking, WorkerGuard)> {
    let file_path = env::var(FILE_ENV_VAR)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())?;

    let path = Path::new(&file_path);
    let file_name = path.file_name()?.to_string_lossy().to_string();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let appender = tracing_appender::rolling::never(dir, file_name);
    Some(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_falls_back_to_compact() {
        assert_eq!(parse_format(Some("json")), LogFormat::Json);
        assert_eq!(parse_format(Some("pretty")), LogFormat::Pretty);
        assert_eq!(parse_format(Some("yaml")), LogFormat::Compact);
        assert_eq!(parse_format(None), LogFormat::Compact);
    }

    #[test]
    fn span_events_parse() {
        assert_eq!(parse_span_events(Some("close")), FmtSpan::CLOSE);
        assert_eq!(parse_span_events(Some("all")), FmtSpan::NONE);
    }
}
