// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::app::types::UploadBackend;

const APP_DIR_NAME: &str = "testjob";
const CONFIG_FILE_NAME: &str = "testjob.toml";
const CONFIG_ENV_VAR: &str = "TESTJOB_CONFIG_PATH";
pub const HOST_ENV_VAR: &str = "DATABRICKS_HOST";
pub const TOKEN_ENV_VAR: &str = "DATABRICKS_TOKEN";
const DEFAULT_CLI_BINARY: &str = "databricks";
const DEFAULT_LOG_POLL_ATTEMPTS: u32 = 10;
const DEFAULT_LOG_POLL_INTERVAL_SECS: u64 = 6;
const DEFAULT_FETCH_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    host: Option<String>,
    token: Option<String>,
    upload_backend: Option<UploadBackend>,
    cli_binary: Option<String>,
    log_poll_attempts: Option<u32>,
    log_poll_interval_secs: Option<u64>,
    fetch_poll_interval_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    stage_dir: Option<String>,
    verbose: Option<bool>,
}

#[derive(Debug)]
pub struct Config {
    /// Workspace URL, always with a scheme and without a trailing slash.
    pub host: Option<String>,
    pub token: Option<String>,
    pub upload_backend: UploadBackend,
    pub cli_binary: String,
    pub log_poll_attempts: u32,
    pub log_poll_interval_secs: u64,
    pub fetch_poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Parent directory for dry-run staging areas.
    pub stage_dir: Option<PathBuf>,
    pub verbose: bool,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Override,
    Env,
    ConfigFile,
    Default,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSource::Override => "override",
            ConfigSource::Env => "env",
            ConfigSource::ConfigFile => "config",
            ConfigSource::Default => "default",
        }
    }
}

#[derive(Debug)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

#[derive(Debug)]
pub struct ConfigReport {
    pub config_path: Option<PathBuf>,
    pub config_path_source: Option<ConfigSource>,
    pub config_file_present: bool,
    pub host: ConfigValue<Option<String>>,
    /// Only where the token came from; the token itself is never reported.
    pub token_source: ConfigSource,
    pub upload_backend: ConfigValue<UploadBackend>,
    pub cli_binary: ConfigValue<String>,
    pub log_poll_attempts: ConfigValue<u32>,
    pub log_poll_interval_secs: ConfigValue<u64>,
    pub fetch_poll_interval_secs: ConfigValue<u64>,
    pub request_timeout_secs: ConfigValue<u64>,
    pub stage_dir: ConfigValue<Option<PathBuf>>,
    pub verbose: ConfigValue<bool>,
}

#[derive(Debug)]
pub struct LoadResult {
    pub config: Config,
    pub report: ConfigReport,
}

#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub upload_backend: Option<UploadBackend>,
    pub verbose: Option<bool>,
}

pub fn load(config_path_override: Option<PathBuf>, overrides: Overrides) -> Result<Config> {
    Ok(load_with_report(config_path_override, overrides)?.config)
}

pub fn load_with_report(
    config_path_override: Option<PathBuf>,
    overrides: Overrides,
) -> Result<LoadResult> {
    let (config_path, config_path_source, required) = match config_path_override {
        Some(path) => (Some(expand_path(path)), Some(ConfigSource::Override), true),
        None => match config_path_from_env()? {
            Some(path) => (Some(expand_path(path)), Some(ConfigSource::Env), true),
            None => match default_config_path().ok() {
                Some(path) => (Some(path), Some(ConfigSource::Default), false),
                None => (None, None, false),
            },
        },
    };
    let config_file_present = config_path
        .as_deref()
        .map(|path| path.exists())
        .unwrap_or(false);

    let file_config = match config_path.as_deref() {
        Some(path) => read_config_file(path, required)?,
        None => FileConfig::default(),
    };

    let (host, host_source) = match overrides.host {
        Some(host) => (Some(host), ConfigSource::Override),
        None => match env_value(HOST_ENV_VAR) {
            Some(host) => (Some(host), ConfigSource::Env),
            None => match file_config.host {
                Some(host) => (Some(host), ConfigSource::ConfigFile),
                None => (None, ConfigSource::Default),
            },
        },
    };
    let host = host.map(|raw| normalize_host(&raw)).transpose()?;

    let (token, token_source) = match env_value(TOKEN_ENV_VAR) {
        Some(token) => (Some(token), ConfigSource::Env),
        None => match file_config.token {
            Some(token) => (Some(token), ConfigSource::ConfigFile),
            None => (None, ConfigSource::Default),
        },
    };

    let (upload_backend, upload_backend_source) = layered(
        overrides.upload_backend,
        file_config.upload_backend,
        UploadBackend::default(),
    );
    let (cli_binary, cli_binary_source) = layered(
        None,
        file_config.cli_binary,
        DEFAULT_CLI_BINARY.to_string(),
    );
    let (log_poll_attempts, log_poll_attempts_source) = layered(
        None,
        file_config.log_poll_attempts,
        DEFAULT_LOG_POLL_ATTEMPTS,
    );
    if log_poll_attempts == 0 {
        anyhow::bail!("log_poll_attempts must be at least 1");
    }
    let (log_poll_interval_secs, log_poll_interval_source) = layered(
        None,
        file_config.log_poll_interval_secs,
        DEFAULT_LOG_POLL_INTERVAL_SECS,
    );
    let (fetch_poll_interval_secs, fetch_poll_interval_source) = layered(
        None,
        file_config.fetch_poll_interval_secs,
        DEFAULT_FETCH_POLL_INTERVAL_SECS,
    );
    let (request_timeout_secs, request_timeout_source) = layered(
        None,
        file_config.request_timeout_secs,
        DEFAULT_REQUEST_TIMEOUT_SECS,
    );
    if request_timeout_secs == 0 {
        anyhow::bail!("request_timeout_secs must be at least 1");
    }
    let (stage_dir, stage_dir_source) = match file_config.stage_dir {
        Some(raw) => (
            Some(resolve_path(
                &raw,
                config_path.as_deref().and_then(|path| path.parent()),
            )),
            ConfigSource::ConfigFile,
        ),
        None => (None, ConfigSource::Default),
    };
    let (verbose, verbose_source) = layered(overrides.verbose, file_config.verbose, false);

    let config = Config {
        host,
        token,
        upload_backend,
        cli_binary,
        log_poll_attempts,
        log_poll_interval_secs,
        fetch_poll_interval_secs,
        request_timeout_secs,
        stage_dir,
        verbose,
        config_path: config_path.clone(),
    };

    let report = ConfigReport {
        config_path,
        config_path_source,
        config_file_present,
        host: ConfigValue {
            value: config.host.clone(),
            source: host_source,
        },
        token_source,
        upload_backend: ConfigValue {
            value: config.upload_backend,
            source: upload_backend_source,
        },
        cli_binary: ConfigValue {
            value: config.cli_binary.clone(),
            source: cli_binary_source,
        },
        log_poll_attempts: ConfigValue {
            value: config.log_poll_attempts,
            source: log_poll_attempts_source,
        },
        log_poll_interval_secs: ConfigValue {
            value: config.log_poll_interval_secs,
            source: log_poll_interval_source,
        },
        fetch_poll_interval_secs: ConfigValue {
            value: config.fetch_poll_interval_secs,
            source: fetch_poll_interval_source,
        },
        request_timeout_secs: ConfigValue {
            value: config.request_timeout_secs,
            source: request_timeout_source,
        },
        stage_dir: ConfigValue {
            value: config.stage_dir.clone(),
            source: stage_dir_source,
        },
        verbose: ConfigValue {
            value: config.verbose,
            source: verbose_source,
        },
    };

    Ok(LoadResult { config, report })
}

fn layered<T>(over: Option<T>, file: Option<T>, default: T) -> (T, ConfigSource) {
    match over {
        Some(value) => (value, ConfigSource::Override),
        None => match file {
            Some(value) => (value, ConfigSource::ConfigFile),
            None => (default, ConfigSource::Default),
        },
    }
}

fn normalize_host(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        anyhow::bail!("host must not be empty");
    }
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("https://{trimmed}"))
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_config_file(path: &Path, required: bool) -> Result<FileConfig> {
    if !path.exists() {
        if required {
            anyhow::bail!("config file not found at {}", path.display());
        }
        return Ok(FileConfig::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn resolve_path(raw: &str, base_dir: Option<&Path>) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    let path = PathBuf::from(expanded.as_ref());
    if path.is_absolute() {
        return path;
    }
    match base_dir {
        Some(dir) => dir.join(path),
        None => path,
    }
}

fn expand_path(path: PathBuf) -> PathBuf {
    let path_string = path.to_string_lossy().to_string();
    let expanded = shellexpand::tilde(&path_string);
    PathBuf::from(expanded.as_ref())
}

fn config_path_from_env() -> Result<Option<PathBuf>> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(value) => {
            if value.is_empty() {
                anyhow::bail!("{CONFIG_ENV_VAR} is set but empty");
            }
            Ok(Some(PathBuf::from(value)))
        }
        None => Ok(None),
    }
}

fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("failed to resolve config directory")?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}
