// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use reqwest::StatusCode;
use serde::Deserialize;

use crate::app::errors::{AppError, codes};

const NOT_FOUND_CODE: &str = "RESOURCE_DOES_NOT_EXIST";
const ALREADY_EXISTS_CODE: &str = "RESOURCE_ALREADY_EXISTS";

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("platform answered {status}: {error_code}: {message}")]
    Api {
        status: u16,
        error_code: String,
        message: String,
    },
    #[error("unexpected response body: {0}")]
    Decode(String),
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl PlatformError {
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let error_code = parsed
            .error_code
            .unwrap_or_else(|| format!("HTTP_{}", status.as_u16()));
        let message = parsed.message.unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.canonical_reason().unwrap_or("no message").to_string()
            } else {
                trimmed.chars().take(500).collect()
            }
        });
        PlatformError::Api {
            status: status.as_u16(),
            error_code,
            message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            PlatformError::Api {
                status, error_code, ..
            } => *status == 404 || error_code == NOT_FOUND_CODE,
            _ => false,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, PlatformError::Api { error_code, .. } if error_code == ALREADY_EXISTS_CODE)
    }

    /// Converts into the port error, naming the operation that failed.
    pub fn into_app_error(self, operation: &str) -> AppError {
        let code = match &self {
            PlatformError::Transport(_) => codes::NETWORK_ERROR,
            _ if self.is_not_found() => codes::NOT_FOUND,
            _ => codes::REMOTE_ERROR,
        };
        AppError::remote(code, format!("{operation} failed")).with_context(self.to_string())
    }
}
