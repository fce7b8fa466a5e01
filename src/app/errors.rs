// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;

pub const EXIT_CODE_USAGE: i32 = 2;
pub const EXIT_CODE_OTHER: i32 = 1;

pub mod codes {
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
    pub const NOT_FOUND: &str = "not_found";
    pub const REMOTE_ERROR: &str = "remote_error";
    pub const NETWORK_ERROR: &str = "network_error";
    pub const LOCAL_ERROR: &str = "local_error";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorKind {
    /// Bad or missing input; nothing was submitted.
    InvalidArgument,
    /// The platform rejected or failed a call.
    Remote,
    /// Local filesystem, archive or serialization failure.
    Internal,
}

impl AppErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            AppErrorKind::InvalidArgument => EXIT_CODE_USAGE,
            AppErrorKind::Remote | AppErrorKind::Internal => EXIT_CODE_OTHER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppError {
    kind: AppErrorKind,
    code: &'static str,
    message: String,
    context: Option<String>,
}

impl AppError {
    pub fn with_message(
        kind: AppErrorKind,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            context: None,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::with_message(
            AppErrorKind::InvalidArgument,
            codes::INVALID_ARGUMENT,
            message,
        )
    }

    pub fn remote(code: &'static str, message: impl Into<String>) -> Self {
        Self::with_message(AppErrorKind::Remote, code, message)
    }

    pub fn local(message: impl Into<String>) -> Self {
        Self::with_message(AppErrorKind::Internal, codes::LOCAL_ERROR, message)
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn kind(&self) -> AppErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    pub fn is_not_found(&self) -> bool {
        self.code == codes::NOT_FOUND
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ctx) = &self.context {
            write!(f, "{} ({})", self.message, ctx)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;
