// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::convert::Infallible;
use std::path::Path;

use crate::app::errors::AppResult;

/// Transfers control to the platform's own waiting submit command.
/// On success the calling process is replaced and this never returns.
pub trait SubmitHandoffPort: Send + Sync {
    fn hand_off(&self, job_file: &Path) -> AppResult<Infallible>;
}
