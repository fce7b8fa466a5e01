// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod fetch;
pub mod monitor;
pub mod submit;

pub use fetch::{FetchOptions, Fetcher};
pub use monitor::{LogPollPolicy, RunMonitor};
pub use submit::{SubmitOutcome, SubmitRequest, Submitter};
