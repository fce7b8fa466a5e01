// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Stage a local test tree, submit it as a multi-task job on a managed
//! compute cluster, and follow the run's per-task output.

pub mod adapters;
pub mod app;
pub mod config;
pub mod logging;
