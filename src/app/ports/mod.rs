// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod clock;
pub mod cluster;
pub mod handoff;

pub use clock::ClockPort;
pub use cluster::ClusterClientPort;
pub use handoff::SubmitHandoffPort;
