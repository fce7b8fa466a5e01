// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod archive;
pub mod launcher;
pub mod pools;
pub mod random;
pub mod remote_location;
pub mod sanitizer;
pub mod staging;
pub mod tasks;
