// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use rand::Rng;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::app::errors::{AppError, AppResult};

const KEY_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour].[minute].[second].[subsecond digits:6]");

/// Per-invocation key for the remote base directory, e.g.
/// `2026-10-18T09.41.07.123456-qwertyuiop`. Colons are avoided because
/// object-store paths reject them.
pub fn unique_key(now: OffsetDateTime) -> AppResult<String> {
    let timestamp = now
        .format(KEY_TIMESTAMP)
        .map_err(|err| AppError::local(format!("failed to format run key timestamp: {err}")))?;

    let mut rng = rand::rng();
    let rand_string: String = (0..10)
        .map(|_| {
            let idx = rng.random_range(0..26); // 0..=25
            (b'a' + idx) as char
        })
        .collect();

    Ok(format!("{timestamp}-{rand_string}"))
}
