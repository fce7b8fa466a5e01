// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::LazyLock;

use regex::Regex;

use crate::app::services::launcher::OUTPUT_MARKER;

// One or more ISO timestamps each followed by ':', an optional uptime offset
// followed by ':', then a bracketed body up to the end of the line.
static GC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:Z|[+-]\d{2}:?\d{2})?[ \t]*:[ \t]*)+(?:\d+(?:\.\d+)?[ \t]*:[ \t]*)?\[[^\n]*(?:\n|$)",
    )
    .unwrap_or_else(|err| panic!("invalid gc line pattern: {err}"))
});

/// Strips cluster bootstrap noise from captured task output.
pub fn clean(raw: &str) -> String {
    let body = match raw.rfind(OUTPUT_MARKER) {
        Some(idx) => &raw[idx + OUTPUT_MARKER.len()..],
        None => raw,
    };
    GC_LINE.replace_all(body, "").into_owned()
}
