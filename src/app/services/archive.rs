// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::app::errors::{AppError, AppResult};

/// File name of the staged test tree. Deliberately not `.zip` so that no
/// backend unpacks it on import.
pub const ARCHIVE_FILE_NAME: &str = "tests.archive";

/// Zips `source_root` into `archive_path`; every entry is prefixed with the
/// root's own directory name, so the launcher unpacks `tests/...` next to itself.
pub fn create_tree_archive(source_root: &Path, archive_path: &Path) -> AppResult<()> {
    if !source_root.is_dir() {
        return Err(AppError::invalid_argument(format!(
            "test tree '{}' is not a directory",
            source_root.display()
        )));
    }
    let root_name = source_root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            AppError::invalid_argument(format!(
                "test tree '{}' has no directory name",
                source_root.display()
            ))
        })?;
    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            AppError::local(format!(
                "failed to create archive directory {}: {err}",
                parent.display()
            ))
        })?;
    }

    let mut entries: Vec<(PathBuf, bool)> = Vec::new();
    for entry in WalkDir::new(source_root).follow_links(false) {
        let entry = entry
            .map_err(|err| AppError::local(format!("failed to walk test tree: {err}")))?;
        let rel = entry
            .path()
            .strip_prefix(source_root)
            .map_err(|_| AppError::local("failed to compute archive relative path"))?;
        if rel.as_os_str().is_empty() || entry.file_type().is_symlink() {
            continue;
        }
        if entry.file_type().is_dir() || entry.file_type().is_file() {
            entries.push((rel.to_path_buf(), entry.file_type().is_dir()));
        }
    }
    entries.sort_by_key(|(rel, _)| rel.to_string_lossy().to_string());

    let file = File::create(archive_path).map_err(|err| {
        AppError::local(format!(
            "failed to create archive {}: {err}",
            archive_path.display()
        ))
    })?;
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.add_directory(format!("{root_name}/"), options)
        .map_err(|err| AppError::local(format!("failed to write archive root: {err}")))?;
    for (rel, is_dir) in entries {
        let name = format!("{root_name}/{}", posix(&rel));
        if is_dir {
            zip.add_directory(format!("{name}/"), options)
                .map_err(|err| AppError::local(format!("failed to add directory: {err}")))?;
        } else {
            zip.start_file(name, options)
                .map_err(|err| AppError::local(format!("failed to add file: {err}")))?;
            let src = source_root.join(&rel);
            let mut input = File::open(&src).map_err(|err| {
                AppError::local(format!("failed to open {}: {err}", src.display()))
            })?;
            io::copy(&mut input, &mut zip).map_err(|err| {
                AppError::local(format!("failed to archive {}: {err}", src.display()))
            })?;
        }
    }
    zip.finish()
        .map_err(|err| AppError::local(format!("failed to finish archive: {err}")))?;
    Ok(())
}

fn posix(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
