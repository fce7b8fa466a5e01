// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::app::errors::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingMode {
    /// Temporary directory removed on release, created under `parent` or the
    /// system temp dir.
    Ephemeral { parent: Option<PathBuf> },
    /// Caller-chosen directory kept for inspection.
    Retained(PathBuf),
}

/// Local working directory owned by one submission.
#[derive(Debug)]
pub struct StagingArea {
    root: Root,
}

#[derive(Debug)]
enum Root {
    Ephemeral(TempDir),
    Retained(PathBuf),
}

impl StagingArea {
    pub fn acquire(mode: StagingMode) -> AppResult<Self> {
        let root = match mode {
            StagingMode::Ephemeral { parent } => {
                let mut builder = tempfile::Builder::new();
                builder.prefix("testjob-stage-");
                let dir = match parent {
                    Some(parent) => {
                        fs::create_dir_all(&parent).map_err(|e| {
                            AppError::local(format!(
                                "cannot create staging parent '{}': {e}",
                                parent.display()
                            ))
                        })?;
                        builder.tempdir_in(&parent)
                    }
                    None => builder.tempdir(),
                }
                .map_err(|e| AppError::local(format!("cannot create staging area: {e}")))?;
                Root::Ephemeral(dir)
            }
            StagingMode::Retained(path) => {
                if path.exists() {
                    return Err(AppError::invalid_argument(format!(
                        "staging directory '{}' already exists; remove it or choose another",
                        path.display()
                    )));
                }
                fs::create_dir_all(&path).map_err(|e| {
                    AppError::local(format!(
                        "cannot create staging directory '{}': {e}",
                        path.display()
                    ))
                })?;
                Root::Retained(path)
            }
        };
        tracing::debug!(path = %root.path().display(), "acquired staging area");
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Deletes an ephemeral area; returns the path of a retained one.
    pub fn release(self) -> AppResult<Option<PathBuf>> {
        match self.root {
            Root::Ephemeral(dir) => {
                let path = dir.path().to_path_buf();
                dir.close().map_err(|e| {
                    AppError::local(format!(
                        "cannot remove staging area '{}': {e}",
                        path.display()
                    ))
                })?;
                tracing::debug!(path = %path.display(), "released staging area");
                Ok(None)
            }
            Root::Retained(path) => Ok(Some(path)),
        }
    }
}

impl Root {
    fn path(&self) -> &Path {
        match self {
            Root::Ephemeral(dir) => dir.path(),
            Root::Retained(path) => path,
        }
    }
}
