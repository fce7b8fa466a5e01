// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Maps a staging area onto a per-invocation remote directory and uploads it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::app::errors::{AppError, AppResult};
use crate::app::ports::ClusterClientPort;
use crate::app::types::{FileRef, UploadBackend};

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> UploadBackend;
    /// Remote directory the base is created under, e.g. `/Workspace/Users/me`.
    fn remote_home(&self) -> &str;
    /// Relative path from the home to this invocation's base directory.
    fn home_to_base(&self) -> &str;
    async fn mkdirs(&self, path: &str) -> AppResult<()>;
    async fn put_object(&self, path: &str, content: &[u8]) -> AppResult<()>;
}

pub struct WorkspaceBackend {
    client: Arc<dyn ClusterClientPort>,
    home: String,
    home_to_base: String,
}

impl WorkspaceBackend {
    pub fn new(client: Arc<dyn ClusterClientPort>, owner: &str, key: &str) -> Self {
        Self {
            client,
            home: format!("/Workspace/Users/{owner}"),
            home_to_base: format!(".testjob/test/{key}"),
        }
    }
}

#[async_trait]
impl StorageBackend for WorkspaceBackend {
    fn kind(&self) -> UploadBackend {
        UploadBackend::Workspace
    }

    fn remote_home(&self) -> &str {
        &self.home
    }

    fn home_to_base(&self) -> &str {
        &self.home_to_base
    }

    async fn mkdirs(&self, path: &str) -> AppResult<()> {
        self.client.workspace_mkdirs(path).await
    }

    async fn put_object(&self, path: &str, content: &[u8]) -> AppResult<()> {
        self.client.workspace_import(path, content).await
    }
}

pub struct ObjectStoreBackend {
    client: Arc<dyn ClusterClientPort>,
    home_to_base: String,
}

impl ObjectStoreBackend {
    pub fn new(client: Arc<dyn ClusterClientPort>, owner: &str, key: &str) -> Self {
        Self {
            client,
            home_to_base: format!("testjob/test/{owner}/{key}"),
        }
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    fn kind(&self) -> UploadBackend {
        UploadBackend::ObjectStore
    }

    fn remote_home(&self) -> &str {
        "dbfs:"
    }

    fn home_to_base(&self) -> &str {
        &self.home_to_base
    }

    async fn mkdirs(&self, path: &str) -> AppResult<()> {
        self.client.object_mkdirs(path).await
    }

    async fn put_object(&self, path: &str, content: &[u8]) -> AppResult<()> {
        self.client.object_upload(path, content).await
    }
}

pub fn backend_for(
    kind: UploadBackend,
    client: Arc<dyn ClusterClientPort>,
    owner: &str,
    key: &str,
) -> Box<dyn StorageBackend> {
    match kind {
        UploadBackend::Workspace => Box::new(WorkspaceBackend::new(client, owner, key)),
        UploadBackend::ObjectStore => Box::new(ObjectStoreBackend::new(client, owner, key)),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub directories: usize,
    pub files: usize,
}

pub struct RemoteLocation {
    stage_root: PathBuf,
    backend: Box<dyn StorageBackend>,
}

impl RemoteLocation {
    /// Creates the local mirror of the remote base inside `stage_root`.
    pub fn new(stage_root: &Path, backend: Box<dyn StorageBackend>) -> AppResult<Self> {
        let location = Self {
            stage_root: stage_root.to_path_buf(),
            backend,
        };
        let base = location.local_base();
        fs::create_dir_all(&base).map_err(|err| {
            AppError::local(format!(
                "failed to create staging base {}: {err}",
                base.display()
            ))
        })?;
        Ok(location)
    }

    pub fn local_base(&self) -> PathBuf {
        let mut base = self.stage_root.clone();
        for part in self.backend.home_to_base().split('/') {
            base.push(part);
        }
        base
    }

    pub fn remote_base(&self) -> String {
        join_remote(self.backend.remote_home(), self.backend.home_to_base())
    }

    /// Copies `source` under the staged base and returns its future remote path.
    pub fn add_local_path(&self, source: &Path, subdir: Option<&str>) -> AppResult<String> {
        let name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                AppError::invalid_argument(format!(
                    "'{}' does not name a file",
                    source.display()
                ))
            })?;
        let rel = match subdir {
            Some(dir) => format!("{}/{name}", dir.trim_matches('/')),
            None => name,
        };
        let file = self.new_local_file(&rel)?;
        fs::copy(source, &file.local).map_err(|err| {
            AppError::local(format!(
                "failed to stage {} as {}: {err}",
                source.display(),
                file.local.display()
            ))
        })?;
        Ok(file.remote)
    }

    /// Reserves `name` (a `/`-separated relative path) under the base without writing it.
    pub fn new_local_file(&self, name: &str) -> AppResult<FileRef> {
        let mut local = self.local_base();
        for part in name.split('/').filter(|part| !part.is_empty()) {
            if part == ".." {
                return Err(AppError::invalid_argument(format!(
                    "staged file name '{name}' must not leave the base directory"
                )));
            }
            local.push(part);
        }
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::local(format!(
                    "failed to create staging directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
        Ok(FileRef {
            remote: join_remote(&self.remote_base(), name.trim_matches('/')),
            local,
        })
    }

    /// Creates the remote base and mirrors the staged base directory into it.
    pub async fn upload(&self) -> AppResult<UploadSummary> {
        let mut summary = UploadSummary::default();
        let mut remote = self.backend.remote_home().to_string();
        for part in self.backend.home_to_base().split('/') {
            remote = join_remote(&remote, part);
            self.backend.mkdirs(&remote).await?;
            summary.directories += 1;
        }

        let base = self.local_base();
        let remote_base = self.remote_base();
        for entry in WalkDir::new(&base)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry =
                entry.map_err(|err| AppError::local(format!("failed to walk staging area: {err}")))?;
            let rel = entry
                .path()
                .strip_prefix(&base)
                .map_err(|_| AppError::local("failed to compute upload relative path"))?;
            let target = join_remote(&remote_base, &posix(rel));
            if entry.file_type().is_dir() {
                self.backend.mkdirs(&target).await?;
                summary.directories += 1;
            } else if entry.file_type().is_file() {
                let content = fs::read(entry.path()).map_err(|err| {
                    AppError::local(format!(
                        "failed to read {}: {err}",
                        entry.path().display()
                    ))
                })?;
                tracing::debug!(path = %target, bytes = content.len(), "uploading");
                self.backend.put_object(&target, &content).await?;
                summary.files += 1;
            }
        }
        tracing::info!(
            remote_base = %remote_base,
            backend = %self.backend.kind(),
            directories = summary.directories,
            files = summary.files,
            "uploaded staged artifacts"
        );
        Ok(summary)
    }
}

fn join_remote(left: &str, right: &str) -> String {
    if right.is_empty() {
        return left.to_string();
    }
    format!("{}/{right}", left.trim_end_matches('/'))
}

fn posix(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::FakeCluster;

    fn location(kind: UploadBackend, stage: &Path) -> (Arc<FakeCluster>, RemoteLocation) {
        let cluster = Arc::new(FakeCluster::new("me@example.com"));
        let backend = backend_for(kind, cluster.clone(), "me@example.com", "KEY");
        (cluster, RemoteLocation::new(stage, backend).unwrap())
    }

    #[test]
    fn remote_bases_follow_the_backend() {
        let stage = tempfile::tempdir().unwrap();
        let (_, ws) = location(UploadBackend::Workspace, stage.path());
        assert_eq!(
            ws.remote_base(),
            "/Workspace/Users/me@example.com/.testjob/test/KEY"
        );

        let stage = tempfile::tempdir().unwrap();
        let (_, store) = location(UploadBackend::ObjectStore, stage.path());
        assert_eq!(
            store.remote_base(),
            "dbfs:/testjob/test/me@example.com/KEY"
        );
        assert!(store.local_base().is_dir());
    }

    #[test]
    fn add_local_path_copies_into_subdir() {
        let stage = tempfile::tempdir().unwrap();
        let src = tempfile::tempdir().unwrap();
        let wheel = src.path().join("pkg-1.0-py3-none-any.whl");
        fs::write(&wheel, b"wheel bytes").unwrap();
        let (_, store) = location(UploadBackend::ObjectStore, stage.path());

        let remote = store.add_local_path(&wheel, Some("libs")).unwrap();

        assert_eq!(
            remote,
            "dbfs:/testjob/test/me@example.com/KEY/libs/pkg-1.0-py3-none-any.whl"
        );
        let staged = store.local_base().join("libs/pkg-1.0-py3-none-any.whl");
        assert_eq!(fs::read(staged).unwrap(), b"wheel bytes");
    }

    #[test]
    fn new_local_file_reserves_without_writing() {
        let stage = tempfile::tempdir().unwrap();
        let (_, ws) = location(UploadBackend::Workspace, stage.path());
        let file = ws.new_local_file("main.py").unwrap();
        assert!(file.remote.ends_with("/.testjob/test/KEY/main.py"));
        assert_eq!(file.local, ws.local_base().join("main.py"));
        assert!(!file.local.exists());
        assert!(ws.new_local_file("../escape").is_err());
    }

    #[tokio::test]
    async fn upload_creates_home_components_then_mirrors_the_tree() {
        let stage = tempfile::tempdir().unwrap();
        let (cluster, store) = location(UploadBackend::ObjectStore, stage.path());
        fs::write(store.new_local_file("main.py").unwrap().local, b"print()").unwrap();
        fs::write(store.new_local_file("libs/a.whl").unwrap().local, b"a").unwrap();
        fs::write(stage.path().join("job.json"), b"{}").unwrap();

        let summary = store.upload().await.unwrap();

        assert_eq!(
            cluster.calls(),
            [
                "object_mkdirs dbfs:/testjob",
                "object_mkdirs dbfs:/testjob/test",
                "object_mkdirs dbfs:/testjob/test/me@example.com",
                "object_mkdirs dbfs:/testjob/test/me@example.com/KEY",
                "object_mkdirs dbfs:/testjob/test/me@example.com/KEY/libs",
                "object_upload dbfs:/testjob/test/me@example.com/KEY/libs/a.whl",
                "object_upload dbfs:/testjob/test/me@example.com/KEY/main.py",
            ]
        );
        assert_eq!(summary, UploadSummary { directories: 5, files: 2 });
        let uploads = cluster.uploads.lock().unwrap();
        assert_eq!(uploads[1].1, b"print()");
    }

    #[tokio::test]
    async fn workspace_upload_uses_import() {
        let stage = tempfile::tempdir().unwrap();
        let (cluster, ws) = location(UploadBackend::Workspace, stage.path());
        fs::write(ws.new_local_file("tests.archive").unwrap().local, b"zip").unwrap();

        ws.upload().await.unwrap();

        let calls = cluster.calls();
        assert_eq!(calls[0], "workspace_mkdirs /Workspace/Users/me@example.com/.testjob");
        assert_eq!(
            calls.last().unwrap(),
            "workspace_import /Workspace/Users/me@example.com/.testjob/test/KEY/tests.archive"
        );
    }
}
