// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Task path validation, discovery and naming.
//!
//! Task paths are addressed relative to the parent of the test tree, so for a
//! tree rooted at `tests` the path `tests/unit` means `<tree>/unit`.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::app::errors::{AppError, AppResult};
use crate::app::types::ResolvedTask;

/// Maps a relative task path to a task key: every character outside
/// `[A-Za-z0-9_-]` becomes `_`.
pub fn sanitize_task_key(path: &str) -> String {
    path.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn canonical_tree_root(tests_root: &Path) -> AppResult<PathBuf> {
    let canonical = fs::canonicalize(tests_root).map_err(|e| {
        AppError::invalid_argument(format!(
            "test tree '{}' is not accessible: {e}",
            tests_root.display()
        ))
    })?;
    if !canonical.is_dir() {
        return Err(AppError::invalid_argument(format!(
            "test tree '{}' is not a directory",
            tests_root.display()
        )));
    }
    Ok(canonical)
}

/// Resolves one task path, a test file or a folder, against a canonical tree
/// root and returns the posix path relative to the root's parent.
pub fn resolve_task(tree_root: &Path, task: &Path) -> AppResult<String> {
    let canonical = contained_path(tree_root, task)?;
    relative_posix(tree_root, &canonical)
}

/// Lists immediate, non-hidden subdirectories of `folder` as task paths, sorted.
pub fn discover_tasks(tree_root: &Path, folder: &Path) -> AppResult<Vec<String>> {
    let dir = contained_path(tree_root, folder)?;
    if !dir.is_dir() {
        return Err(AppError::invalid_argument(format!(
            "tasks folder '{}' is not a directory",
            folder.display()
        )));
    }
    let entries = fs::read_dir(&dir).map_err(|e| {
        AppError::local(format!("cannot list '{}': {e}", dir.display()))
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            AppError::local(format!("cannot list '{}': {e}", dir.display()))
        })?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        found.push(resolve_task(tree_root, &path)?);
    }
    found.sort();
    Ok(found)
}

/// Resolves explicit task paths and tasks-from folders into the final task list.
pub fn resolve_all(
    tree_root: &Path,
    tasks: &[PathBuf],
    tasks_from: &[PathBuf],
) -> AppResult<Vec<ResolvedTask>> {
    let mut paths = Vec::new();
    for task in tasks {
        paths.push(resolve_task(tree_root, task)?);
    }
    for folder in tasks_from {
        paths.extend(discover_tasks(tree_root, folder)?);
    }

    let mut resolved: Vec<ResolvedTask> = Vec::new();
    let mut by_key: HashMap<String, String> = HashMap::new();
    for path in paths {
        let key = sanitize_task_key(&path);
        match by_key.get(&key) {
            Some(existing) if *existing == path => continue,
            Some(existing) => {
                return Err(AppError::invalid_argument(format!(
                    "task paths '{existing}' and '{path}' both map to task key '{key}'"
                )));
            }
            None => {
                by_key.insert(key.clone(), path.clone());
                resolved.push(ResolvedTask { path, key });
            }
        }
    }

    if resolved.is_empty() {
        return Err(AppError::invalid_argument(
            "no tasks given; use --task or --tasks-from",
        ));
    }
    Ok(resolved)
}

/// Canonicalizes `task` and checks it lies within `tree_root`. The root itself
/// counts as contained, so the whole tree can run as a single task.
fn contained_path(tree_root: &Path, task: &Path) -> AppResult<PathBuf> {
    let candidate = if task.is_absolute() {
        task.to_path_buf()
    } else {
        tree_root.parent().unwrap_or(tree_root).join(task)
    };
    let canonical = fs::canonicalize(&candidate).map_err(|e| {
        AppError::invalid_argument(format!(
            "task path '{}' does not exist: {e}",
            task.display()
        ))
    })?;
    if !canonical.starts_with(tree_root) {
        return Err(AppError::invalid_argument(format!(
            "task path '{}' is outside the test tree '{}'",
            task.display(),
            tree_root.display()
        )));
    }
    Ok(canonical)
}

fn relative_posix(tree_root: &Path, canonical: &Path) -> AppResult<String> {
    let base = tree_root.parent().unwrap_or(tree_root);
    let rel = canonical.strip_prefix(base).map_err(|_| {
        AppError::local(format!(
            "'{}' is not below '{}'",
            canonical.display(),
            base.display()
        ))
    })?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::errors::AppErrorKind;

    fn tree() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("tests");
        for dir in ["unit", "cluster/a", "cluster/b", "cluster/_helpers", "cluster/.cache"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        fs::write(root.join("cluster/conftest.py"), b"").unwrap();
        fs::write(root.join("unit/test_x.py"), b"def test_x(): pass\n").unwrap();
        let root = canonical_tree_root(&root).unwrap();
        (tmp, root)
    }

    #[test]
    fn sanitize_replaces_everything_outside_the_key_alphabet() {
        assert_eq!(sanitize_task_key("tests/unit"), "tests_unit");
        assert_eq!(sanitize_task_key("tests/my.pkg/x y"), "tests_my_pkg_x_y");
        assert_eq!(sanitize_task_key("a-b_c9"), "a-b_c9");
    }

    #[test]
    fn relative_task_is_addressed_from_the_tree_parent() {
        let (_tmp, root) = tree();
        assert_eq!(
            resolve_task(&root, Path::new("tests/unit")).unwrap(),
            "tests/unit"
        );
        assert_eq!(resolve_task(&root, &root).unwrap(), "tests");
    }

    #[test]
    fn escaping_or_sibling_prefix_paths_are_rejected() {
        let (tmp, root) = tree();
        fs::create_dir_all(tmp.path().join("tests_other")).unwrap();

        for bad in ["tests/../tests_other", "tests_other", "tests/unit/../.."] {
            let err = resolve_task(&root, Path::new(bad)).unwrap_err();
            assert_eq!(err.kind(), AppErrorKind::InvalidArgument, "{bad}");
        }
        let err = resolve_task(&root, Path::new("tests/missing")).unwrap_err();
        assert!(err.message().contains("does not exist"));
    }

    #[test]
    fn single_test_file_is_a_valid_task() {
        let (_tmp, root) = tree();
        let tasks = resolve_all(&root, &[PathBuf::from("tests/unit/test_x.py")], &[]).unwrap();
        assert_eq!(tasks[0].path, "tests/unit/test_x.py");
        assert_eq!(tasks[0].key, "tests_unit_test_x_py");
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_the_tree_is_rejected() {
        let (tmp, root) = tree();
        let outside = tmp.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("escape")).unwrap();

        let err = resolve_task(&root, Path::new("tests/escape")).unwrap_err();
        assert_eq!(err.kind(), AppErrorKind::InvalidArgument);
        assert!(err.message().contains("outside the test tree"));
    }

    #[test]
    fn tasks_folder_must_be_a_directory() {
        let (_tmp, root) = tree();
        let err = discover_tasks(&root, Path::new("tests/unit/test_x.py")).unwrap_err();
        assert_eq!(err.kind(), AppErrorKind::InvalidArgument);
    }

    #[test]
    fn discovery_skips_hidden_and_private_directories() {
        let (_tmp, root) = tree();
        assert_eq!(
            discover_tasks(&root, Path::new("tests/cluster")).unwrap(),
            vec!["tests/cluster/a".to_string(), "tests/cluster/b".to_string()]
        );
    }

    #[test]
    fn resolve_all_deduplicates_identical_paths() {
        let (_tmp, root) = tree();
        let tasks = resolve_all(
            &root,
            &[PathBuf::from("tests/unit"), root.join("unit")],
            &[PathBuf::from("tests/cluster")],
        )
        .unwrap();
        let keys: Vec<&str> = tasks.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, ["tests_unit", "tests_cluster_a", "tests_cluster_b"]);
    }

    #[test]
    fn resolve_all_rejects_colliding_keys() {
        let (_tmp, root) = tree();
        fs::create_dir_all(root.join("my.pkg")).unwrap();
        fs::create_dir_all(root.join("my_pkg")).unwrap();
        let err = resolve_all(
            &root,
            &[PathBuf::from("tests/my.pkg"), PathBuf::from("tests/my_pkg")],
            &[],
        )
        .unwrap_err();
        assert_eq!(err.kind(), AppErrorKind::InvalidArgument);
        assert!(err.message().contains("tests_my_pkg"));
    }

    #[test]
    fn resolve_all_requires_at_least_one_task() {
        let (_tmp, root) = tree();
        let err = resolve_all(&root, &[], &[PathBuf::from("tests/unit")]).unwrap_err();
        assert!(err.message().contains("no tasks"));
    }
}
