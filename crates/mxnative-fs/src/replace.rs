// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Atomic writes and replacements.
//
// Renames are atomic on the same filesystem. When a rename is refused
// (different mount, sandbox restrictions) the move degrades to copy + delete,
// which is not atomic but leaves the source intact until the copy finished.
// A directory target is moved aside first and restored if neither works.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use mxnative_core::error::{MxNativeError, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Hidden temp sibling of `path`, unique per call.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
}

/// Write `bytes` to `path` so readers see either the old or the new content.
#[instrument(skip_all, fields(path = %path.display(), len = bytes.len()))]
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let temp = temp_sibling(path);

    let result = async {
        let mut file = fs::File::create(&temp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Move `source` onto `target`, replacing whatever is there.
///
/// Works for files and directories. Falls back to copy + delete when the
/// rename fails for any reason other than a missing source.
#[instrument(skip_all, fields(source = %source.display(), target = %target.display()))]
pub async fn atomic_replace(source: &Path, target: &Path) -> Result<()> {
    let metadata = match fs::metadata(source).await {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(MxNativeError::NotFound(source.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    let is_dir = metadata.is_dir();
    let install = || async move {
        match fs::rename(source, target).await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(error = %e, "rename refused, copying instead");
                copy_then_delete(source, target, is_dir)
                    .await
                    .map_err(|e| MxNativeError::MoveFailed {
                        path: source.to_path_buf(),
                        reason: e.to_string(),
                    })
            }
        }
    };

    // A directory cannot be renamed over a non-empty one.
    if is_dir {
        with_target_aside(target, install).await
    } else {
        install().await
    }
}

/// Run `install` with any existing `target` moved to a temp sibling.
///
/// The old target is deleted once `install` succeeds and put back if it fails.
async fn with_target_aside<F, Fut>(target: &Path, install: F) -> Result<()>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let aside = temp_sibling(target);
    match fs::rename(target, &aside).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return install().await,
        Err(e) => return Err(e.into()),
    }

    match install().await {
        Ok(()) => {
            if let Err(e) = remove_path(&aside).await {
                warn!(path = %aside.display(), error = %e, "could not remove replaced target");
            }
            Ok(())
        }
        Err(e) => {
            if let Err(cleanup) = remove_path(target).await {
                warn!(error = %cleanup, "could not remove partial target");
            }
            if let Err(restore) = fs::rename(&aside, target).await {
                warn!(path = %aside.display(), error = %restore, "could not restore previous target");
            }
            Err(e)
        }
    }
}

async fn copy_then_delete(source: &Path, target: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        let (from, to) = (source.to_path_buf(), target.to_path_buf());
        tokio::task::spawn_blocking(move || copy_tree(&from, &to))
            .await
            .map_err(io::Error::other)??;
        fs::remove_dir_all(source).await
    } else {
        let temp = temp_sibling(target);
        if let Err(e) = fs::copy(source, &temp).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }
        fs::rename(&temp, target).await?;
        fs::remove_file(source).await
    }
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), dest)?;
        }
    }
    Ok(())
}

/// Remove a file or directory tree. A missing path is not an error.
pub async fn remove_path(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "remove failed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_atomic_creates_and_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sub/manifest.json");

        write_atomic(&path, b"one").await.expect("first write");
        write_atomic(&path, b"two").await.expect("second write");

        assert_eq!(std::fs::read(&path).expect("read"), b"two");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("sub"))
            .expect("read_dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn replace_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("new.txt");
        let target = dir.path().join("old.txt");
        std::fs::write(&source, b"new").expect("seed");
        std::fs::write(&target, b"old").expect("seed");

        atomic_replace(&source, &target).await.expect("replace");

        assert!(!source.exists());
        assert_eq!(std::fs::read(&target).expect("read"), b"new");
    }

    #[tokio::test]
    async fn replace_directory_over_existing_tree() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("staging");
        let target = dir.path().join("live");
        std::fs::create_dir_all(source.join("assets")).expect("mkdir");
        std::fs::write(source.join("assets/a.png"), b"a").expect("seed");
        std::fs::create_dir_all(&target).expect("mkdir");
        std::fs::write(target.join("stale.js"), b"stale").expect("seed");

        atomic_replace(&source, &target).await.expect("replace");

        assert!(!source.exists());
        assert!(target.join("assets/a.png").exists());
        assert!(!target.join("stale.js").exists());
    }

    #[tokio::test]
    async fn failed_install_restores_previous_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("live");
        std::fs::create_dir_all(&target).expect("mkdir");
        std::fs::write(target.join("index.js"), b"current").expect("seed");

        let err = with_target_aside(&target, || async {
            std::fs::create_dir_all(&target)?;
            std::fs::write(target.join("half.js"), b"partial")?;
            Err(MxNativeError::MoveFailed {
                path: target.clone(),
                reason: "copy failed".into(),
            })
        })
        .await
        .expect_err("must fail");

        assert!(matches!(err, MxNativeError::MoveFailed { .. }));
        assert_eq!(std::fs::read(target.join("index.js")).expect("read"), b"current");
        assert!(!target.join("half.js").exists());
        let entries = std::fs::read_dir(dir.path()).expect("read_dir").count();
        assert_eq!(entries, 1, "no temp sibling left behind");
    }

    #[tokio::test]
    async fn missing_source_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = atomic_replace(&dir.path().join("nope"), &dir.path().join("t"))
            .await
            .expect_err("must fail");
        assert!(matches!(err, MxNativeError::NotFound(_)));
    }

    #[test]
    fn copy_tree_preserves_nested_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let from = dir.path().join("from");
        std::fs::create_dir_all(from.join("a/b")).expect("mkdir");
        std::fs::write(from.join("a/b/c.txt"), b"c").expect("seed");
        std::fs::write(from.join("root.txt"), b"r").expect("seed");

        let to = dir.path().join("to");
        copy_tree(&from, &to).expect("copy");

        assert_eq!(std::fs::read(to.join("a/b/c.txt")).expect("read"), b"c");
        assert_eq!(std::fs::read(to.join("root.txt")).expect("read"), b"r");
    }

    #[tokio::test]
    async fn remove_path_handles_files_dirs_and_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("f");
        let tree = dir.path().join("t/u");
        std::fs::write(&file, b"x").expect("seed");
        std::fs::create_dir_all(&tree).expect("mkdir");

        remove_path(&file).await.expect("file");
        remove_path(&dir.path().join("t")).await.expect("dir");
        remove_path(&dir.path().join("missing")).await.expect("missing");

        assert!(!file.exists());
        assert!(!dir.path().join("t").exists());
    }
}
