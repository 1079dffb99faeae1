// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sandboxed file backend for the runtime's file-system module.
//
// Every path is checked against the accessible roots (documents and cache
// directories) after lexical normalisation, so `..` cannot climb out of them.
// When encryption is on, saved files are sealed with age; reads detect sealed
// content by its header and open it transparently, which keeps files written
// before encryption was switched on readable.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mxnative_core::error::{MxNativeError, Result};
use mxnative_security::FileSealer;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, instrument};

use crate::replace::{atomic_replace, remove_path, write_atomic};

/// Directory moves are supported on every platform.
pub const SUPPORTS_DIRECTORY_MOVE: bool = true;

/// Saved files can be sealed.
pub const SUPPORTS_ENCRYPTION: bool = true;

/// Marker in the path of offline object files, which are never sealed.
const OFFLINE_FILE_MARKER: &str = "GUID";

/// File access confined to a fixed set of root directories.
pub struct FileBackend {
    roots: Vec<PathBuf>,
    sealer: Option<Arc<FileSealer>>,
    encryption_enabled: AtomicBool,
}

impl FileBackend {
    /// The first root is reported to the runtime as `DocumentDirectoryPath`.
    pub fn new(roots: impl IntoIterator<Item = PathBuf>, sealer: Option<Arc<FileSealer>>) -> Self {
        Self {
            roots: roots.into_iter().map(|r| normalize(&r)).collect(),
            sealer,
            encryption_enabled: AtomicBool::new(false),
        }
    }

    pub fn document_directory_path(&self) -> Option<&Path> {
        self.roots.first().map(PathBuf::as_path)
    }

    /// Turn sealing of saved files on or off. Enabling requires a sealer.
    pub fn set_encryption_enabled(&self, enabled: bool) -> Result<()> {
        if enabled && self.sealer.is_none() {
            return Err(MxNativeError::Encryption(
                "no sealing identity configured".into(),
            ));
        }
        self.encryption_enabled.store(enabled, Ordering::SeqCst);
        debug!(enabled, "file encryption toggled");
        Ok(())
    }

    pub fn encryption_enabled(&self) -> bool {
        self.encryption_enabled.load(Ordering::SeqCst)
    }

    /// Resolve `path` to an absolute path under one of the roots.
    pub fn confine(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        if !path.is_absolute() {
            return Err(MxNativeError::PathNotAccessible(path.to_path_buf()));
        }
        let normalized = normalize(path);
        if self.roots.iter().any(|root| normalized.starts_with(root)) {
            Ok(normalized)
        } else {
            Err(MxNativeError::PathNotAccessible(path.to_path_buf()))
        }
    }

    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn save(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let path = self.confine(path)?;

        let sealer = match &self.sealer {
            Some(sealer) if self.encryption_enabled() && !is_offline_file(&path) => sealer,
            _ => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::write(&path, bytes).await?;
                return Ok(());
            }
        };

        let sealed = sealer.seal(bytes)?;
        if fs::try_exists(&path).await? {
            write_atomic(&path, &sealed).await
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&path, sealed).await?;
            Ok(())
        }
    }

    /// File contents, or `None` when the file does not exist.
    #[instrument(skip(self))]
    pub async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        let path = self.confine(path)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !FileSealer::is_sealed(&bytes) {
            return Ok(Some(bytes));
        }
        let sealer = self.sealer.as_ref().ok_or_else(|| {
            MxNativeError::Decryption(format!("{} is sealed but no identity is configured", path.display()))
        })?;
        sealer.open(&bytes).map(Some)
    }

    pub async fn read_text(&self, path: &Path) -> Result<Option<String>> {
        self.read(path)
            .await?
            .map(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|e| MxNativeError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
            })
            .transpose()
    }

    /// Move a file or directory. The source must exist.
    #[instrument(skip(self))]
    pub async fn move_path(&self, from: &Path, to: &Path) -> Result<()> {
        let (from, to) = (self.confine(from)?, self.confine(to)?);
        if !fs::try_exists(&from).await? {
            return Err(MxNativeError::NotFound(from));
        }
        atomic_replace(&from, &to).await
    }

    pub async fn remove(&self, path: &Path) -> Result<()> {
        let path = self.confine(path)?;
        remove_path(&path).await
    }

    pub async fn exists(&self, path: &Path) -> Result<bool> {
        let path = self.confine(path)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// Entry names of `dir`, sorted. A missing or non-directory path lists
    /// as empty.
    pub async fn list(&self, dir: &Path) -> Result<Vec<String>> {
        let dir = self.confine(dir)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => return Ok(Vec::new()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Pretty-printed JSON, saved like any other file.
    pub async fn write_json(&self, value: &Value, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.save(path, &bytes).await
    }

    /// Parsed JSON, or `None` when the file does not exist.
    pub async fn read_json(&self, path: &Path) -> Result<Option<Value>> {
        match self.read(path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn is_offline_file(path: &Path) -> bool {
    path.to_string_lossy().contains(OFFLINE_FILE_MARKER)
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
