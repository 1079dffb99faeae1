// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Manifest store.
//
// The manifest is always plain JSON, never sealed: the bundle resolver reads
// it on the boot path, before (and independently of) any key material.

use std::path::{Path, PathBuf};

use mxnative_core::error::Result;
use mxnative_core::types::OtaManifest;
use mxnative_fs::write_atomic;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current manifest. Missing, unreadable or malformed files all
    /// read as `None`.
    pub fn read(&self) -> Option<OtaManifest> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no readable manifest");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "malformed manifest ignored");
                None
            }
        }
    }

    /// Replace the manifest. Readers never observe a partially written file.
    #[instrument(skip_all, fields(deployment_id = %manifest.deployment_id))]
    pub async fn write(&self, manifest: &OtaManifest) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(manifest)?;
        write_atomic(&self.path, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(id: &str) -> OtaManifest {
        OtaManifest {
            deployment_id: id.into(),
            relative_bundle_path: format!("{id}/index.android.bundle"),
            app_version: "1.2.0-42".into(),
        }
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ManifestStore::new(dir.path().join("manifest.json"));
        assert_eq!(store.read(), None);

        store.write(&manifest("d1")).await.expect("write");
        store.write(&manifest("d2")).await.expect("overwrite");
        assert_eq!(store.read(), Some(manifest("d2")));

        let raw = std::fs::read_to_string(store.path()).expect("raw");
        assert!(raw.contains("\"otaDeploymentID\": \"d2\""));
        assert!(raw.contains("\"relativeBundlePath\""));
        assert!(raw.contains("\"appVersion\""));
    }

    #[test]
    fn malformed_content_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manifest.json");
        let store = ManifestStore::new(&path);

        std::fs::write(&path, b"{not json").expect("seed");
        assert_eq!(store.read(), None);

        std::fs::write(&path, br#"{"otaDeploymentID":"x"}"#).expect("seed");
        assert_eq!(store.read(), None);

        std::fs::write(&path, [0xff, 0xfe, 0x00]).expect("seed");
        assert_eq!(store.read(), None);
    }
}
