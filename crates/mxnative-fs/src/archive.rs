// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Zip extraction for OTA packages.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use mxnative_core::error::{MxNativeError, Result};
use tracing::{debug, instrument};
use zip::ZipArchive;

fn archive_err(e: impl std::fmt::Display) -> MxNativeError {
    MxNativeError::Archive(e.to_string())
}

/// Extract every file entry of `package` under `destination`.
///
/// Directory-only entries are skipped (parents are created on demand).
/// Entries whose names would land outside `destination` abort the
/// extraction. Returns the number of files written.
#[instrument(skip_all, fields(package = %package.display(), destination = %destination.display()))]
pub fn extract_blocking(package: &Path, destination: &Path) -> Result<usize> {
    let file = File::open(package)?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(archive_err)?;
    fs::create_dir_all(destination)?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(archive_err)?;
        if entry.is_dir() {
            continue;
        }
        let relative = entry.enclosed_name().ok_or_else(|| {
            archive_err(format!("entry {:?} escapes the extraction directory", entry.name()))
        })?;

        let out_path = destination.join(relative);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)
            .map_err(|e| archive_err(format!("{}: {e}", entry.name())))?;
        written += 1;
    }

    debug!(files = written, "package extracted");
    Ok(written)
}

/// Async wrapper running [`extract_blocking`] on the blocking pool.
pub async fn extract(package: &Path, destination: &Path) -> Result<usize> {
    let (package, destination): (PathBuf, PathBuf) = (package.into(), destination.into());
    tokio::task::spawn_blocking(move || extract_blocking(&package, &destination))
        .await
        .map_err(|e| MxNativeError::Io(io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, Option<&[u8]>)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).expect("create zip"));
        for (name, body) in entries {
            match body {
                Some(body) => {
                    zip.start_file(*name, SimpleFileOptions::default()).expect("start file");
                    zip.write_all(body).expect("write entry");
                }
                None => zip
                    .add_directory(*name, SimpleFileOptions::default())
                    .expect("add directory"),
            }
        }
        zip.finish().expect("finish zip");
    }

    #[tokio::test]
    async fn extracts_files_and_skips_directory_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let package = dir.path().join("p.zip");
        write_zip(
            &package,
            &[
                ("assets/", None),
                ("index.android.bundle", Some(&b"bundle"[..])),
                ("assets/img/logo.png", Some(&b"png"[..])),
            ],
        );

        let out = dir.path().join("out");
        let files = extract(&package, &out).await.expect("extract");

        assert_eq!(files, 2);
        assert_eq!(std::fs::read(out.join("index.android.bundle")).expect("read"), b"bundle");
        assert_eq!(std::fs::read(out.join("assets/img/logo.png")).expect("read"), b"png");
    }

    #[test]
    fn rejects_entries_escaping_destination() {
        let dir = tempfile::tempdir().expect("tempdir");
        let package = dir.path().join("evil.zip");
        write_zip(&package, &[("../escape.txt", Some(&b"x"[..]))]);

        let out = dir.path().join("out");
        let err = extract_blocking(&package, &out).expect_err("must fail");
        assert!(matches!(err, MxNativeError::Archive(_)));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn corrupt_package_is_an_archive_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let package = dir.path().join("broken.zip");
        std::fs::write(&package, b"definitely not a zip").expect("seed");

        let err = extract_blocking(&package, &dir.path().join("out")).expect_err("must fail");
        assert_eq!(err.code(), "OTA_DEPLOYMENT_FAILED");
    }
}
