// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! mxnative-fs: file plumbing shared by downloads, OTA and the runtime's
//! file-system module.

pub mod archive;
pub mod backend;
pub mod download;
pub mod replace;

pub use backend::FileBackend;
pub use download::{DownloadOptions, FileDownloader, download_to};
pub use replace::{atomic_replace, remove_path, write_atomic};
