// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory layout: configuration file and database locations inside
// the directories the platform bridge hands out.

use std::path::{Path, PathBuf};

use mxnative_core::RuntimeConfig;
use mxnative_core::error::Result;
use tracing::{debug, warn};

/// Configuration file name inside the documents directory.
pub const CONFIG_FILE: &str = "mxnative.json";

const DATABASE_DIR: &str = "databases";

/// Create `dir` (and parents) if needed and return it.
pub fn ensure_dir(dir: impl Into<PathBuf>) -> Result<PathBuf> {
    let dir = dir.into();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Path of the encrypted storage database for `database_name`.
pub fn database_path(documents_dir: &Path, database_name: &str) -> PathBuf {
    documents_dir
        .join(DATABASE_DIR)
        .join(format!("{database_name}.sqlite"))
}

/// Load `mxnative.json` from `dir`. Missing or malformed files give the
/// default configuration.
pub fn load_config(dir: &Path) -> RuntimeConfig {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return RuntimeConfig::default();
    }
    match RuntimeConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable config file, using defaults");
            RuntimeConfig::default()
        }
    }
}
