// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for native capabilities.

use std::collections::BTreeMap;
use std::path::PathBuf;

use mxnative_core::error::Result;

/// Unified bridge that groups all native capabilities.
pub trait PlatformBridge: NativeAppInfo + NativeKeychain + NativeRuntimeResources + Send + Sync {
    /// Human-readable platform name.
    fn platform_name(&self) -> &str;
}

/// Identity and sandbox layout of the installed app.
pub trait NativeAppInfo {
    /// `<version name>-<build number>`. Recorded in every OTA manifest, so it
    /// must change whenever the native binary changes.
    fn app_version(&self) -> Result<String>;

    /// Package name (Android) or bundle identifier (iOS).
    fn app_identifier(&self) -> Result<String>;

    /// Private documents directory of the app.
    fn documents_dir(&self) -> Result<PathBuf>;

    /// Cache directory; the OS may purge it.
    fn cache_dir(&self) -> Result<PathBuf>;

    /// Root directory for OTA packages, bundles and the manifest.
    fn ota_dir(&self) -> Result<PathBuf>;

    /// File name of the JS bundle inside an OTA package.
    fn bundle_file_name(&self) -> &str;
}

/// Secure storage for key material.
pub trait NativeKeychain {
    /// Store a secret, replacing any previous value under `key`.
    fn store_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Load a secret. `Ok(None)` if nothing is stored under `key`.
    fn load_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret. Deleting a missing key succeeds.
    fn delete_secret(&self, key: &str) -> Result<()>;
}

/// Values compiled into the app package by the build tooling.
pub trait NativeRuntimeResources {
    /// Configured runtime URL, if any.
    fn runtime_url(&self) -> Result<Option<String>>;

    /// Native modules linked into this binary and their versions.
    fn native_dependencies(&self) -> Result<BTreeMap<String, String>>;

    /// Whether cookies for the runtime host are stored encrypted.
    fn cookie_encryption_enabled(&self) -> Result<bool>;
}

/// Parse the JSON object of native dependency versions shipped with the app.
///
/// Non-string values are rendered as JSON text.
pub fn parse_native_dependencies(raw: &str) -> Result<BTreeMap<String, String>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(BTreeMap::new());
    }
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(trimmed)?;
    Ok(object
        .into_iter()
        .map(|(name, version)| {
            let version = match version {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (name, version)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_dependencies_parse() {
        let deps = parse_native_dependencies(r#"{"mx-camera":"2.1.0","mx-maps":3}"#)
            .expect("parse");
        assert_eq!(deps.get("mx-camera").map(String::as_str), Some("2.1.0"));
        assert_eq!(deps.get("mx-maps").map(String::as_str), Some("3"));
        assert!(parse_native_dependencies("  ").expect("blank").is_empty());
        assert!(parse_native_dependencies("[1,2]").is_err());
    }
}
