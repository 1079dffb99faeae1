// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds where native mobile APIs are unavailable.
//
// App information comes from `MXNATIVE_*` environment variables and the XDG
// data directory. Secrets live in process memory only, so anything stored
// through the keychain is gone after exit.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use mxnative_core::error::{MxNativeError, Result};

use crate::traits::*;

const ENV_DATA_DIR: &str = "MXNATIVE_DATA_DIR";
const ENV_RUNTIME_URL: &str = "MXNATIVE_RUNTIME_URL";
const ENV_APP_VERSION: &str = "MXNATIVE_APP_VERSION";
const ENV_NATIVE_DEPENDENCIES: &str = "MXNATIVE_NATIVE_DEPENDENCIES";
const ENV_COOKIE_ENCRYPTION: &str = "MXNATIVE_COOKIE_ENCRYPTION";

/// Bundle file name used by desktop builds.
pub const DESKTOP_BUNDLE_FILE: &str = "index.bundle";

/// Bridge returned on non-mobile platforms.
pub struct StubBridge {
    data_dir: PathBuf,
    app_version: String,
    runtime_url: Option<String>,
    native_dependencies: String,
    cookie_encryption: bool,
    secrets: Mutex<HashMap<String, Vec<u8>>>,
}

impl StubBridge {
    /// A bridge rooted at `data_dir` with no runtime resources configured.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            app_version: format!("{}-0", env!("CARGO_PKG_VERSION")),
            runtime_url: None,
            native_dependencies: String::new(),
            cookie_encryption: false,
            secrets: Mutex::new(HashMap::new()),
        }
    }

    /// A bridge configured from `MXNATIVE_*` environment variables.
    pub fn from_env() -> Self {
        let data_dir = std::env::var_os(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| xdg_data_home().join("mxnative"));
        let mut bridge = Self::new(data_dir);
        if let Ok(version) = std::env::var(ENV_APP_VERSION) {
            bridge.app_version = version;
        }
        bridge.runtime_url = std::env::var(ENV_RUNTIME_URL)
            .ok()
            .filter(|url| !url.trim().is_empty());
        bridge.native_dependencies = std::env::var(ENV_NATIVE_DEPENDENCIES).unwrap_or_default();
        bridge.cookie_encryption = std::env::var(ENV_COOKIE_ENCRYPTION)
            .is_ok_and(|v| matches!(v.trim(), "1" | "true" | "yes"));
        bridge
    }

    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    pub fn with_runtime_url(mut self, url: impl Into<String>) -> Self {
        self.runtime_url = Some(url.into());
        self
    }

    /// Native dependencies as the JSON object the build tooling would ship.
    pub fn with_native_dependencies(mut self, json: impl Into<String>) -> Self {
        self.native_dependencies = json.into();
        self
    }

    pub fn with_cookie_encryption(mut self, enabled: bool) -> Self {
        self.cookie_encryption = enabled;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn secrets(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.secrets
            .lock()
            .map_err(|_| MxNativeError::Bridge("stub keychain lock poisoned".into()))
    }
}

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl NativeAppInfo for StubBridge {
    fn app_version(&self) -> Result<String> {
        Ok(self.app_version.clone())
    }

    fn app_identifier(&self) -> Result<String> {
        Ok("io.mxnative.desktop".into())
    }

    fn documents_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir.join("documents"))
    }

    fn cache_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir.join("cache"))
    }

    fn ota_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir.join("Ota"))
    }

    fn bundle_file_name(&self) -> &str {
        DESKTOP_BUNDLE_FILE
    }
}

impl NativeKeychain for StubBridge {
    fn store_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        tracing::warn!(key, "NativeKeychain::store_secret on stub bridge, secret kept in memory only");
        self.secrets()?.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn load_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.secrets()?.get(key).cloned())
    }

    fn delete_secret(&self, key: &str) -> Result<()> {
        self.secrets()?.remove(key);
        Ok(())
    }
}

impl NativeRuntimeResources for StubBridge {
    fn runtime_url(&self) -> Result<Option<String>> {
        Ok(self.runtime_url.clone())
    }

    fn native_dependencies(&self) -> Result<BTreeMap<String, String>> {
        parse_native_dependencies(&self.native_dependencies)
    }

    fn cookie_encryption_enabled(&self) -> Result<bool> {
        Ok(self.cookie_encryption)
    }
}

fn xdg_data_home() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg);
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    std::env::temp_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_under_data_dir() {
        let bridge = StubBridge::new("/var/lib/mx");
        assert_eq!(bridge.ota_dir().expect("ota"), PathBuf::from("/var/lib/mx/Ota"));
        assert_eq!(
            bridge.documents_dir().expect("docs"),
            PathBuf::from("/var/lib/mx/documents")
        );
        assert_eq!(bridge.cache_dir().expect("cache"), PathBuf::from("/var/lib/mx/cache"));
        assert_eq!(bridge.bundle_file_name(), "index.bundle");
        assert!(bridge.app_version().expect("version").ends_with("-0"));
    }

    #[test]
    fn keychain_round_trip() {
        let bridge = StubBridge::new("/tmp/mx");
        assert_eq!(bridge.load_secret("k").expect("load"), None);

        bridge.store_secret("k", b"one").expect("store");
        bridge.store_secret("k", b"two").expect("overwrite");
        assert_eq!(bridge.load_secret("k").expect("load"), Some(b"two".to_vec()));

        bridge.delete_secret("k").expect("delete");
        bridge.delete_secret("k").expect("delete missing");
        assert_eq!(bridge.load_secret("k").expect("load"), None);
    }

    #[test]
    fn runtime_resources_from_builder() {
        let bridge = StubBridge::new("/tmp/mx")
            .with_runtime_url("https://rt.example.com")
            .with_native_dependencies(r#"{"mx-camera":"1.0.0"}"#)
            .with_cookie_encryption(true)
            .with_app_version("4.2.0-420");

        assert_eq!(
            bridge.runtime_url().expect("url").as_deref(),
            Some("https://rt.example.com")
        );
        assert_eq!(bridge.native_dependencies().expect("deps").len(), 1);
        assert!(bridge.cookie_encryption_enabled().expect("flag"));
        assert_eq!(bridge.app_version().expect("version"), "4.2.0-420");
    }

    #[test]
    fn no_dependencies_configured() {
        let bridge = StubBridge::new("/tmp/mx");
        assert!(bridge.native_dependencies().expect("deps").is_empty());
        assert!(!bridge.cookie_encryption_enabled().expect("flag"));
    }
}
