// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Runtime configuration.
//
// A `RuntimeConfig` is built once at the composition point and handed to each
// component by value; nothing in the workspace reads configuration from
// process-wide statics.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::{MxNativeError, Result};

/// Version of the native binary contract exposed to the JS runtime.
pub const NATIVE_BINARY_VERSION: u32 = 30;

/// How loudly the runtime reports configuration problems.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningsFilter {
    All,
    Partial,
    #[default]
    None,
}

impl std::fmt::Display for WarningsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::All => "all",
            Self::Partial => "partial",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

/// Immutable runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Base URL of the runtime the app talks to. OTA downloads and cookie
    /// encryption are restricted to this origin.
    pub runtime_url: Option<String>,
    /// Application name; `None` for production apps.
    pub app_name: Option<String>,
    pub database_name: String,
    /// Kept for older clients that still read it.
    pub files_directory_name: String,
    pub warnings_filter: WarningsFilter,
    /// Encrypt cookies exchanged with the runtime origin.
    pub cookie_encryption: bool,
    /// Connect timeout for OTA downloads.
    pub download_timeout_ms: u32,
    /// Whether this build ships developer tooling.
    pub developer_app: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            runtime_url: None,
            app_name: None,
            database_name: "default".into(),
            files_directory_name: "files/default".into(),
            warnings_filter: WarningsFilter::None,
            cookie_encryption: false,
            download_timeout_ms: 10_000,
            developer_app: false,
        }
    }
}

impl RuntimeConfig {
    /// Read a JSON configuration file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn with_runtime_url(mut self, url: impl Into<String>) -> Self {
        self.runtime_url = Some(url.into());
        self
    }

    /// The normalised runtime origin (scheme ensured, exactly one trailing `/`).
    pub fn trusted_origin(&self) -> Option<String> {
        self.runtime_url.as_deref().map(runtime_origin)
    }

    /// Host part of the trusted origin, lowercased.
    pub fn trusted_host(&self) -> Option<String> {
        let origin = self.trusted_origin()?;
        let url = Url::parse(&origin).ok()?;
        let host = url.host_str()?.trim_start_matches('[').trim_end_matches(']');
        (!host.is_empty()).then(|| host.to_ascii_lowercase())
    }

    /// Build the constant map exposed to the JS runtime.
    ///
    /// Without a runtime URL the app cannot fetch any data; that is a hard
    /// error unless warnings are being surfaced to the developer, in which
    /// case an empty set is returned so the warning can be displayed.
    pub fn constants(&self, ctx: ConstantsContext) -> Result<Option<ConfigurationConstants>> {
        let Some(runtime_url) = self.trusted_origin() else {
            if self.warnings_filter != WarningsFilter::None {
                warn!("runtime URL not specified; the app cannot retrieve any data");
                return Ok(None);
            }
            return Err(MxNativeError::RuntimeUrlMissing);
        };

        Ok(Some(ConfigurationConstants {
            runtime_url,
            app_name: self.app_name.clone(),
            database_name: self.database_name.clone(),
            files_directory_name: self.files_directory_name.clone(),
            warnings_filter_level: self.warnings_filter.to_string(),
            ota_manifest_path: ctx.ota_manifest_path,
            is_developer_app: self.developer_app,
            native_binary_version: NATIVE_BINARY_VERSION,
            app_session_id: ctx.app_session_id,
            native_dependencies: ctx.native_dependencies,
        }))
    }
}

/// Values the constant map needs from outside the configuration itself.
#[derive(Debug, Clone, Default)]
pub struct ConstantsContext {
    pub ota_manifest_path: String,
    pub app_session_id: Option<String>,
    pub native_dependencies: BTreeMap<String, String>,
}

/// The constant map handed to the JS runtime at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ConfigurationConstants {
    pub runtime_url: String,
    pub app_name: Option<String>,
    pub database_name: String,
    pub files_directory_name: String,
    pub warnings_filter_level: String,
    pub ota_manifest_path: String,
    pub is_developer_app: bool,
    pub native_binary_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_session_id: Option<String>,
    pub native_dependencies: BTreeMap<String, String>,
}

/// Normalise a configured runtime URL into the origin prefix `<scheme>://<host>/…/`.
pub fn runtime_origin(url: &str) -> String {
    format!("{}/", ensure_protocol(remove_trailing_slash(url.trim())))
}

pub fn remove_trailing_slash(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

/// Prepend `http://` unless the URL already names an http(s) scheme.
pub fn ensure_protocol(url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_owned()
    } else {
        format!("http://{url}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_normalisation() {
        assert_eq!(runtime_origin("https://app.example.com"), "https://app.example.com/");
        assert_eq!(runtime_origin("https://app.example.com/"), "https://app.example.com/");
        assert_eq!(runtime_origin("10.0.2.2:8080"), "http://10.0.2.2:8080/");
        assert_eq!(runtime_origin(" http://host/path/ "), "http://host/path/");
    }

    #[test]
    fn trusted_host_strips_port_and_path() {
        let config = RuntimeConfig::default().with_runtime_url("https://App.Example.com:8443/p");
        assert_eq!(config.trusted_host().as_deref(), Some("app.example.com"));

        let bare = RuntimeConfig::default().with_runtime_url("localhost:8080");
        assert_eq!(bare.trusted_host().as_deref(), Some("localhost"));
    }

    #[test]
    fn trusted_host_ignores_query_fragment_and_userinfo() {
        for (url, host) in [
            ("https://app.example.com?tenant=1", "app.example.com"),
            ("https://app.example.com#x", "app.example.com"),
            ("https://user:pw@app.example.com/p?q=1#f", "app.example.com"),
            ("http://[::1]:8080/", "::1"),
        ] {
            let config = RuntimeConfig::default().with_runtime_url(url);
            assert_eq!(config.trusted_host().as_deref(), Some(host), "{url}");
        }
    }

    #[test]
    fn no_runtime_url_means_no_origin() {
        assert!(RuntimeConfig::default().trusted_origin().is_none());
        assert!(RuntimeConfig::default().trusted_host().is_none());
    }

    #[test]
    fn constants_require_runtime_url_when_warnings_are_off() {
        let config = RuntimeConfig::default();
        assert!(matches!(
            config.constants(ConstantsContext::default()),
            Err(MxNativeError::RuntimeUrlMissing)
        ));

        let lenient = RuntimeConfig {
            warnings_filter: WarningsFilter::All,
            ..RuntimeConfig::default()
        };
        assert!(lenient
            .constants(ConstantsContext::default())
            .expect("lenient config")
            .is_none());
    }

    #[test]
    fn constants_use_screaming_keys() {
        let config = RuntimeConfig::default().with_runtime_url("https://rt.example.com");
        let constants = config
            .constants(ConstantsContext {
                ota_manifest_path: "/data/Ota/manifest.json".into(),
                ..ConstantsContext::default()
            })
            .expect("constants")
            .expect("runtime url is set");
        let json = serde_json::to_value(&constants).expect("serialize");
        assert_eq!(json["RUNTIME_URL"], "https://rt.example.com/");
        assert_eq!(json["DATABASE_NAME"], "default");
        assert_eq!(json["WARNINGS_FILTER_LEVEL"], "none");
        assert_eq!(json["OTA_MANIFEST_PATH"], "/data/Ota/manifest.json");
        assert_eq!(json["NATIVE_BINARY_VERSION"], 30);
        assert!(json.get("APP_SESSION_ID").is_none());
    }

    #[test]
    fn load_fills_missing_keys_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"runtime_url":"https://rt","cookie_encryption":true}"#)
            .expect("write config");

        let config = RuntimeConfig::load(&path).expect("load");
        assert_eq!(config.runtime_url.as_deref(), Some("https://rt"));
        assert!(config.cookie_encryption);
        assert_eq!(config.database_name, "default");
        assert_eq!(config.download_timeout_ms, 10_000);
    }
}
