// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge data types. Field names follow the JSON keys exchanged with the JS
// runtime, so every struct here is a wire format.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MxNativeError, Result};

/// Persisted record describing the currently deployed OTA bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaManifest {
    #[serde(rename = "otaDeploymentID")]
    pub deployment_id: String,
    /// Path of the bundle file, relative to the OTA root, `/`-separated.
    #[serde(rename = "relativeBundlePath")]
    pub relative_bundle_path: String,
    /// App version (`<name>-<code>`) that was running when the bundle was installed.
    #[serde(rename = "appVersion")]
    pub app_version: String,
}

impl OtaManifest {
    /// The name of the manifest file inside the OTA root.
    pub const FILE_NAME: &'static str = "manifest.json";
}

/// Input to `download`. Fields are optional because they arrive as an
/// untyped map from the JS side and are validated by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaDownloadConfig {
    #[serde(default)]
    pub url: Option<String>,
}

impl OtaDownloadConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }

    /// Return the URL, failing with `INVALID_DOWNLOAD_CONFIG` when absent.
    pub fn url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .ok_or(MxNativeError::InvalidDownloadConfig("url"))
    }
}

/// Result of a successful `download`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaDownloadResponse {
    /// File name of the staged package inside the OTA root.
    #[serde(rename = "otaPackage")]
    pub ota_package: String,
}

/// Input to `deploy`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaDeployConfig {
    #[serde(rename = "otaDeploymentID", default)]
    pub deployment_id: Option<String>,
    #[serde(rename = "otaPackage", default)]
    pub ota_package: Option<String>,
    #[serde(rename = "extractionDir", default)]
    pub extraction_dir: Option<String>,
}

/// A deploy request whose three fields are known to be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest<'a> {
    pub deployment_id: &'a str,
    pub ota_package: &'a str,
    pub extraction_dir: &'a str,
}

impl OtaDeployConfig {
    pub fn new(
        deployment_id: impl Into<String>,
        ota_package: impl Into<String>,
        extraction_dir: impl Into<String>,
    ) -> Self {
        Self {
            deployment_id: Some(deployment_id.into()),
            ota_package: Some(ota_package.into()),
            extraction_dir: Some(extraction_dir.into()),
        }
    }

    /// Check that every field is present, naming the first missing key.
    pub fn validate(&self) -> Result<DeployRequest<'_>> {
        let deployment_id = self
            .deployment_id
            .as_deref()
            .ok_or(MxNativeError::InvalidDeployConfig("otaDeploymentID"))?;
        let ota_package = self
            .ota_package
            .as_deref()
            .ok_or(MxNativeError::InvalidDeployConfig("otaPackage"))?;
        let extraction_dir = self
            .extraction_dir
            .as_deref()
            .ok_or(MxNativeError::InvalidDeployConfig("extractionDir"))?;
        Ok(DeployRequest {
            deployment_id,
            ota_package,
            extraction_dir,
        })
    }
}

/// Options for a generic file download.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadConfig {
    /// Connect timeout in milliseconds.
    #[serde(default)]
    pub connection_timeout: Option<u32>,
    /// Expected `Content-Type` of the response, if the caller wants it checked.
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl DownloadConfig {
    /// Connect timeout used when the caller does not pass one.
    pub const DEFAULT_TIMEOUT_MS: u32 = 10_000;

    pub fn timeout_ms(&self) -> u32 {
        self.connection_timeout.unwrap_or(Self::DEFAULT_TIMEOUT_MS)
    }
}

/// Progress event emitted while a download streams to disk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub received_bytes: f64,
    pub total_bytes: f64,
}

/// Client behaviours that older runtime versions cannot handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsupportedFeatures {
    pub reload_in_client: bool,
    pub hide_splash_screen_in_client: bool,
}

/// Generate a fresh, collision-free file name for a staged package.
pub fn staged_package_name() -> String {
    format!("{}.zip", Uuid::new_v4())
}
