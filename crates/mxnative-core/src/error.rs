// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for mxnative.
//
// Every variant carries a stable string code (`MxNativeError::code`) that the
// JS side of the bridge matches on. Codes must never change once shipped.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all mxnative operations.
#[derive(Debug, Error)]
pub enum MxNativeError {
    // -- Configuration --
    #[error("invalid download config: key {0} is invalid")]
    InvalidDownloadConfig(&'static str),

    #[error("invalid deploy config: key {0} is invalid")]
    InvalidDeployConfig(&'static str),

    #[error("runtime URL is not set")]
    RuntimeUrlMissing,

    #[error("URL {0} is not under the trusted runtime origin")]
    UntrustedOrigin(String),

    // -- Downloads --
    #[error("file already exists: {}", .0.display())]
    FileAlreadyExists(PathBuf),

    #[error("mime type check failed: expected {expected}, got {actual}")]
    MimeTypeMismatch { expected: String, actual: String },

    #[error("response contained no data")]
    NoData,

    #[error("failed to connect to endpoint: {0}")]
    ConnectFailed(String),

    #[error("OTA download failed: {0}")]
    DownloadFailed(#[source] Box<MxNativeError>),

    // -- Deployment --
    #[error("OTA package does not exist: {}", .0.display())]
    PackageMissing(PathBuf),

    #[error("OTA deployment failed: {0}")]
    DeployFailed(#[source] Box<MxNativeError>),

    #[error("archive extraction failed: {0}")]
    Archive(String),

    // -- File system --
    #[error(
        "cannot access {}: path needs to be inside the app's accessible space",
        .0.display()
    )]
    PathNotAccessible(PathBuf),

    #[error("file does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to move {}: {reason}", .path.display())]
    MoveFailed { path: PathBuf, reason: String },

    // -- Security --
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("malformed cookie: {0}")]
    Cookie(String),

    // -- Storage / persistence --
    #[error("storage error: {0}")]
    Storage(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// Coarse taxonomy used by callers to decide how to surface a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing or invalid caller-supplied fields. Never retried.
    Config,
    /// Security-relevant rejection of a non-trusted URL.
    UntrustedOrigin,
    /// Disk or network failure; cleanup has already been attempted.
    Io,
    /// Manifest or package state blocked a deploy step.
    DeploymentState,
    /// Encryption, decryption or cookie encoding failure (fail closed).
    Security,
    /// The host platform could not provide a capability.
    Platform,
}

impl MxNativeError {
    /// Stable bridge error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidDownloadConfig(_) => "INVALID_DOWNLOAD_CONFIG",
            Self::InvalidDeployConfig(_) => "INVALID_DEPLOY_CONFIG",
            Self::RuntimeUrlMissing | Self::UntrustedOrigin(_) => "INVALID_RUNTIME_URL",
            Self::FileAlreadyExists(_) => "FILE_ALREADY_EXISTS",
            Self::MimeTypeMismatch { .. } | Self::ConnectFailed(_) => "ERROR_DOWNLOAD_FAILED",
            Self::NoData => "ERROR_CONNECTION_FAILED",
            Self::DownloadFailed(_) => "OTA_DOWNLOAD_FAILED",
            Self::PackageMissing(_) => "OTA_ZIP_FILE_MISSING",
            Self::DeployFailed(_) | Self::Archive(_) => "OTA_DEPLOYMENT_FAILED",
            Self::PathNotAccessible(_) => "INVALID_PATH",
            Self::NotFound(_) => "ERROR_READ_FAILED",
            Self::MoveFailed { .. } => "ERROR_MOVE_FAILED",
            Self::Encryption(_) => "ERROR_ENCRYPTION_FAILED",
            Self::Decryption(_) | Self::Cookie(_) => "ERROR_DECRYPTION_FAILED",
            Self::Storage(_) => "ERROR_STORAGE_FAILED",
            Self::Io(_) => "IO_EXCEPTION",
            Self::Serialization(_) => "ERROR_SERIALIZATION_FAILED",
            Self::Bridge(_) => "ERROR_BRIDGE",
            Self::PlatformUnavailable => "PLATFORM_UNAVAILABLE",
        }
    }

    /// Taxonomy class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidDownloadConfig(_)
            | Self::InvalidDeployConfig(_)
            | Self::RuntimeUrlMissing
            | Self::PathNotAccessible(_) => ErrorClass::Config,
            Self::UntrustedOrigin(_) => ErrorClass::UntrustedOrigin,
            Self::PackageMissing(_) | Self::DeployFailed(_) | Self::Archive(_) => {
                ErrorClass::DeploymentState
            }
            Self::Encryption(_) | Self::Decryption(_) | Self::Cookie(_) => ErrorClass::Security,
            Self::Bridge(_) | Self::PlatformUnavailable => ErrorClass::Platform,
            Self::FileAlreadyExists(_)
            | Self::MimeTypeMismatch { .. }
            | Self::NoData
            | Self::ConnectFailed(_)
            | Self::DownloadFailed(_)
            | Self::NotFound(_)
            | Self::MoveFailed { .. }
            | Self::Storage(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorClass::Io,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MxNativeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ota_codes_are_stable() {
        assert_eq!(
            MxNativeError::InvalidDownloadConfig("url").code(),
            "INVALID_DOWNLOAD_CONFIG"
        );
        assert_eq!(
            MxNativeError::UntrustedOrigin("https://evil".into()).code(),
            "INVALID_RUNTIME_URL"
        );
        assert_eq!(
            MxNativeError::DownloadFailed(Box::new(MxNativeError::NoData)).code(),
            "OTA_DOWNLOAD_FAILED"
        );
        assert_eq!(
            MxNativeError::InvalidDeployConfig("extractionDir").code(),
            "INVALID_DEPLOY_CONFIG"
        );
        assert_eq!(
            MxNativeError::PackageMissing(PathBuf::from("a.zip")).code(),
            "OTA_ZIP_FILE_MISSING"
        );
        assert_eq!(
            MxNativeError::DeployFailed(Box::new(MxNativeError::Archive("bad".into()))).code(),
            "OTA_DEPLOYMENT_FAILED"
        );
    }

    #[test]
    fn wrapped_cause_is_exposed_as_source() {
        use std::error::Error as _;

        let err = MxNativeError::DownloadFailed(Box::new(MxNativeError::NoData));
        let source = err.source().expect("wrapped error must expose its cause");
        assert_eq!(source.to_string(), "response contained no data");
    }

    #[test]
    fn classes() {
        assert_eq!(
            MxNativeError::InvalidDeployConfig("otaPackage").class(),
            ErrorClass::Config
        );
        assert_eq!(
            MxNativeError::UntrustedOrigin(String::new()).class(),
            ErrorClass::UntrustedOrigin
        );
        assert_eq!(
            MxNativeError::PackageMissing(PathBuf::new()).class(),
            ErrorClass::DeploymentState
        );
        assert_eq!(
            MxNativeError::Decryption("tag".into()).class(),
            ErrorClass::Security
        );
        assert_eq!(MxNativeError::NoData.class(), ErrorClass::Io);
    }
}
