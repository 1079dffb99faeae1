// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Composition point: builds every backend component once from the platform
// bridge and the runtime configuration, and hands out the runtime-facing
// operations.
//
// `EncryptedKeyValueStore` holds a rusqlite connection, which is `Send` but
// not `Sync`, so it sits behind a `Mutex`.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mxnative_bridge::PlatformBridge;
use mxnative_core::config::{ConfigurationConstants, ConstantsContext};
use mxnative_core::error::{MxNativeError, Result};
use mxnative_core::types::{
    DownloadConfig, DownloadProgress, OtaDeployConfig, OtaDownloadConfig, OtaDownloadResponse,
    OtaManifest, UnsupportedFeatures,
};
use mxnative_core::{CompatTable, RuntimeConfig};
use mxnative_fs::{FileBackend, FileDownloader};
use mxnative_net::{CookieEncryptionInterceptor, HttpClient, ReqwestClient};
use mxnative_ota::{
    BundleChain, BundleResolver, BundleSource, OtaPaths, OtaPipeline, PipelineSettings,
};
use mxnative_security::cipher::KEY_LEN;
use mxnative_security::{AesGcmCipher, EncryptedKeyValueStore, FileSealer, ValueCipher};
use tracing::{info, warn};
use uuid::Uuid;

use super::data_dir;

/// Keychain entry holding the AES key shared by cookies and storage.
pub const CIPHER_KEY_SECRET: &str = "value_cipher_key";

/// Keychain entry holding the age identity used for sealed files.
pub const SEALING_IDENTITY_SECRET: &str = "file_sealing_identity";

/// Process-wide holder of the native services.
pub struct NativeServices {
    config: RuntimeConfig,
    app_version: String,
    session_id: String,
    native_dependencies: std::collections::BTreeMap<String, String>,
    paths: OtaPaths,
    pipeline: OtaPipeline,
    bundles: BundleChain,
    downloader: FileDownloader,
    files: FileBackend,
    storage: Mutex<EncryptedKeyValueStore>,
    cipher: Arc<dyn ValueCipher>,
    cookies: Option<CookieEncryptionInterceptor>,
    compat: CompatTable,
}

impl NativeServices {
    /// Initialise all services over the production HTTP client.
    pub fn init(bridge: &dyn PlatformBridge, config: RuntimeConfig) -> Result<Self> {
        Self::init_with_client(bridge, config, Arc::new(ReqwestClient::new()))
    }

    /// Initialise all services. Call once at startup.
    ///
    /// Values packaged with the app fill in whatever the configuration leaves
    /// unset: the runtime URL, and cookie encryption (enabled if either side
    /// asks for it).
    pub fn init_with_client(
        bridge: &dyn PlatformBridge,
        mut config: RuntimeConfig,
        client: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        info!(platform = bridge.platform_name(), "initialising native services");

        if config.runtime_url.is_none() {
            config.runtime_url = bridge.runtime_url()?;
        }
        config.cookie_encryption |= bridge.cookie_encryption_enabled()?;

        let app_version = bridge.app_version()?;
        let paths = OtaPaths::new(bridge.ota_dir()?);
        paths.ensure_root()?;

        let documents = data_dir::ensure_dir(bridge.documents_dir()?)?;
        let cache = data_dir::ensure_dir(bridge.cache_dir()?)?;

        let cipher: Arc<dyn ValueCipher> = Arc::new(AesGcmCipher::new(&load_or_create_key(bridge)?)?);
        let sealer = Arc::new(load_or_create_sealer(bridge)?);

        let pipeline = OtaPipeline::new(
            paths.clone(),
            Arc::clone(&client),
            PipelineSettings {
                trusted_origin: config.trusted_origin(),
                app_version: app_version.clone(),
                bundle_file_name: bridge.bundle_file_name().to_owned(),
                connect_timeout: Duration::from_millis(u64::from(config.download_timeout_ms)),
            },
        );
        let bundles = BundleChain::new(
            BundleResolver::new(paths.clone(), app_version.clone()),
            bridge.bundle_file_name(),
        );

        let files = FileBackend::new([documents.clone(), cache], Some(sealer));
        let storage = EncryptedKeyValueStore::open(
            data_dir::database_path(&documents, &config.database_name),
            Arc::clone(&cipher),
        )?;

        let cookies = if config.cookie_encryption {
            match CookieEncryptionInterceptor::from_config(&config, Arc::clone(&cipher)) {
                Ok(interceptor) => Some(interceptor),
                Err(e) => {
                    warn!(error = %e, "cookie encryption requested without a runtime URL, disabled");
                    None
                }
            }
        } else {
            None
        };

        let native_dependencies = bridge.native_dependencies().unwrap_or_else(|e| {
            warn!(error = %e, "native dependencies unreadable, reporting none");
            Default::default()
        });

        info!(
            ota_root = %paths.root().display(),
            app_version = %app_version,
            cookie_encryption = cookies.is_some(),
            "native services initialised"
        );

        Ok(Self {
            config,
            app_version,
            session_id: Uuid::new_v4().to_string(),
            native_dependencies,
            paths,
            pipeline,
            bundles,
            downloader: FileDownloader::new(client),
            files,
            storage: Mutex::new(storage),
            cipher,
            cookies,
            compat: CompatTable::default(),
        })
    }

    /// Developer bundle URL consulted when no OTA bundle is usable.
    pub fn with_bundle_override(mut self, url: impl Into<String>) -> Self {
        self.bundles = self.bundles.with_override(url);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    pub fn ota_paths(&self) -> &OtaPaths {
        &self.paths
    }

    // -- OTA -----------------------------------------------------------------

    /// The bundle the runtime should boot from.
    pub fn resolve_bundle(&self) -> BundleSource {
        self.bundles.resolve()
    }

    pub async fn ota_download(&self, config: &OtaDownloadConfig) -> Result<OtaDownloadResponse> {
        self.pipeline.download(config).await
    }

    pub async fn ota_deploy(&self, config: &OtaDeployConfig) -> Result<OtaManifest> {
        self.pipeline.deploy(config).await
    }

    // -- Files ---------------------------------------------------------------

    /// Download `url` to a destination inside the accessible directories.
    pub async fn download<P>(
        &self,
        url: &str,
        destination: &Path,
        config: &DownloadConfig,
        on_progress: P,
    ) -> Result<()>
    where
        P: FnMut(DownloadProgress) + Send,
    {
        let destination = self.files.confine(destination)?;
        self.downloader
            .download(url, &destination, config, on_progress)
            .await
    }

    pub fn files(&self) -> &FileBackend {
        &self.files
    }

    // -- Encrypted storage ---------------------------------------------------

    /// Run `f` against the encrypted key-value store.
    pub fn with_storage<T>(
        &self,
        f: impl FnOnce(&EncryptedKeyValueStore) -> Result<T>,
    ) -> Result<T> {
        let storage = self
            .storage
            .lock()
            .map_err(|_| MxNativeError::Storage("storage lock poisoned".into()))?;
        f(&storage)
    }

    // -- Cookies -------------------------------------------------------------

    /// The cookie interceptor, present only when cookie encryption is on.
    pub fn cookie_interceptor(&self) -> Option<&CookieEncryptionInterceptor> {
        self.cookies.as_ref()
    }

    pub fn cipher(&self) -> Arc<dyn ValueCipher> {
        Arc::clone(&self.cipher)
    }

    // -- Runtime handshake ---------------------------------------------------

    /// Features the given runtime version cannot handle.
    pub fn unsupported_features(&self, runtime_version: &str) -> UnsupportedFeatures {
        self.compat.resolve(runtime_version)
    }

    pub fn hide_splash_screen_supported(&self, runtime_version: &str) -> bool {
        self.compat.hide_splash_screen_supported(runtime_version)
    }

    /// The constant map handed to the JS runtime.
    pub fn constants(&self) -> Result<Option<ConfigurationConstants>> {
        self.config.constants(ConstantsContext {
            ota_manifest_path: self.paths.manifest_path().display().to_string(),
            app_session_id: Some(self.session_id.clone()),
            native_dependencies: self.native_dependencies.clone(),
        })
    }
}

/// The value cipher key from the keychain, generated on first use.
fn load_or_create_key(bridge: &dyn PlatformBridge) -> Result<Vec<u8>> {
    if let Some(key) = bridge.load_secret(CIPHER_KEY_SECRET)? {
        if key.len() != KEY_LEN {
            return Err(MxNativeError::Decryption(format!(
                "stored cipher key is {} bytes, expected {KEY_LEN}",
                key.len()
            )));
        }
        return Ok(key);
    }
    info!("generating value cipher key");
    let key = AesGcmCipher::generate_key()?;
    bridge.store_secret(CIPHER_KEY_SECRET, &key)?;
    Ok(key.to_vec())
}

/// The file sealing identity from the keychain, generated on first use.
fn load_or_create_sealer(bridge: &dyn PlatformBridge) -> Result<FileSealer> {
    if let Some(secret) = bridge.load_secret(SEALING_IDENTITY_SECRET)? {
        let secret = String::from_utf8(secret)
            .map_err(|e| MxNativeError::Decryption(format!("sealing identity is not UTF-8: {e}")))?;
        return FileSealer::from_secret(&secret);
    }
    info!("generating file sealing identity");
    let sealer = FileSealer::generate();
    bridge.store_secret(SEALING_IDENTITY_SECRET, sealer.export_identity().as_bytes())?;
    Ok(sealer)
}
