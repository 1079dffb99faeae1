// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OTA download and deploy.
//
// Deploy ordering matters for crash safety: the new manifest is written only
// after the package is fully extracted, and the previous bundle is removed
// only after the manifest points away from it. A crash at any point leaves
// either the old or the new bundle resolvable.
//
// Deploys are not serialised here. Callers must keep at most one deploy in
// flight.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mxnative_core::error::{MxNativeError, Result};
use mxnative_core::types::{
    OtaDeployConfig, OtaDownloadConfig, OtaDownloadResponse, OtaManifest, staged_package_name,
};
use mxnative_fs::archive;
use mxnative_fs::{DownloadOptions, download_to, remove_path};
use mxnative_net::HttpClient;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

use crate::manifest::ManifestStore;
use crate::paths::OtaPaths;

/// Values the pipeline needs from the host and the runtime configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Normalised runtime origin; download URLs must start with it.
    pub trusted_origin: Option<String>,
    /// Version of the running binary, recorded in every manifest.
    pub app_version: String,
    /// Platform bundle file name inside an extracted package.
    pub bundle_file_name: String,
    pub connect_timeout: Duration,
}

pub struct OtaPipeline {
    paths: OtaPaths,
    manifests: ManifestStore,
    client: Arc<dyn HttpClient>,
    settings: PipelineSettings,
}

impl OtaPipeline {
    pub fn new(paths: OtaPaths, client: Arc<dyn HttpClient>, settings: PipelineSettings) -> Self {
        let manifests = ManifestStore::new(paths.manifest_path());
        Self {
            paths,
            manifests,
            client,
            settings,
        }
    }

    pub fn paths(&self) -> &OtaPaths {
        &self.paths
    }

    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    /// Download an OTA package from the trusted runtime origin into the OTA
    /// root under a fresh name.
    #[instrument(skip_all)]
    pub async fn download(&self, config: &OtaDownloadConfig) -> Result<OtaDownloadResponse> {
        let url = config.url()?;
        let origin = self
            .settings
            .trusted_origin
            .as_deref()
            .ok_or(MxNativeError::RuntimeUrlMissing)?;
        if !url.starts_with(origin) {
            warn!(url, origin, "refusing OTA download from untrusted origin");
            return Err(MxNativeError::UntrustedOrigin(url.to_owned()));
        }

        let package = staged_package_name();
        let destination = self.paths.root().join(&package);
        info!(url, package = %package, "downloading OTA package");

        let options = DownloadOptions::new(self.settings.connect_timeout);
        match download_to(self.client.as_ref(), url, &destination, &options, |_, _| {}).await {
            Ok(bytes) => {
                info!(package = %package, bytes, "OTA package downloaded");
                Ok(OtaDownloadResponse {
                    ota_package: package,
                })
            }
            Err(e) => {
                error!(error = %e, "OTA download failed");
                Err(MxNativeError::DownloadFailed(Box::new(e)))
            }
        }
    }

    /// Extract a staged package and make it the active bundle.
    ///
    /// Returns the manifest that is now active.
    #[instrument(skip_all)]
    pub async fn deploy(&self, config: &OtaDeployConfig) -> Result<OtaManifest> {
        let request = config.validate()?;
        let package = self
            .paths
            .resolve(request.ota_package)
            .ok_or(MxNativeError::InvalidDeployConfig("otaPackage"))?;
        let extraction_dir = self
            .paths
            .resolve(request.extraction_dir)
            .ok_or(MxNativeError::InvalidDeployConfig("extractionDir"))?;
        let relative_dir = self
            .paths
            .relative(&extraction_dir)
            .ok_or(MxNativeError::InvalidDeployConfig("extractionDir"))?;
        // The extraction directory is wiped before unzipping, so it must not
        // hold the manifest or the package being deployed.
        if self.paths.manifest_path().starts_with(&extraction_dir)
            || package.starts_with(&extraction_dir)
        {
            warn!(dir = %extraction_dir.display(), "extraction directory overlaps the manifest or package");
            return Err(MxNativeError::InvalidDeployConfig("extractionDir"));
        }

        let previous = self.manifests.read();
        info!(deployment_id = request.deployment_id, "deploying OTA");

        if !fs::try_exists(&package).await? {
            error!(package = %package.display(), "OTA package does not exist");
            return Err(MxNativeError::PackageMissing(package));
        }

        if fs::try_exists(&extraction_dir).await? {
            warn!(dir = %extraction_dir.display(), "extraction directory exists, removing it");
            remove_path(&extraction_dir)
                .await
                .map_err(|e| MxNativeError::DeployFailed(Box::new(e)))?;
        }

        debug!("unzipping bundle");
        if let Err(e) = archive::extract(&package, &extraction_dir).await {
            self.discard(&extraction_dir).await;
            error!(error = %e, "OTA deployment failed");
            return Err(MxNativeError::DeployFailed(Box::new(e)));
        }

        let manifest = OtaManifest {
            deployment_id: request.deployment_id.to_owned(),
            relative_bundle_path: format!("{relative_dir}/{}", self.settings.bundle_file_name),
            app_version: self.settings.app_version.clone(),
        };
        if let Err(e) = self.manifests.write(&manifest).await {
            self.discard(&extraction_dir).await;
            error!(error = %e, "OTA deployment failed");
            return Err(MxNativeError::DeployFailed(Box::new(e)));
        }

        if let Some(old) = previous.filter(|old| old.deployment_id != manifest.deployment_id) {
            self.remove_previous_bundle(&old, &extraction_dir).await;
        }

        if let Err(e) = remove_path(&package).await {
            warn!(package = %package.display(), error = %e, "could not remove staged package");
        }

        info!(deployment_id = %manifest.deployment_id, "OTA deployed");
        Ok(manifest)
    }

    /// Best-effort removal of the directory holding the previous bundle.
    async fn remove_previous_bundle(&self, old: &OtaManifest, new_dir: &Path) {
        let Some(old_dir) = self
            .paths
            .resolve(&old.relative_bundle_path)
            .and_then(|bundle| bundle.parent().map(Path::to_path_buf))
        else {
            warn!(path = %old.relative_bundle_path, "previous bundle path is not under the OTA root");
            return;
        };
        // A new bundle nested inside the old directory goes with it.
        if new_dir.starts_with(&old_dir) || self.paths.is_root(&old_dir) {
            debug!(dir = %old_dir.display(), "previous bundle directory kept");
            return;
        }

        match remove_path(&old_dir).await {
            Ok(()) => info!(
                deployment_id = %old.deployment_id,
                dir = %old_dir.display(),
                "previous bundle removed"
            ),
            Err(e) => warn!(dir = %old_dir.display(), error = %e, "could not remove previous bundle"),
        }
    }

    async fn discard(&self, extraction_dir: &Path) {
        if let Err(e) = remove_path(extraction_dir).await {
            warn!(dir = %extraction_dir.display(), error = %e, "could not remove extraction directory");
        }
    }
}
