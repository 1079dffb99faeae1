// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Boot-time bundle resolution.
//
// Runs synchronously on the boot path and never fails: every problem with
// the OTA state degrades to the next bundle source.

use std::path::PathBuf;

use tracing::{debug, info};
use url::Url;

use crate::manifest::ManifestStore;
use crate::paths::OtaPaths;

/// Decides whether the deployed OTA bundle may be loaded.
#[derive(Debug, Clone)]
pub struct BundleResolver {
    paths: OtaPaths,
    manifests: ManifestStore,
    app_version: String,
}

impl BundleResolver {
    pub fn new(paths: OtaPaths, app_version: impl Into<String>) -> Self {
        let manifests = ManifestStore::new(paths.manifest_path());
        Self {
            paths,
            manifests,
            app_version: app_version.into(),
        }
    }

    /// Absolute path of the deployed bundle, if it is usable.
    pub fn resolve_bundle_path(&self) -> Option<PathBuf> {
        if !self.manifests.path().exists() {
            debug!("no OTA manifest");
            return None;
        }
        let manifest = self.manifests.read()?;

        // A bundle installed under another app version may call native APIs
        // this binary does not have (or no longer has).
        if manifest.app_version != self.app_version {
            info!(
                installed_for = %manifest.app_version,
                running = %self.app_version,
                "new app version discovered, loading default bundle"
            );
            return None;
        }

        let bundle = self.paths.resolve(&manifest.relative_bundle_path)?;
        if !bundle.is_file() {
            info!(path = %bundle.display(), "OTA bundle missing, loading default bundle");
            return None;
        }
        Some(bundle)
    }

    /// `file://` URL of the deployed bundle, if it is usable.
    pub fn resolve_bundle_url(&self) -> Option<Url> {
        let path = self.resolve_bundle_path()?;
        Url::from_file_path(&path).ok()
    }
}

/// Where the runtime should load its bundle from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleSource {
    /// A deployed OTA bundle.
    Ota(Url),
    /// A developer-configured bundle URL (packager, dev server).
    Override(String),
    /// The bundle shipped inside the app binary.
    Bundled(String),
}

/// Bundle sources in priority order: OTA, override, bundled.
#[derive(Debug, Clone)]
pub struct BundleChain {
    ota: BundleResolver,
    override_url: Option<String>,
    bundled: String,
}

impl BundleChain {
    pub fn new(ota: BundleResolver, bundled: impl Into<String>) -> Self {
        Self {
            ota,
            override_url: None,
            bundled: bundled.into(),
        }
    }

    pub fn with_override(mut self, url: impl Into<String>) -> Self {
        self.override_url = Some(url.into()).filter(|u: &String| !u.trim().is_empty());
        self
    }

    pub fn resolve(&self) -> BundleSource {
        if let Some(url) = self.ota.resolve_bundle_url() {
            return BundleSource::Ota(url);
        }
        match &self.override_url {
            Some(url) => BundleSource::Override(url.clone()),
            None => BundleSource::Bundled(self.bundled.clone()),
        }
    }
}
