// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! mxnative-ota: over-the-air bundle updates.
//!
//! Layout of the OTA root:
//!
//! ```text
//! <ota-root>/
//!   manifest.json          currently active deployment
//!   <uuid>.zip             staged packages awaiting deploy
//!   <extraction-dir>/...   deployed bundle trees
//! ```
//!
//! The [`pipeline`] downloads and deploys packages; the [`resolver`] decides
//! at boot whether the deployed bundle may be loaded.

pub mod manifest;
pub mod paths;
pub mod pipeline;
pub mod resolver;

pub use manifest::ManifestStore;
pub use paths::OtaPaths;
pub use pipeline::{OtaPipeline, PipelineSettings};
pub use resolver::{BundleChain, BundleResolver, BundleSource};
