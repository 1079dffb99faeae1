// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// mxnative-core: types, configuration and error definitions shared across all crates.

pub mod compat;
pub mod config;
pub mod error;
pub mod types;

pub use compat::CompatTable;
pub use config::RuntimeConfig;
pub use error::MxNativeError;
pub use types::*;
