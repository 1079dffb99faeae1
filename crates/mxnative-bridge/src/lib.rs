// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! mxnative-bridge: native platform capabilities.
//!
//! The traits in [`traits`] are what the rest of the workspace sees. Android
//! goes through JNI, iOS through `objc2`, and every other target gets the
//! desktop [`stub`] that reads its answers from the environment.

pub mod traits;

#[cfg(target_os = "ios")]
pub mod ios;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub mod stub;

pub use traits::{NativeAppInfo, NativeKeychain, NativeRuntimeResources, PlatformBridge};

/// The bridge implementation for the target operating system.
pub fn platform_bridge() -> Box<dyn PlatformBridge> {
    #[cfg(target_os = "ios")]
    {
        Box::new(ios::IosBridge::new())
    }
    #[cfg(target_os = "android")]
    {
        Box::new(android::AndroidBridge::new())
    }
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        Box::new(stub::StubBridge::from_env())
    }
}
