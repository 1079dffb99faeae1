// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! mxnative-net: networking for the runtime bridge.
//!
//! - [`client`]: the HTTP client capability consumed by downloads and OTA.
//! - [`cookie`]: `Cookie` / `Set-Cookie` header parsing and formatting.
//! - [`interceptor`]: transparent cookie encryption for the trusted runtime host.

pub mod client;
pub mod cookie;
pub mod interceptor;

pub use cookie::SetCookie;
pub use client::{BodyStream, HttpClient, HttpResponse, ReqwestClient};
pub use interceptor::{CookieEncryptionInterceptor, ENCRYPTED_COOKIE_PREFIX, IV_DELIMITER};
