// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! mxnative-security: cryptographic building blocks for the runtime bridge.
//!
//! - [`cipher`]: symmetric value encryption used for cookies and stored values.
//! - [`storage`]: sealed files for the encrypted file backend.
//! - [`kv`]: the encrypted key-value store exposed to the JS runtime.

pub mod cipher;
pub mod kv;
pub mod storage;

pub use cipher::{AesGcmCipher, EncryptedValue, ValueCipher};
pub use kv::EncryptedKeyValueStore;
pub use storage::FileSealer;
