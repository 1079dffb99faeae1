// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sealed files: age (X25519) encryption of whole file bodies for the
// encrypted file backend. The identity is generated once per install and kept
// in the platform keychain as its Bech32 string.

use std::io::{Read, Write};

use age::secrecy::ExposeSecret;
use age::x25519;
use mxnative_core::error::{MxNativeError, Result};
use tracing::{debug, instrument};

/// Every age file starts with this header line.
const AGE_MAGIC: &[u8] = b"age-encryption.org/v1";

/// Seals and opens file contents with a per-install X25519 identity.
pub struct FileSealer {
    identity: x25519::Identity,
    recipient: x25519::Recipient,
}

impl FileSealer {
    /// Create a sealer with a freshly generated identity.
    pub fn generate() -> Self {
        Self::from_identity(x25519::Identity::generate())
    }

    /// Restore a sealer from an identity previously returned by
    /// [`FileSealer::export_identity`].
    pub fn from_secret(secret: &str) -> Result<Self> {
        let identity = secret
            .trim()
            .parse::<x25519::Identity>()
            .map_err(|e| MxNativeError::Decryption(format!("invalid sealing identity: {e}")))?;
        Ok(Self::from_identity(identity))
    }

    fn from_identity(identity: x25519::Identity) -> Self {
        let recipient = identity.to_public();
        Self {
            identity,
            recipient,
        }
    }

    /// Bech32 form of the identity, suitable for keychain storage.
    pub fn export_identity(&self) -> String {
        self.identity.to_string().expose_secret().to_owned()
    }

    /// Whether `bytes` look like a sealed file.
    pub fn is_sealed(bytes: &[u8]) -> bool {
        bytes.starts_with(AGE_MAGIC)
    }

    /// Encrypt `plaintext` into a complete age file.
    #[instrument(skip_all, fields(plaintext_len = plaintext.len()))]
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let encryptor =
            age::Encryptor::with_recipients(std::iter::once(&self.recipient as &dyn age::Recipient))
                .map_err(|e| MxNativeError::Encryption(e.to_string()))?;
        let mut sealed = Vec::new();

        let mut writer = encryptor
            .wrap_output(&mut sealed)
            .map_err(|e| MxNativeError::Encryption(e.to_string()))?;

        writer
            .write_all(plaintext)
            .map_err(|e| MxNativeError::Encryption(e.to_string()))?;

        writer
            .finish()
            .map_err(|e| MxNativeError::Encryption(e.to_string()))?;

        debug!(sealed_len = sealed.len(), "file body sealed");
        Ok(sealed)
    }

    /// Decrypt a complete age file back into its plaintext.
    #[instrument(skip_all, fields(sealed_len = sealed.len()))]
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        let decryptor =
            age::Decryptor::new(sealed).map_err(|e| MxNativeError::Decryption(e.to_string()))?;

        let mut reader = decryptor
            .decrypt(std::iter::once(&self.identity as &dyn age::Identity))
            .map_err(|e| MxNativeError::Decryption(e.to_string()))?;

        let mut plaintext = Vec::new();
        reader
            .read_to_end(&mut plaintext)
            .map_err(|e| MxNativeError::Decryption(e.to_string()))?;

        debug!(plaintext_len = plaintext.len(), "file body opened");
        Ok(plaintext)
    }
}
