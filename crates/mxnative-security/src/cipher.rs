// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// AES-256-GCM value cipher via `ring`. One random nonce per call.
//
// Output is text-safe: both the ciphertext and the nonce are standard Base64,
// whose alphabet contains no `_`, so they can be joined with the cookie
// delimiter without escaping.
//
// Envelope (before Base64): [scheme version: 1 byte][ciphertext][GCM tag: 16 bytes]

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use mxnative_core::error::{MxNativeError, Result};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, instrument};

/// Current envelope scheme. Bump when the algorithm or key layout changes.
pub const SCHEME_V1: u8 = 1;

/// Length in bytes of an AES-256 key.
pub const KEY_LEN: usize = 32;

/// Base64 ciphertext plus the Base64 nonce it was sealed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedValue {
    pub ciphertext: String,
    pub iv: String,
}

/// Symmetric text encryption capability.
///
/// Implementations must satisfy `decrypt(encrypt(v)) == v` for every string.
pub trait ValueCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<EncryptedValue>;

    fn decrypt(&self, ciphertext: &str, iv: &str) -> Result<String>;
}

/// AES-256-GCM implementation of [`ValueCipher`].
pub struct AesGcmCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl AesGcmCipher {
    /// Build a cipher from raw key bytes (must be [`KEY_LEN`] long).
    pub fn new(key: &[u8]) -> Result<Self> {
        let unbound = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|_| MxNativeError::Encryption(format!("key must be {KEY_LEN} bytes")))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Generate fresh key material. The caller is responsible for persisting it
    /// (normally in the platform keychain).
    pub fn generate_key() -> Result<[u8; KEY_LEN]> {
        let mut key = [0u8; KEY_LEN];
        SystemRandom::new()
            .fill(&mut key)
            .map_err(|_| MxNativeError::Encryption("system RNG unavailable".into()))?;
        Ok(key)
    }
}

impl ValueCipher for AesGcmCipher {
    #[instrument(skip_all, fields(plaintext_len = plaintext.len()))]
    fn encrypt(&self, plaintext: &str) -> Result<EncryptedValue> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| MxNativeError::Encryption("system RNG unavailable".into()))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| MxNativeError::Encryption("AES-GCM seal failed".into()))?;

        let mut envelope = Vec::with_capacity(in_out.len() + 1);
        envelope.push(SCHEME_V1);
        envelope.extend_from_slice(&in_out);

        debug!(envelope_len = envelope.len(), "value encrypted");
        Ok(EncryptedValue {
            ciphertext: STANDARD.encode(envelope),
            iv: STANDARD.encode(nonce_bytes),
        })
    }

    #[instrument(skip_all, fields(ciphertext_len = ciphertext.len()))]
    fn decrypt(&self, ciphertext: &str, iv: &str) -> Result<String> {
        let envelope = STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| MxNativeError::Decryption(format!("ciphertext is not base64: {e}")))?;
        let nonce_bytes = STANDARD
            .decode(iv.trim())
            .map_err(|e| MxNativeError::Decryption(format!("iv is not base64: {e}")))?;

        let (&scheme, sealed) = envelope
            .split_first()
            .ok_or_else(|| MxNativeError::Decryption("empty ciphertext".into()))?;
        if scheme != SCHEME_V1 {
            return Err(MxNativeError::Decryption(format!(
                "unsupported cipher scheme {scheme}"
            )));
        }

        let nonce = Nonce::try_assume_unique_for_key(&nonce_bytes)
            .map_err(|_| MxNativeError::Decryption(format!("iv must be {NONCE_LEN} bytes")))?;

        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| MxNativeError::Decryption("authentication failed".into()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|e| MxNativeError::Decryption(format!("plaintext is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> AesGcmCipher {
        let key = AesGcmCipher::generate_key().expect("key generation");
        AesGcmCipher::new(&key).expect("cipher")
    }

    #[test]
    fn round_trip_representative_values() {
        let cipher = cipher();
        for value in [
            "",
            "abc",
            "session-token-1234567890",
            "héllo wörld ✓ 日本語",
            "___enc___",
            "a___enc___b",
            "\"quoted\"; path=/",
        ] {
            let sealed = cipher.encrypt(value).expect("encrypt");
            let opened = cipher.decrypt(&sealed.ciphertext, &sealed.iv).expect("decrypt");
            assert_eq!(opened, value);
        }
    }

    #[test]
    fn output_never_contains_delimiter_characters() {
        let cipher = cipher();
        let sealed = cipher.encrypt("___enc___").expect("encrypt");
        assert!(!sealed.ciphertext.contains('_'));
        assert!(!sealed.iv.contains('_'));
    }

    #[test]
    fn fresh_nonce_per_call() {
        let cipher = cipher();
        let a = cipher.encrypt("same").expect("encrypt");
        let b = cipher.encrypt("same").expect("encrypt");
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = cipher().encrypt("secret").expect("encrypt");
        assert!(matches!(
            cipher().decrypt(&sealed.ciphertext, &sealed.iv),
            Err(MxNativeError::Decryption(_))
        ));
    }

    #[test]
    fn tampered_or_unknown_scheme_fails() {
        let cipher = cipher();
        let sealed = cipher.encrypt("secret").expect("encrypt");

        let mut envelope = STANDARD.decode(&sealed.ciphertext).expect("base64");
        envelope[0] = 9;
        let unknown = STANDARD.encode(&envelope);
        assert!(cipher.decrypt(&unknown, &sealed.iv).is_err());

        envelope[0] = SCHEME_V1;
        let last = envelope.len() - 1;
        envelope[last] ^= 0xff;
        let tampered = STANDARD.encode(&envelope);
        assert!(cipher.decrypt(&tampered, &sealed.iv).is_err());
    }

    #[test]
    fn rejects_bad_key_length() {
        assert!(AesGcmCipher::new(&[0u8; 16]).is_err());
    }
}
