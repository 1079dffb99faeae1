// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Encrypted key-value storage backing the runtime's `encryptedStorage` API.
//
// Schema:
//   encrypted_items(
//     key        TEXT PRIMARY KEY,
//     ciphertext TEXT NOT NULL,   -- Base64 value envelope
//     iv         TEXT NOT NULL    -- Base64 nonce
//   )
//
// Keys are stored in plain so lookups stay indexed; only values are secret.

use std::path::Path;
use std::sync::Arc;

use mxnative_core::error::{MxNativeError, Result};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, instrument};

use crate::cipher::ValueCipher;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS encrypted_items (
    key        TEXT PRIMARY KEY,
    ciphertext TEXT NOT NULL,
    iv         TEXT NOT NULL
);";

fn db_err(e: rusqlite::Error) -> MxNativeError {
    MxNativeError::Storage(e.to_string())
}

/// SQLite-backed store whose values are encrypted with a [`ValueCipher`].
pub struct EncryptedKeyValueStore {
    conn: Connection,
    cipher: Arc<dyn ValueCipher>,
}

impl EncryptedKeyValueStore {
    /// Open (or create) the store at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, cipher: Arc<dyn ValueCipher>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!("encrypted storage opened");
        Ok(Self { conn, cipher })
    }

    /// Open an in-memory store (useful for tests).
    pub fn open_in_memory(cipher: Arc<dyn ValueCipher>) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self { conn, cipher })
    }

    #[instrument(skip(self, value))]
    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let sealed = self.cipher.encrypt(value)?;
        self.conn
            .execute(
                "INSERT INTO encrypted_items (key, ciphertext, iv) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET ciphertext = excluded.ciphertext, iv = excluded.iv",
                params![key, sealed.ciphertext, sealed.iv],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Returns `Ok(None)` when the key has never been set.
    #[instrument(skip(self))]
    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT ciphertext, iv FROM encrypted_items WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(db_err)?;

        row.map(|(ciphertext, iv)| self.cipher.decrypt(&ciphertext, &iv))
            .transpose()
    }

    #[instrument(skip(self))]
    pub fn remove_item(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM encrypted_items WHERE key = ?1", params![key])
            .map_err(db_err)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let removed = self
            .conn
            .execute("DELETE FROM encrypted_items", [])
            .map_err(db_err)?;
        debug!(removed, "encrypted storage cleared");
        Ok(())
    }

    /// Values in this store are always encrypted at rest.
    pub fn is_encrypted(&self) -> bool {
        true
    }

    /// Number of stored items.
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM encrypted_items", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::AesGcmCipher;

    fn store() -> EncryptedKeyValueStore {
        let key = AesGcmCipher::generate_key().expect("key");
        let cipher = Arc::new(AesGcmCipher::new(&key).expect("cipher"));
        EncryptedKeyValueStore::open_in_memory(cipher).expect("open store")
    }

    #[test]
    fn set_get_overwrite_remove() {
        let store = store();
        assert_eq!(store.get_item("token").expect("get"), None);

        store.set_item("token", "abc").expect("set");
        assert_eq!(store.get_item("token").expect("get").as_deref(), Some("abc"));

        store.set_item("token", "def").expect("overwrite");
        assert_eq!(store.get_item("token").expect("get").as_deref(), Some("def"));
        assert_eq!(store.len().expect("len"), 1);

        store.remove_item("token").expect("remove");
        assert_eq!(store.get_item("token").expect("get"), None);
    }

    #[test]
    fn values_are_not_stored_in_plain() {
        let store = store();
        store.set_item("pin", "1234").expect("set");
        let raw: String = store
            .conn
            .query_row(
                "SELECT ciphertext FROM encrypted_items WHERE key = 'pin'",
                [],
                |row| row.get(0),
            )
            .expect("raw row");
        assert!(!raw.contains("1234"));
        assert!(store.is_encrypted());
    }

    #[test]
    fn clear_removes_everything() {
        let store = store();
        store.set_item("a", "1").expect("set");
        store.set_item("b", "2").expect("set");
        store.clear().expect("clear");
        assert!(store.is_empty().expect("is_empty"));
    }
}
