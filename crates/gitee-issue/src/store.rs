//! SQLite credential store
//!
//! One table, `tokens`, holds a row per (owner, repo) access token. Tokens are
//! encrypted through a [`Cipher`] before they are written and only decrypted
//! on request. At most one row carries `isDefault = 1`; every default
//! transition happens inside a single transaction.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::cipher::{AesCbcCipher, Cipher};
use crate::error::{Result, VaultError};

/// How long to wait on a database locked by another process
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "SELECT id, repo, owner, encrypted_token, isDefault FROM tokens";

/// A stored access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    pub id: i64,
    pub repo: String,
    pub owner: String,
    /// Base64 ciphertext, never the plaintext token
    #[serde(skip_serializing)]
    pub encrypted_token: String,
    #[serde(rename = "default")]
    pub is_default: bool,
}

impl Credential {
    /// `owner/repo` label used in listings
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            repo: row.get(1)?,
            owner: row.get(2)?,
            encrypted_token: row.get(3)?,
            is_default: row.get::<_, Option<i64>>(4)?.unwrap_or(0) != 0,
        })
    }
}

/// Encrypted credential table with single-default semantics
pub struct CredentialStore<C: Cipher = AesCbcCipher> {
    conn: Option<Connection>,
    path: PathBuf,
    cipher: C,
}

impl CredentialStore<AesCbcCipher> {
    /// Open or create the store using the built-in cipher
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_cipher(path, AesCbcCipher::embedded())
    }
}

impl<C: Cipher> CredentialStore<C> {
    /// Open or create the store, encrypting tokens with `cipher`
    pub fn open_with_cipher(path: &Path, cipher: C) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                VaultError::Storage(format!(
                    "failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let store = Self {
            conn: Some(conn),
            path: path.to_path_buf(),
            cipher,
        };
        store.init_schema()?;

        debug!(path = %path.display(), "opened credential store");
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                repo TEXT NOT NULL,
                owner TEXT NOT NULL,
                encrypted_token TEXT NOT NULL,
                isDefault INTEGER DEFAULT 0
            );
            "#,
        )?;
        Ok(())
    }

    /// Path of the backing database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Release the database handle. Calling this again does nothing.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                warn!(error = %e, "error while closing credential store");
            }
            debug!(path = %self.path.display(), "closed credential store");
        }
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| VaultError::Storage("store is closed".to_string()))
    }

    fn conn_mut(&mut self) -> Result<&mut Connection> {
        self.conn
            .as_mut()
            .ok_or_else(|| VaultError::Storage("store is closed".to_string()))
    }

    /// Encrypt and insert a token. The first row in an empty store becomes
    /// the default.
    pub fn add_credential(&mut self, repo: &str, owner: &str, token: &str) -> Result<Credential> {
        let encrypted_token = self.cipher.encrypt(token)?;

        let tx = self
            .conn_mut()?
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: i64 = tx.query_row("SELECT COUNT(*) FROM tokens", [], |row| row.get(0))?;
        let is_default = existing == 0;

        tx.execute(
            "INSERT INTO tokens (repo, owner, encrypted_token, isDefault)
             VALUES (?1, ?2, ?3, ?4)",
            params![repo, owner, encrypted_token, is_default as i64],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(id, repo, owner, is_default, "added credential");

        Ok(Credential {
            id,
            repo: repo.to_string(),
            owner: owner.to_string(),
            encrypted_token,
            is_default,
        })
    }

    /// All credentials in insertion order, tokens still encrypted
    pub fn list_credentials(&self) -> Result<Vec<Credential>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_COLUMNS))?;

        let credentials = stmt
            .query_map([], Credential::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(count = credentials.len(), "listed credentials");
        Ok(credentials)
    }

    /// Look up a single credential by id
    pub fn get_credential(&self, id: i64) -> Result<Option<Credential>> {
        self.conn()?
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                Credential::from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// The default credential, if one is set
    pub fn get_default_credential(&self) -> Result<Option<Credential>> {
        self.conn()?
            .query_row(
                &format!("{} WHERE isDefault = 1 ORDER BY id LIMIT 1", SELECT_COLUMNS),
                [],
                Credential::from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Decrypt the token of the default credential.
    ///
    /// Fails with `NotFound` when no default is set and with `Crypto` when the
    /// stored ciphertext is empty or does not decrypt.
    pub fn get_decrypted_default_token(&self) -> Result<String> {
        let credential = self
            .get_default_credential()?
            .ok_or_else(|| VaultError::NotFound("no default credential".to_string()))?;

        if credential.encrypted_token.is_empty() {
            return Err(VaultError::Crypto(format!(
                "default credential {} has an empty token",
                credential.slug()
            )));
        }

        self.decrypt_token(&credential)
    }

    /// Decrypt the token of a credential returned by this store
    pub fn decrypt_token(&self, credential: &Credential) -> Result<String> {
        match self.cipher.decrypt(&credential.encrypted_token) {
            Ok(token) => Ok(token),
            Err(e) => {
                warn!(id = credential.id, error = %e, "failed to decrypt stored token");
                Err(e)
            }
        }
    }

    /// Make the oldest credential for `repo` the only default.
    ///
    /// Returns the number of default rows afterwards. When nothing matches
    /// the store is left with no default at all.
    pub fn set_default(&mut self, repo: &str) -> Result<usize> {
        let tx = self
            .conn_mut()?
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute("UPDATE tokens SET isDefault = 0", [])?;
        let updated = tx.execute(
            "UPDATE tokens SET isDefault = 1
             WHERE id = (SELECT MIN(id) FROM tokens WHERE repo = ?1)",
            params![repo],
        )?;
        tx.commit()?;

        if updated == 0 {
            warn!(repo, "no credential matches; store now has no default");
        } else {
            debug!(repo, "set default credential");
        }
        Ok(updated)
    }

    /// Make the credential with `id` the only default. An unknown id leaves
    /// the previous default in place.
    pub fn set_default_by_id(&mut self, id: i64) -> Result<()> {
        let tx = self
            .conn_mut()?
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute("UPDATE tokens SET isDefault = 0", [])?;
        let updated = tx.execute("UPDATE tokens SET isDefault = 1 WHERE id = ?1", params![id])?;
        if updated == 0 {
            return Err(VaultError::NotFound(format!("no credential with id {}", id)));
        }
        tx.commit()?;

        debug!(id, "set default credential");
        Ok(())
    }

    /// Delete every credential for `owner`/`repo`, returning how many rows
    /// went away. Deleting the default does not promote another row.
    pub fn delete_credential(&mut self, owner: &str, repo: &str) -> Result<usize> {
        let deleted = self.conn()?.execute(
            "DELETE FROM tokens WHERE owner = ?1 AND repo = ?2",
            params![owner, repo],
        )?;

        debug!(owner, repo, deleted, "deleted credentials");
        Ok(deleted)
    }
}

impl<C: Cipher> Drop for CredentialStore<C> {
    fn drop(&mut self) {
        self.close();
    }
}
