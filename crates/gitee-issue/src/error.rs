//! Vault errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

/// Errors raised by the credential store and cipher
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Encryption error: {0}")]
    Crypto(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Stable classification of a [`VaultError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Storage,
    Crypto,
    NotFound,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Storage => "storage",
            ErrorKind::Crypto => "crypto",
            ErrorKind::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::Storage(_) | VaultError::Database(_) => ErrorKind::Storage,
            VaultError::Crypto(_) => ErrorKind::Crypto,
            VaultError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    pub(crate) fn crypto(msg: impl Into<String>) -> Self {
        VaultError::Crypto(msg.into())
    }
}
