//! gitee-issue - Issue creation with a local credential vault
//!
//! Access tokens are kept per repository in a SQLite file under
//! `~/.gitee-issue`, encrypted with AES-256-CBC and stored as base64.
//! Exactly one credential may be the default, used whenever the caller
//! leaves out owner, repo or token.

pub mod cipher;
pub mod client;
pub mod error;
pub mod store;

pub use cipher::{AesCbcCipher, Cipher};
pub use client::{CreatedIssue, IssueClient, IssueError, NewIssue};
pub use error::{ErrorKind, Result, VaultError};
pub use store::{Credential, CredentialStore};
