//! Token cipher - AES-256-CBC with base64 text encoding
//!
//! The store only talks to the [`Cipher`] trait. [`AesCbcCipher::embedded`]
//! carries the built-in key and IV so that databases written by earlier
//! releases still decrypt. Anyone holding the binary can recover that key,
//! so callers with a real secret should construct the cipher with
//! [`AesCbcCipher::new`] instead.
//!
//! Encryption is deterministic: the IV is fixed, so the same token always
//! produces the same ciphertext.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{Result, VaultError};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Largest plaintext accepted by [`AesCbcCipher::encrypt`] (64 KiB)
pub const MAX_SECRET_LEN: usize = 64 * 1024;

const EMBEDDED_KEY: [u8; 32] = [
    0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0, //
    0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, //
    0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, //
    0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80,
];

const EMBEDDED_IV: [u8; 16] = *b"0123456789abcdef";

/// Symmetric encryption of token values into storable text
pub trait Cipher {
    /// Encrypt a secret into printable ciphertext
    fn encrypt(&self, plaintext: &str) -> Result<String>;

    /// Recover the secret from ciphertext produced by [`Cipher::encrypt`]
    fn decrypt(&self, ciphertext: &str) -> Result<String>;
}

/// AES-256-CBC with PKCS#7 padding and a fixed IV
#[derive(Clone)]
pub struct AesCbcCipher {
    key: [u8; 32],
    iv: [u8; 16],
}

impl std::fmt::Debug for AesCbcCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesCbcCipher").finish_non_exhaustive()
    }
}

impl Default for AesCbcCipher {
    fn default() -> Self {
        Self::embedded()
    }
}

impl AesCbcCipher {
    /// Create a cipher from an explicit key and IV
    pub fn new(key: [u8; 32], iv: [u8; 16]) -> Self {
        Self { key, iv }
    }

    /// The built-in key and IV shared by every installation
    pub fn embedded() -> Self {
        Self::new(EMBEDDED_KEY, EMBEDDED_IV)
    }
}

/// Length of `len` bytes after PKCS#7 padding (always at least one extra byte)
fn padded_len(len: usize) -> usize {
    (len / BLOCK_SIZE + 1) * BLOCK_SIZE
}

impl Cipher for AesCbcCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let input = plaintext.as_bytes();
        if input.len() > MAX_SECRET_LEN {
            return Err(VaultError::crypto(format!(
                "secret is {} bytes, maximum is {}",
                input.len(),
                MAX_SECRET_LEN
            )));
        }

        let mut buf = vec![0u8; padded_len(input.len())];
        buf[..input.len()].copy_from_slice(input);

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_mut::<Pkcs7>(&mut buf, input.len())
            .map_err(|_| VaultError::crypto("failed to pad plaintext"))?;

        Ok(STANDARD.encode(ciphertext))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        if ciphertext.is_empty() {
            return Err(VaultError::crypto("ciphertext is empty"));
        }

        let mut buf = STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| VaultError::crypto(format!("invalid base64: {}", e)))?;

        if buf.is_empty() || buf.len() % BLOCK_SIZE != 0 {
            return Err(VaultError::crypto(format!(
                "ciphertext length {} is not a whole number of blocks",
                buf.len()
            )));
        }
        if buf.len() > padded_len(MAX_SECRET_LEN) {
            return Err(VaultError::crypto("ciphertext exceeds maximum secret size"));
        }

        let plaintext = Aes256CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|_| VaultError::crypto("bad padding (wrong key or corrupted data)"))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| VaultError::crypto("decrypted token is not valid UTF-8"))
    }
}
