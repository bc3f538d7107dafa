//! Pluggable credential cipher.

use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct CipherError(pub String);

/// Encrypts secrets before they reach the credential store and decrypts them
/// on the way back out.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError>;
}

/// Identity cipher. Stored secrets are readable by anyone with database access.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextCipher;

impl Cipher for PlaintextCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
        Ok(ciphertext.to_string())
    }
}
