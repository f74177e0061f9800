//! At-rest encryption of restaurant gateway credentials.
//!
//! Stored values are `base64(nonce || ciphertext)` under AES-256-GCM with a
//! 12-byte random nonce per value.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::{ExposeSecret, Secret};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Invalid ciphertext encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Ciphertext too short")]
    Truncated,

    #[error("Decryption failed")]
    Decrypt,

    #[error("Encryption failed")]
    Encrypt,

    #[error("Decrypted value is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    /// Builds a cipher from a base64-encoded 32-byte key.
    pub fn from_base64_key(key: &Secret<String>) -> Result<Self, CipherError> {
        let bytes = STANDARD
            .decode(key.expose_secret().trim())
            .map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        if bytes.len() != KEY_LEN {
            return Err(CipherError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            )));
        }
        let cipher =
            Aes256Gcm::new_from_slice(&bytes).map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    pub fn seal(&self, plaintext: &str) -> Result<String, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;

        let mut stored = nonce.to_vec();
        stored.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(stored))
    }

    pub fn open(&self, stored: &str) -> Result<String, CipherError> {
        let data = STANDARD.decode(stored.trim())?;
        if data.len() <= NONCE_LEN {
            return Err(CipherError::Truncated);
        }

        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Decrypt)?;
        Ok(String::from_utf8(plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> Secret<String> {
        Secret::new(STANDARD.encode([byte; KEY_LEN]))
    }

    #[test]
    fn sealed_values_open_with_the_same_key() {
        let cipher = CredentialCipher::from_base64_key(&key(7)).unwrap();
        let sealed = cipher.seal("cf_client_secret").unwrap();

        assert_ne!(sealed, "cf_client_secret");
        assert_eq!(cipher.open(&sealed).unwrap(), "cf_client_secret");
    }

    #[test]
    fn nonces_differ_between_seals() {
        let cipher = CredentialCipher::from_base64_key(&key(7)).unwrap();
        assert_ne!(cipher.seal("same").unwrap(), cipher.seal("same").unwrap());
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let sealed = CredentialCipher::from_base64_key(&key(1))
            .unwrap()
            .seal("secret")
            .unwrap();
        let other = CredentialCipher::from_base64_key(&key(2)).unwrap();
        assert!(matches!(other.open(&sealed), Err(CipherError::Decrypt)));
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        let cipher = CredentialCipher::from_base64_key(&key(3)).unwrap();
        assert!(matches!(cipher.open("not base64!"), Err(CipherError::Encoding(_))));
        assert!(matches!(
            cipher.open(&STANDARD.encode([0u8; 8])),
            Err(CipherError::Truncated)
        ));

        let short_key = Secret::new(STANDARD.encode([0u8; 16]));
        assert!(matches!(
            CredentialCipher::from_base64_key(&short_key),
            Err(CipherError::InvalidKey(_))
        ));
    }
}
