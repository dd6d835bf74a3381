//! At-rest encryption for provider access tokens stored in sessions.
//!
//! Ciphertext layout: base64(nonce || AES-256-GCM ciphertext).

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const KEY_CONTEXT: &[u8] = b"gitfables/provider-token-cipher/v1";

#[derive(Debug, Error)]
pub enum TokenCipherError {
    #[error("failed to encrypt provider token")]
    Encrypt,
    #[error("stored provider token is malformed")]
    Malformed,
    #[error("failed to decrypt provider token")]
    Decrypt,
}

pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Derive the AES key from the session secret so only one secret is configured.
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_CONTEXT);
        hasher.update(secret);
        let digest = hasher.finalize();
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    pub fn encrypt(&self, token: &SecretString) -> Result<String, TokenCipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, token.expose_secret().as_bytes())
            .map_err(|_| TokenCipherError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<SecretString, TokenCipherError> {
        let raw = BASE64
            .decode(encoded)
            .map_err(|_| TokenCipherError::Malformed)?;
        if raw.len() <= NONCE_LEN {
            return Err(TokenCipherError::Malformed);
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| TokenCipherError::Decrypt)?;
        let token = String::from_utf8(plaintext).map_err(|_| TokenCipherError::Malformed)?;
        Ok(SecretString::from(token))
    }
}
