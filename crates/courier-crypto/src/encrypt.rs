use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::{CryptoError, Result};

const NONCE_LEN: usize = 12;

/// Encrypt a plaintext message with AES-256-GCM.
/// Returns (ciphertext, nonce).
pub fn encrypt_message(key: &[u8; 32], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_LEN])> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Encrypt)?;

    Ok((ciphertext, nonce_bytes))
}

/// Decrypt a ciphertext message with AES-256-GCM.
pub fn decrypt_message(key: &[u8; 32], ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::Malformed);
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Decrypt)
}

/// Seals message bodies into self-contained base64 tokens (`nonce || ciphertext`).
#[derive(Clone)]
pub struct MessageCipher {
    key: [u8; 32],
}

impl MessageCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<String> {
        let (ciphertext, nonce) = encrypt_message(&self.key, plaintext)?;
        let mut token = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        token.extend_from_slice(&nonce);
        token.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(token))
    }

    pub fn open(&self, sealed: &str) -> Result<Vec<u8>> {
        let token = BASE64.decode(sealed).map_err(|_| CryptoError::Malformed)?;
        if token.len() < NONCE_LEN {
            return Err(CryptoError::Malformed);
        }
        let (nonce, ciphertext) = token.split_at(NONCE_LEN);
        decrypt_message(&self.key, ciphertext, nonce)
    }

    /// Open a sealed UTF-8 text body.
    pub fn open_text(&self, sealed: &str) -> Result<String> {
        String::from_utf8(self.open(sealed)?).map_err(|_| CryptoError::Malformed)
    }
}

impl std::fmt::Debug for MessageCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCipher").finish_non_exhaustive()
    }
}
