//! Courier Crypto Library
//!
//! Server-held symmetric key (AES-256-GCM) used to seal message bodies at rest.
//! One key per deployment, generated on first run and reused afterwards.
//! No rotation: a lost key file makes every stored body unreadable.

pub mod digest;
pub mod encrypt;
pub mod keys;

pub use encrypt::MessageCipher;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed")]
    Decrypt,
    #[error("malformed sealed payload")]
    Malformed,
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("key file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
