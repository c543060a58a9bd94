use chrono::{DateTime, Utc};
use thiserror::Error;

use courier_crypto::CryptoError;
use courier_db::StoreError;
use courier_types::api::ErrorCode;

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("username and password are required")]
    MissingField,
    #[error("username already taken")]
    UserExists,
    #[error("password shorter than {min} characters")]
    PasswordTooShort { min: usize },
    #[error("password hashing failed")]
    Hash,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RegisterError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingField => ErrorCode::MissingFields,
            Self::UserExists => ErrorCode::UserExists,
            Self::PasswordTooShort { .. } => ErrorCode::PwTooShort,
            Self::Hash | Self::Store(_) => ErrorCode::InternalError,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("no such user")]
    NoSuchUser,
    #[error("account locked until {until}")]
    LockedOut { until: DateTime<Utc> },
    #[error("bad credentials (strike {strike}/3)")]
    BadCredentials { strike: u8 },
    #[error("bad credentials, account locked until {until}")]
    LockedAfterThreeStrikes { until: DateTime<Utc> },
    #[error("stored credential is unreadable")]
    CorruptCredential,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LoginError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoSuchUser => ErrorCode::NoSuchUser,
            Self::LockedOut { .. } => ErrorCode::LockedOut,
            Self::BadCredentials { .. } => ErrorCode::BadCredentials,
            Self::LockedAfterThreeStrikes { .. } => ErrorCode::LockedAfter3,
            Self::CorruptCredential | Self::Store(_) => ErrorCode::InternalError,
        }
    }

    /// Strike number to show the caller, if this failure counted as one.
    pub fn strike(&self) -> Option<u8> {
        match self {
            Self::BadCredentials { strike } => Some(*strike),
            Self::LockedAfterThreeStrikes { .. } => Some(crate::auth::MAX_STRIKES),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliverError {
    #[error("sender, recipient and content are required")]
    MissingFields,
    #[error("no such recipient")]
    NoSuchRecipient,
    #[error("file content is not valid base64")]
    InvalidContent,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DeliverError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingFields => ErrorCode::MissingFields,
            Self::NoSuchRecipient => ErrorCode::NoSuchUser,
            Self::InvalidContent => ErrorCode::InvalidContent,
            Self::Crypto(_) | Self::Store(_) => ErrorCode::InternalError,
        }
    }
}

/// Failures of conversation, search and presence operations.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("peer is required")]
    MissingPeer,
    #[error("no such peer")]
    NoSuchPeer,
    #[error("search query is empty")]
    EmptyQuery,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingPeer => ErrorCode::MissingPeer,
            Self::NoSuchPeer => ErrorCode::NoSuchUser,
            Self::EmptyQuery => ErrorCode::EmptyQuery,
            Self::Store(_) => ErrorCode::InternalError,
        }
    }
}
