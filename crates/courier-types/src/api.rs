use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// -- Envelope --

/// One request frame as read off a client connection.
///
/// Any JSON object decodes: an `action` that is missing or not a string reads
/// as `""` (an unknown action), a `username` that is not a string reads as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, deserialize_with = "string_or_empty")]
    pub action: String,
    #[serde(default, deserialize_with = "string_or_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub data: Value,
}

fn string_or_empty<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(string_or_none(de)?.unwrap_or_default())
}

fn string_or_none<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// One response frame. Action-specific fields are flattened next to `ok`/`error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    pub error: Option<ErrorCode>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
            fields: Map::new(),
        }
    }

    pub fn error(code: ErrorCode) -> Self {
        Self {
            ok: false,
            error: Some(code),
            fields: Map::new(),
        }
    }

    /// Attach an extra field. Serialization failures degrade to `null`.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Stable error codes carried in `Response::error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MissingFields,
    PwTooShort,
    UserExists,
    NoSuchUser,
    LockedOut,
    BadCredentials,
    #[serde(rename = "locked_after_3")]
    LockedAfter3,
    MissingPeer,
    EmptyQuery,
    InvalidContent,
    NotLoggedIn,
    UnknownAction,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingFields => "missing_fields",
            Self::PwTooShort => "pw_too_short",
            Self::UserExists => "user_exists",
            Self::NoSuchUser => "no_such_user",
            Self::LockedOut => "locked_out",
            Self::BadCredentials => "bad_credentials",
            Self::LockedAfter3 => "locked_after_3",
            Self::MissingPeer => "missing_peer",
            Self::EmptyQuery => "empty_query",
            Self::InvalidContent => "invalid_content",
            Self::NotLoggedIn => "not_logged_in",
            Self::UnknownAction => "unknown_action",
            Self::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Auth --

/// `data` for `register` and `login`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub user: String,
    pub pw: String,
}

// -- Mailbox --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendRequest {
    pub to: String,
    pub msg: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendFileRequest {
    pub to: String,
    pub filename: String,
    /// Base64 file content.
    #[serde(alias = "content_b64")]
    pub content: String,
}

// -- Conversations / presence --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PeerRequest {
    pub peer: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TypingRequest {
    pub peer: String,
    pub is_typing: bool,
}
