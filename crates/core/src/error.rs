//! Errors that can be sent from the homeserver.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The kind of an error returned by the server, derived from its `errcode`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// M_FORBIDDEN
    Forbidden,

    /// M_UNKNOWN_TOKEN
    UnknownToken,

    /// M_BAD_JSON
    BadJson,

    /// M_NOT_JSON
    NotJson,

    /// M_NOT_FOUND
    NotFound,

    /// M_LIMIT_EXCEEDED
    LimitExceeded,

    /// M_USER_IN_USE
    UserInUse,

    /// M_ROOM_IN_USE
    RoomInUse,

    /// M_UNKNOWN
    Unknown,

    /// Any other `errcode`.
    Custom(String),
}

/// A Matrix error returned by the home server.
///
/// Servers signal failures with a JSON body of the shape
/// `{"errcode": "M_FORBIDDEN", "error": "…"}`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MatrixError {
    /// The machine-readable error code.
    pub errcode: String,

    /// The human-readable error message.
    #[serde(default)]
    pub error: String,
}

impl MatrixError {
    /// Creates a new `MatrixError` with the given code and message.
    pub fn new(errcode: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            errcode: errcode.into(),
            error: error.into(),
        }
    }

    /// Extracts a `MatrixError` from a response body, if it is error-shaped.
    pub fn from_response(body: &JsonValue) -> Option<Self> {
        body.get("errcode")?;
        serde_json::from_value(body.clone()).ok()
    }

    /// The error kind derived from the `errcode`.
    pub fn kind(&self) -> ErrorKind {
        match self.errcode.as_str() {
            "M_FORBIDDEN" => ErrorKind::Forbidden,
            "M_UNKNOWN_TOKEN" => ErrorKind::UnknownToken,
            "M_BAD_JSON" => ErrorKind::BadJson,
            "M_NOT_JSON" => ErrorKind::NotJson,
            "M_NOT_FOUND" => ErrorKind::NotFound,
            "M_LIMIT_EXCEEDED" => ErrorKind::LimitExceeded,
            "M_USER_IN_USE" => ErrorKind::UserInUse,
            "M_ROOM_IN_USE" => ErrorKind::RoomInUse,
            "M_UNKNOWN" => ErrorKind::Unknown,
            other => ErrorKind::Custom(other.to_owned()),
        }
    }
}

impl fmt::Display for MatrixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.errcode, self.error)
    }
}

impl std::error::Error for MatrixError {}
