use std::sync::Arc;

use lattica_core::MatrixError;
use lattica_core::identifiers::IdParseError;
use thiserror::Error;

/// The error type for every fallible client operation.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network, TLS or HTTP-level failure.
    #[error("transport: `{0}`")]
    Transport(#[from] reqwest::Error),

    /// The server sent something the protocol does not allow.
    #[error("protocol: `{0}`")]
    Protocol(String),

    /// A response body failed to deserialize.
    #[error("serde json: `{0}`")]
    SerdeJson(#[from] serde_json::Error),

    /// An identifier failed to parse.
    #[error("id parse: `{0}`")]
    IdParse(#[from] IdParseError),

    /// A URL failed to parse or build.
    #[error("url parse: `{0}`")]
    UrlParse(#[from] url::ParseError),

    /// The server answered with a Matrix error body.
    #[error("matrix: `{0}`")]
    Matrix(#[from] MatrixError),

    /// None of the authentication flows the server offers can be satisfied
    /// with the supplied credentials.
    #[error("no offered authentication flow is satisfiable")]
    AuthUnsupported,

    /// The server refused the supplied credentials.
    #[error("authentication rejected: `{0}`")]
    AuthRejected(MatrixError),

    /// The room's history has been paginated back to its create event.
    #[error("room history is fully paginated")]
    PaginationExhausted,

    /// A start-up failure observed through the shared `start` handle.
    #[error("initial sync failed: {0}")]
    Start(Arc<ClientError>),
}

impl ClientError {
    /// Shorthand for a [`ClientError::Protocol`].
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type ApiResult<T> = Result<T, ClientError>;
