//! Client configuration.

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};

use crate::error::{ApiResult, ClientError};

/// The default path prefix of the client-server API.
pub const DEFAULT_PATH_PREFIX: &str = "/_matrix/client/api/v1";

/// Configuration for a [`MatrixClient`](crate::MatrixClient).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// The home server to talk to, e.g. `https://matrix.example.com`.
    ///
    /// A bare host name is accepted and treated as `https://`.
    pub server: String,

    /// The path prefix every endpoint hangs off.
    pub path_prefix: String,

    /// How long the server may hold a `/events` long-poll, in milliseconds.
    pub longpoll_timeout_ms: u64,

    /// Extra local grace on top of the server timeout before a poll is
    /// abandoned, in milliseconds.
    pub longpoll_grace_ms: u64,

    /// How long to sleep before re-polling after a failure, in milliseconds.
    pub retry_backoff_ms: u64,

    /// How many events to request per back-pagination page.
    pub pagination_limit: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "https://localhost:8448".to_owned(),
            path_prefix: DEFAULT_PATH_PREFIX.to_owned(),
            longpoll_timeout_ms: 30_000,
            longpoll_grace_ms: 5_000,
            retry_backoff_ms: 3_000,
            pagination_limit: 20,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for the given server with defaults everywhere
    /// else.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Default::default()
        }
    }

    /// Loads the configuration from `lattica.toml` (or `$LATTICA_CONFIG`)
    /// merged with `LATTICA_`-prefixed environment variables.
    pub fn load() -> ApiResult<Self> {
        let raw = Figment::new()
            .merge(Toml::file(
                Env::var("LATTICA_CONFIG").as_deref().unwrap_or("lattica.toml"),
            ))
            .merge(Env::prefixed("LATTICA_").global());

        raw.extract()
            .map_err(|e| ClientError::protocol(format!("invalid configuration: {e}")))
    }
}
