//! `GET /login` and `POST /login`
//!
//! Flow discovery and execution for logging in to the homeserver.

use serde::{Deserialize, Serialize};

use crate::OwnedUserId;

/// One authentication flow offered by the server.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoginFlow {
    /// The authentication type, e.g. `m.login.password`.
    #[serde(rename = "type")]
    pub flow_type: String,

    /// Intermediate stages this flow requires, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<String>,
}

/// Response type for login flow discovery.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GetLoginResBody {
    /// The flows the server supports.
    #[serde(default)]
    pub flows: Vec<LoginFlow>,
}

/// Request type for the `login` endpoint, password flow.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename = "m.login.password")]
pub struct PasswordLoginReqBody {
    /// The user id or localpart to log in as.
    pub user: String,

    /// The password.
    pub password: String,
}

/// Response type for the `login` endpoint.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoginResBody {
    /// The fully-qualified Matrix ID that has been logged in.
    pub user_id: OwnedUserId,

    /// An access token for the account.
    pub access_token: String,

    /// The server's advertised name for itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_server: Option<String>,
}
