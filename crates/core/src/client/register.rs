//! `GET /register` and `POST /register`
//!
//! Registration is staged: the server advertises flows whose stages are
//! executed in declared order, each stage passing the server-issued
//! `session` token through to the next.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::OwnedUserId;

/// One registration flow offered by the server.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RegisterFlow {
    /// The flow type, for single-stage flows.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub flow_type: Option<String>,

    /// The stages to execute, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<String>,
}

impl RegisterFlow {
    /// The ordered stage list: explicit `stages` or the single `type`.
    pub fn stage_types(&self) -> Vec<&str> {
        if self.stages.is_empty() {
            self.flow_type.as_deref().into_iter().collect()
        } else {
            self.stages.iter().map(String::as_str).collect()
        }
    }
}

/// Response type for registration flow discovery.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GetRegisterResBody {
    /// The flows the server supports.
    #[serde(default)]
    pub flows: Vec<RegisterFlow>,
}

/// Request type for one registration stage.
#[derive(Clone, Debug, Serialize)]
pub struct RegisterStageReqBody {
    /// The stage type, e.g. `m.login.password`.
    #[serde(rename = "type")]
    pub stage_type: String,

    /// The session token issued by an earlier stage, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,

    /// Stage-specific fields (user, password, …).
    #[serde(flatten)]
    pub params: JsonValue,
}

/// Response type for one registration stage.
///
/// Intermediate stages return only `session`; the final stage returns the
/// credentials.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RegisterResBody {
    /// The fully-qualified Matrix ID that has been registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<OwnedUserId>,

    /// An access token for the new account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// The session token to pass to the next stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}
