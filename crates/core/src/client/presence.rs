//! Endpoints for presence status and the presence list.

use serde::{Deserialize, Serialize};

use crate::OwnedUserId;
use crate::presence::PresenceState;

/// Request and response type for `/presence/{user_id}/status`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PresenceStatusBody {
    /// The presence state.
    pub presence: PresenceState,

    /// An optional description to accompany the presence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_msg: Option<String>,

    /// The number of milliseconds since the user last did something.
    ///
    /// Only present in responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_ago: Option<u64>,
}

impl PresenceStatusBody {
    /// Creates a new status body with the given state.
    pub fn new(presence: PresenceState) -> Self {
        Self {
            presence,
            status_msg: None,
            last_active_ago: None,
        }
    }
}

/// Request type for `/presence_list/{user_id}` updates.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PresenceListUpdateReqBody {
    /// Users to start watching.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invite: Vec<OwnedUserId>,

    /// Users to stop watching.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drop: Vec<OwnedUserId>,
}
