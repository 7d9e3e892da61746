//! Common types for the presence module.

use serde::{Deserialize, Serialize};

use crate::OwnedUserId;

/// A description of a user's connectivity and availability for chat.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    /// Disconnected from the service.
    Offline,

    /// Connected to the service.
    #[default]
    Online,

    /// Connected to the service but not available for chat.
    Unavailable,
}

impl PresenceState {
    /// The string representation used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
            Self::Unavailable => "unavailable",
        }
    }
}

/// The content of an `m.presence` event.
///
/// Informs the client of a user's presence state change.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PresenceEventContent {
    /// The user whose presence changed.
    pub user_id: OwnedUserId,

    /// The presence state of the user.
    pub presence: PresenceState,

    /// The display name of the user, if the server includes it.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::serde::empty_string_as_none"
    )]
    pub displayname: Option<String>,

    /// The number of milliseconds since the user last did something.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_ago: Option<u64>,

    /// An optional description to accompany the presence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_msg: Option<String>,
}
