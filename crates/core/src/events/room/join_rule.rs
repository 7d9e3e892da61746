//! Types for the `m.room.join_rules` event.

use serde::{Deserialize, Serialize};

/// The rule used for users wishing to join this room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinRule {
    /// Anyone can join the room without any prior action.
    Public,

    /// A user who wishes to join the room must first receive an invite.
    Invite,

    /// A user can request an invite to the room.
    Knock,

    /// Reserved but not yet implemented by the Matrix specification.
    Private,
}

impl JoinRule {
    /// The string representation used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Invite => "invite",
            Self::Knock => "knock",
            Self::Private => "private",
        }
    }
}

/// The content of an `m.room.join_rules` event.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RoomJoinRuleEventContent {
    /// The rule used for users wishing to join this room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_rule: Option<JoinRule>,
}
