//! Types for the `m.room.member` event.

use serde::{Deserialize, Serialize};

/// The membership state of a user in a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipState {
    /// The user has been invited.
    Invite,

    /// The user is a member of the room.
    Join,

    /// The user has left, or was never in the room.
    Leave,

    /// The user has been banned.
    Ban,

    /// The user has knocked on the room.
    Knock,
}

impl MembershipState {
    /// The string representation used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invite => "invite",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Ban => "ban",
            Self::Knock => "knock",
        }
    }
}

/// The content of an `m.room.member` event.
///
/// The user the membership applies to is the event's `state_key`; the
/// `user_id` on the envelope is the actor. The two differ when one user
/// affects the membership of another (invites, kicks, bans).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RoomMemberEventContent {
    /// The membership state of the subject user.
    pub membership: MembershipState,

    /// The display name of the subject user, if any.
    #[serde(
        rename = "displayname",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::serde::empty_string_as_none"
    )]
    pub display_name: Option<String>,
}

impl RoomMemberEventContent {
    /// Creates a new `RoomMemberEventContent` with the given membership state.
    pub fn new(membership: MembershipState) -> Self {
        Self {
            membership,
            display_name: None,
        }
    }
}
