//! Types for the `m.room.create` event.

use serde::{Deserialize, Serialize};

use crate::OwnedUserId;

/// The content of an `m.room.create` event.
///
/// This is always the first event in a room's history, so seeing it while
/// paginating backwards means the beginning of the room has been reached.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RoomCreateEventContent {
    /// The user that created the room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<OwnedUserId>,
}
