//! Types for the `m.room.aliases` event.

use serde::{Deserialize, Serialize};

use crate::OwnedRoomAliasId;

/// The content of an `m.room.aliases` event.
///
/// Informs the room about what room aliases it has been given. The
/// originating home server is the event's `state_key`; each server announces
/// only its own alias list.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RoomAliasesEventContent {
    /// A list of room aliases.
    #[serde(default)]
    pub aliases: Vec<OwnedRoomAliasId>,
}

impl RoomAliasesEventContent {
    /// Create an `RoomAliasesEventContent` from the given aliases.
    pub fn new(aliases: Vec<OwnedRoomAliasId>) -> Self {
        Self { aliases }
    }
}
