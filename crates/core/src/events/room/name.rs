//! Types for the `m.room.name` event.

use serde::{Deserialize, Serialize};

/// The content of an `m.room.name` event.
///
/// The room name is a human-friendly string designed to be displayed to the
/// end-user.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RoomNameEventContent {
    /// The name of the room.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::serde::empty_string_as_none"
    )]
    pub name: Option<String>,
}

impl RoomNameEventContent {
    /// Creates a new `RoomNameEventContent` with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}
