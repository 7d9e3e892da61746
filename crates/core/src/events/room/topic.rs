//! Types for the `m.room.topic` event.

use serde::{Deserialize, Serialize};

/// The content of an `m.room.topic` event.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RoomTopicEventContent {
    /// The topic text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl RoomTopicEventContent {
    /// Creates a new `RoomTopicEventContent` with the given topic.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
        }
    }
}
