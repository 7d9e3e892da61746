//! Endpoints for sending messages and paging through room history.

use serde::{Deserialize, Serialize};

use crate::events::Event;

/// Response type for the `send message event` endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SendMessageResBody {
    /// The id the server assigned to the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// Response type for the room `messages` pagination endpoint.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MessagesResBody {
    /// The events for the requested window.
    ///
    /// With `dir=b` they arrive newest first.
    #[serde(default)]
    pub chunk: Vec<Event>,

    /// A token pointing at the newest end of the chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    /// A token to pass as `from` to fetch the next (older) window.
    pub end: String,
}
