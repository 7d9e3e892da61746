//! The generic event envelope and the typed event contents.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{OwnedRoomId, OwnedUserId};

pub mod room;

/// A generic event envelope as received from the server.
///
/// Every event carries a dotted `type` and a type-specific `content` object.
/// State events additionally pin a slot through their `state_key`, and may
/// carry the `prev_content` the event replaced. Field names follow the v1
/// wire format (`user_id`, `ts`); the later `sender`/`origin_server_ts`
/// spellings are accepted as aliases.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Event {
    /// The dotted event type, e.g. `m.room.member`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// The type-specific payload.
    #[serde(default)]
    pub content: JsonValue,

    /// The state content this event replaced, if the server included it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_content: Option<JsonValue>,

    /// The user that sent the event.
    #[serde(default, alias = "sender", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<OwnedUserId>,

    /// The subject of a state event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,

    /// The room this event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<OwnedRoomId>,

    /// The event id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,

    /// When the event was sent, in milliseconds since the epoch.
    #[serde(
        default,
        alias = "origin_server_ts",
        skip_serializing_if = "Option::is_none"
    )]
    pub ts: Option<u64>,
}

impl Event {
    /// Creates a bare envelope of the given type with the given content.
    pub fn new(event_type: impl Into<String>, content: JsonValue) -> Self {
        Self {
            event_type: event_type.into(),
            content,
            prev_content: None,
            user_id: None,
            state_key: None,
            room_id: None,
            event_id: None,
            ts: None,
        }
    }

    /// Whether this is a state event.
    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }

    /// The dotted type split into its name parts.
    pub fn type_parts(&self) -> Vec<&str> {
        self.event_type.split('.').collect()
    }

    /// Deserializes the content into a typed event content.
    pub fn content_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.content.clone())
    }

    /// Deserializes `prev_content` into a typed event content, if present.
    pub fn prev_content_as<T: DeserializeOwned>(&self) -> serde_json::Result<Option<T>> {
        match &self.prev_content {
            Some(prev) => serde_json::from_value(prev.clone()).map(Some),
            None => Ok(None),
        }
    }
}
