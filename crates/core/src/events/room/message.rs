//! Types for the `m.room.message` event.

use serde::{Deserialize, Serialize};

/// The content of an `m.room.message` event.
///
/// Only the common `msgtype`/`body` pair is modelled; anything further the
/// sender attached rides along untouched in the envelope's raw content.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RoomMessageEventContent {
    /// The kind of message, e.g. `m.text`.
    pub msgtype: String,

    /// The textual representation of the message.
    #[serde(default)]
    pub body: String,
}

impl RoomMessageEventContent {
    /// A plain text message.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            msgtype: "m.text".to_owned(),
            body: body.into(),
        }
    }

    /// An emote, displayed as an action performed by the sender.
    pub fn emote(body: impl Into<String>) -> Self {
        Self {
            msgtype: "m.emote".to_owned(),
            body: body.into(),
        }
    }

    /// An automated notice.
    pub fn notice(body: impl Into<String>) -> Self {
        Self {
            msgtype: "m.notice".to_owned(),
            body: body.into(),
        }
    }
}
