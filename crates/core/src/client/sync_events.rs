//! `GET /initialSync` and `GET /events`
//!
//! The snapshot and long-poll halves of the event stream.

use serde::{Deserialize, Serialize};

use crate::OwnedRoomId;
use crate::events::Event;
use crate::events::room::member::MembershipState;

/// Response type for the `initialSync` endpoint.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InitialSyncResBody {
    /// The stream token to long-poll from.
    pub end: String,

    /// A snapshot of every room the user is involved in.
    #[serde(default)]
    pub rooms: Vec<RoomSnapshot>,

    /// Current presence events for users of interest.
    #[serde(default)]
    pub presence: Vec<Event>,
}

/// One room in the initial snapshot.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RoomSnapshot {
    /// The room id.
    pub room_id: OwnedRoomId,

    /// The local user's membership in this room.
    pub membership: MembershipState,

    /// The room's current state events.
    #[serde(default)]
    pub state: Vec<Event>,

    /// Recent messages, when the snapshot was requested with a limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<MessagesChunk>,
}

/// A paginated chunk of timeline events.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MessagesChunk {
    /// The events, oldest first.
    #[serde(default)]
    pub chunk: Vec<Event>,

    /// A token pointing at the start of the chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    /// A token pointing at the end of the chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Response type for the `events` long-poll endpoint.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventsResBody {
    /// The new events, in stream order.
    #[serde(default)]
    pub chunk: Vec<Event>,

    /// The token to resume polling from.
    pub end: String,
}
