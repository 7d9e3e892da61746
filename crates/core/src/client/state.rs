//! `GET /rooms/{id}/state`

use crate::events::Event;

/// Response type for the full room state endpoint: a flat list of the
/// room's current state events.
pub type RoomStateResBody = Vec<Event>;
