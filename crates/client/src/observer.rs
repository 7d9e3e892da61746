//! The observer surface.
//!
//! Implement [`MatrixObserver`] and hand it to
//! [`MatrixClient::set_observer`](crate::MatrixClient::set_observer) to be
//! notified of state changes. Every method has a no-op default, so an
//! implementation only overrides what it cares about. Callbacks are awaited
//! by the dispatching task: no callback for a later event starts before an
//! earlier one has completed.

use std::collections::BTreeMap;

use async_trait::async_trait;
use lattica_core::events::Event;
use serde_json::Value as JsonValue;

use crate::error::ClientError;
use crate::member::Member;
use crate::room::Room;
use crate::user::User;

/// A map of changed fields.
///
/// Values are `[slot0, slot1]` pairs where the second slot holds the value
/// in the direction of traversal: the new value for forward events, the
/// older value when paginating backwards. The `aliases` key carries a third
/// slot with the concatenated lists of every *other* home server.
pub type ChangeSet = BTreeMap<String, Vec<JsonValue>>;

/// Builds a `[slot0, slot1]` change pair.
pub(crate) fn change_pair(from: JsonValue, to: JsonValue) -> Vec<JsonValue> {
    vec![from, to]
}

/// Callbacks for everything the event stream produces.
#[async_trait]
pub trait MatrixObserver: Send + Sync {
    // Client-level callbacks.

    /// A human-readable progress message.
    async fn on_log(&self, _message: &str) {}

    /// A non-fatal failure was absorbed while processing the stream.
    async fn on_error(&self, _error: &ClientError, _context: &str) {}

    /// A user's presence changed. `user` is a snapshot taken after the
    /// change was applied.
    async fn on_presence(&self, _user: User, _changes: ChangeSet) {}

    /// A room appeared in the registry.
    async fn on_room_new(&self, _room: Room) {}

    /// A room left the registry (the local user is no longer a member).
    async fn on_room_del(&self, _room: Room) {}

    /// The local user was invited to a room that is not in the registry.
    async fn on_invite(&self, _event: Event) {}

    /// An event no handler claimed. Return `true` to mark it consumed;
    /// otherwise it is logged and dropped.
    async fn on_unknown_event(&self, _event: &Event) -> bool {
        false
    }

    // Room-level callbacks.

    /// The room's initial state has been fully folded.
    async fn on_synced_state(&self, _room: Room) {}

    /// A message arrived on the live stream.
    async fn on_message(&self, _room: Room, _member: Member, _content: JsonValue, _event: &Event) {}

    /// A message was encountered while paginating backwards.
    async fn on_back_message(
        &self,
        _room: Room,
        _member: Member,
        _content: JsonValue,
        _event: &Event,
    ) {
    }

    /// A member's standing changed on the live stream.
    async fn on_membership(
        &self,
        _room: Room,
        _actor: Option<Member>,
        _event: &Event,
        _subject: Member,
        _changes: ChangeSet,
    ) {
    }

    /// A member's standing changed, seen while paginating backwards.
    async fn on_back_membership(
        &self,
        _room: Room,
        _actor: Option<Member>,
        _event: &Event,
        _subject: Member,
        _changes: ChangeSet,
    ) {
    }

    /// Room state (name, topic, join rule, aliases, action levels) changed
    /// on the live stream.
    async fn on_state_changed(
        &self,
        _room: Room,
        _actor: Option<Member>,
        _event: &Event,
        _changes: ChangeSet,
    ) {
    }

    /// Room state change seen while paginating backwards.
    async fn on_back_state_changed(
        &self,
        _room: Room,
        _actor: Option<Member>,
        _event: &Event,
        _changes: ChangeSet,
    ) {
    }

    /// A room member's presence changed (forwarded from the global delta).
    async fn on_room_presence(&self, _room: Room, _member: Member, _changes: ChangeSet) {}
}
