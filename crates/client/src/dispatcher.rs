//! Event-type routing.
//!
//! Dotted event types are resolved against a registry keyed by tuples of
//! name parts. The longest registered prefix wins and any unmatched
//! trailing parts are handed to the handler as suffix arguments, so
//! `m.room.message.feedback` reaches the `m.room.message` handler with
//! `["feedback"]`.

/// Room-scoped event kinds the state engine implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RoomEventKind {
    Aliases,
    Create,
    JoinRules,
    Member,
    Message,
    Name,
    PowerLevels,
    OpsLevels,
    SendEventLevel,
    AddStateLevel,
    Topic,
}

/// Client-scoped event kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ClientEventKind {
    Presence,
}

/// Where an event type routes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Route<'a> {
    /// A room-scoped handler, with any captured suffix parts.
    Room(RoomEventKind, Vec<&'a str>),

    /// A client-scoped handler, with any captured suffix parts.
    Client(ClientEventKind, Vec<&'a str>),

    /// No registered handler matches any prefix of the type.
    Unknown,
}

enum Handler {
    Room(RoomEventKind),
    Client(ClientEventKind),
}

/// The handler registry, keyed by tuples of type-name parts.
const HANDLERS: &[(&[&str], Handler)] = &[
    (&["m", "presence"], Handler::Client(ClientEventKind::Presence)),
    (&["m", "room", "aliases"], Handler::Room(RoomEventKind::Aliases)),
    (&["m", "room", "create"], Handler::Room(RoomEventKind::Create)),
    (&["m", "room", "join_rules"], Handler::Room(RoomEventKind::JoinRules)),
    (&["m", "room", "member"], Handler::Room(RoomEventKind::Member)),
    (&["m", "room", "message"], Handler::Room(RoomEventKind::Message)),
    (&["m", "room", "name"], Handler::Room(RoomEventKind::Name)),
    (&["m", "room", "power_levels"], Handler::Room(RoomEventKind::PowerLevels)),
    (&["m", "room", "ops_levels"], Handler::Room(RoomEventKind::OpsLevels)),
    (
        &["m", "room", "send_event_level"],
        Handler::Room(RoomEventKind::SendEventLevel),
    ),
    (
        &["m", "room", "add_state_level"],
        Handler::Room(RoomEventKind::AddStateLevel),
    ),
    (&["m", "room", "topic"], Handler::Room(RoomEventKind::Topic)),
];

/// Resolves a dotted event type to its handler.
pub(crate) fn resolve(event_type: &str) -> Route<'_> {
    let parts: Vec<&str> = event_type.split('.').collect();
    for len in (1..=parts.len()).rev() {
        let (prefix, suffix) = parts.split_at(len);
        if let Some((_, handler)) = HANDLERS.iter().find(|(key, _)| *key == prefix) {
            return match handler {
                Handler::Room(kind) => Route::Room(*kind, suffix.to_vec()),
                Handler::Client(kind) => Route::Client(*kind, suffix.to_vec()),
            };
        }
    }
    Route::Unknown
}
