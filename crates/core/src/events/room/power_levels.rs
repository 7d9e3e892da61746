//! Types for the power level events.
//!
//! Two wire generations coexist. The older servers send three separate
//! events (`m.room.ops_levels`, `m.room.send_event_level`,
//! `m.room.add_state_level`); newer ones send a single
//! `m.room.power_levels` whose content maps user ids (plus the `default`
//! sentinel) to levels and may carry action thresholds alongside. Both are
//! normalised into [`RoomPowerLevelsEventContent`] before any notification
//! is produced.

use std::collections::BTreeMap;

use serde::de::{Deserializer, Error as _};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::serde::power_level_from_json;

/// An action gated by a room power level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerAction {
    /// Sending a message event into the room.
    SendEvent,

    /// Adding or replacing state in the room.
    AddState,

    /// Banning a user.
    Ban,

    /// Kicking a user.
    Kick,

    /// Redacting an event.
    Redact,
}

impl PowerAction {
    /// The string representation used on the wire and in change maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendEvent => "send_event",
            Self::AddState => "add_state",
            Self::Ban => "ban",
            Self::Kick => "kick",
            Self::Redact => "redact",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "send_event" => Some(Self::SendEvent),
            "add_state" => Some(Self::AddState),
            "ban" => Some(Self::Ban),
            "kick" => Some(Self::Kick),
            "redact" => Some(Self::Redact),
            _ => None,
        }
    }
}

/// The unified in-memory shape of an `m.room.power_levels` content.
///
/// Keys starting with `@` are user ids; the `default` key is the fallback
/// level for users without an explicit entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoomPowerLevelsEventContent {
    /// Per-user levels, including the `default` sentinel key.
    pub users: BTreeMap<String, i64>,

    /// Thresholds for gated actions.
    pub actions: BTreeMap<PowerAction, i64>,
}

impl<'de> Deserialize<'de> for RoomPowerLevelsEventContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, JsonValue>::deserialize(deserializer)?;
        let mut users = BTreeMap::new();
        let mut actions = BTreeMap::new();
        for (key, value) in raw {
            let Some(level) = power_level_from_json(&value) else {
                return Err(D::Error::custom(format!("level for `{key}` is not an integer")));
            };
            if key == "default" || key.starts_with('@') {
                users.insert(key, level);
            } else if let Some(action) = PowerAction::from_key(&key) {
                actions.insert(action, level);
            }
            // Unknown keys are dropped; servers are free to extend this map.
        }
        Ok(Self { users, actions })
    }
}

impl Serialize for RoomPowerLevelsEventContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.users.len() + self.actions.len()))?;
        for (user, level) in &self.users {
            map.serialize_entry(user, level)?;
        }
        for (action, level) in &self.actions {
            map.serialize_entry(action.as_str(), level)?;
        }
        map.end()
    }
}

/// The content of the legacy `m.room.ops_levels` event.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RoomOpsLevelsEventContent {
    /// The level required to ban a user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban_level: Option<i64>,

    /// The level required to kick a user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kick_level: Option<i64>,

    /// The level required to redact an event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redact_level: Option<i64>,
}

impl RoomOpsLevelsEventContent {
    /// The action thresholds this event carries, in unified form.
    pub fn actions(&self) -> BTreeMap<PowerAction, i64> {
        [
            (PowerAction::Ban, self.ban_level),
            (PowerAction::Kick, self.kick_level),
            (PowerAction::Redact, self.redact_level),
        ]
        .into_iter()
        .filter_map(|(action, level)| level.map(|l| (action, l)))
        .collect()
    }
}

/// The content of the legacy single-level events
/// (`m.room.send_event_level`, `m.room.add_state_level`).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RoomLevelEventContent {
    /// The required level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
}
