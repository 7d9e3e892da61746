//! Rooms and their state projections.
//!
//! Each room keeps a *forward* projection (the live current state) and,
//! once back-pagination begins, a separate *backward* projection that
//! rewinds as older events are folded. The two never share member records;
//! notifications for each direction carry members from their own
//! projection.

use std::collections::BTreeMap;
use std::sync::Arc;

use lattica_core::events::room::join_rule::JoinRule;
use lattica_core::events::room::power_levels::PowerAction;
use lattica_core::{OwnedRoomAliasId, OwnedRoomId, OwnedServerName, OwnedUserId};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::member::Member;

mod fold;

pub(crate) use fold::{FoldOutcome, NoteKind, Phase, RoomNote};

/// Where back-pagination currently stands.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PaginationToken {
    /// No page has been fetched yet; the next request starts from `END`.
    #[default]
    Unset,

    /// The opaque server token pointing at the next older page.
    Token(String),

    /// The room's create event has been reached; there is nothing older.
    Start,
}

/// The state projection of a room.
#[derive(Debug, Default)]
pub(crate) struct RoomState {
    pub name: Option<String>,
    pub topic: Option<String>,
    pub join_rule: Option<JoinRule>,
    pub aliases_by_server: BTreeMap<OwnedServerName, Vec<OwnedRoomAliasId>>,
    /// Per-user levels, including the `default` sentinel key.
    pub user_levels: BTreeMap<String, i64>,
    pub action_levels: BTreeMap<PowerAction, i64>,
    pub members: BTreeMap<OwnedUserId, Member>,
}

impl RoomState {
    /// The user's level, falling back to the `default` entry.
    pub fn member_level(&self, user_id: &str) -> Option<i64> {
        self.user_levels
            .get(user_id)
            .or_else(|| self.user_levels.get("default"))
            .copied()
    }

    /// All aliases of the room, concatenated across home servers.
    pub fn aliases(&self) -> Vec<OwnedRoomAliasId> {
        self.aliases_by_server.values().flatten().cloned().collect()
    }
}

/// The backward projection: the synthetic state as history is rewound.
///
/// Created lazily as a deep copy of the forward members and aliases when
/// the first page is requested.
#[derive(Debug)]
pub(crate) struct BackwardState {
    pub members: BTreeMap<OwnedUserId, Member>,
    pub aliases_by_server: BTreeMap<OwnedServerName, Vec<OwnedRoomAliasId>>,
}

pub(crate) struct RoomInner {
    pub state: RoomState,
    pub back: Option<BackwardState>,
    pub pagination_token: PaginationToken,
}

impl RoomInner {
    fn new() -> Self {
        Self {
            state: RoomState::default(),
            back: None,
            pagination_token: PaginationToken::Unset,
        }
    }

    /// Creates the backward projection if it does not exist yet.
    pub(crate) fn ensure_backward(&mut self) {
        if self.back.is_none() {
            self.back = Some(BackwardState {
                members: self.state.members.clone(),
                aliases_by_server: self.state.aliases_by_server.clone(),
            });
        }
    }
}

/// A handle to a room the client participates in.
///
/// Handles are cheap to clone; all state lives behind a shared lock and is
/// mutated only by event folding. Values returned from the accessors are
/// snapshots.
#[derive(Clone)]
pub struct Room {
    room_id: OwnedRoomId,
    inner: Arc<RwLock<RoomInner>>,
}

impl Room {
    pub(crate) fn new(room_id: OwnedRoomId) -> Self {
        Self {
            room_id,
            inner: Arc::new(RwLock::new(RoomInner::new())),
        }
    }

    /// The room id.
    pub fn room_id(&self) -> &OwnedRoomId {
        &self.room_id
    }

    /// The room's name, if set.
    pub async fn name(&self) -> Option<String> {
        self.read().await.state.name.clone()
    }

    /// The room's topic, if set.
    pub async fn topic(&self) -> Option<String> {
        self.read().await.state.topic.clone()
    }

    /// The room's join rule, if known.
    pub async fn join_rule(&self) -> Option<JoinRule> {
        self.read().await.state.join_rule
    }

    /// All aliases of the room, concatenated across home servers.
    pub async fn aliases(&self) -> Vec<OwnedRoomAliasId> {
        self.read().await.state.aliases()
    }

    /// Snapshot of the current members.
    pub async fn members(&self) -> Vec<Member> {
        self.read().await.state.members.values().cloned().collect()
    }

    /// Snapshot of one member, if present.
    pub async fn member(&self, user_id: &OwnedUserId) -> Option<Member> {
        self.read().await.state.members.get(user_id).cloned()
    }

    /// The user's power level, falling back to the room default.
    pub async fn member_level(&self, user_id: &str) -> Option<i64> {
        self.read().await.state.member_level(user_id)
    }

    /// The threshold for a gated action, if known.
    pub async fn action_level(&self, action: PowerAction) -> Option<i64> {
        self.read().await.state.action_levels.get(&action).copied()
    }

    /// Where back-pagination currently stands.
    pub async fn pagination_token(&self) -> PaginationToken {
        self.read().await.pagination_token.clone()
    }

    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, RoomInner> {
        self.inner.read().await
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, RoomInner> {
        self.inner.write().await
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room").field("room_id", &self.room_id).finish()
    }
}
