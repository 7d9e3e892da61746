use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use lattica_core::OwnedUserId;
use lattica_core::presence::PresenceState;
use tokio::sync::RwLock;

/// A user known to the client, shared between the global registry and every
/// room membership that references them.
///
/// Records handed to observers are snapshots; later folds may mutate the
/// registry copy.
#[derive(Clone, Debug)]
pub struct User {
    /// The globally unique user id.
    pub user_id: OwnedUserId,

    /// The user's global display name, if known.
    pub display_name: Option<String>,

    /// The user's presence, if known.
    pub presence: Option<PresenceState>,

    /// When the user last did something, in wall-clock seconds since the
    /// epoch.
    pub last_active: Option<u64>,
}

impl User {
    /// Creates an empty record for the given user id.
    pub fn new(user_id: OwnedUserId) -> Self {
        Self {
            user_id,
            display_name: None,
            presence: None,
            last_active: None,
        }
    }
}

/// A shared handle to a [`User`] record.
pub type SharedUser = Arc<RwLock<User>>;

/// The user registry map: user id to shared record.
pub type UserMap = BTreeMap<OwnedUserId, SharedUser>;

/// Gets or creates the shared record for `user_id`.
pub(crate) fn user_entry(users: &mut UserMap, user_id: &OwnedUserId) -> SharedUser {
    users
        .entry(user_id.clone())
        .or_insert_with(|| Arc::new(RwLock::new(User::new(user_id.clone()))))
        .clone()
}

/// Pins the wire's relative `last_active_ago` (milliseconds) to the
/// wall-clock second the activity happened at.
pub(crate) fn last_active_from_ago(ago_ms: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    now.saturating_sub(ago_ms / 1000)
}
