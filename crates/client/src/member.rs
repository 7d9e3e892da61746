use lattica_core::OwnedUserId;
use lattica_core::events::room::member::MembershipState;

use crate::user::SharedUser;

/// A user's standing in one room.
///
/// Carries a shared handle to the global [`User`](crate::User) record plus
/// the room-local fields. A `membership` of `None` is the normalised
/// *absent* state (the wire's `"leave"` or an empty content object).
#[derive(Clone, Debug)]
pub struct Member {
    /// The member's user id.
    pub user_id: OwnedUserId,

    /// Shared handle to the global user record.
    pub user: SharedUser,

    /// The member's display name in this room.
    pub display_name: Option<String>,

    /// The member's membership; `None` means absent.
    pub membership: Option<MembershipState>,
}

impl Member {
    /// Creates a member with undefined fields, bound to the given user.
    pub(crate) fn new(user_id: OwnedUserId, user: SharedUser) -> Self {
        Self {
            user_id,
            user,
            display_name: None,
            membership: None,
        }
    }
}
