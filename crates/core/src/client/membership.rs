//! Endpoints for room membership.

use serde::{Deserialize, Serialize};

use crate::events::room::member::MembershipState;
use crate::{OwnedRoomId, OwnedUserId};

/// Response type for the `join by alias` endpoint.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JoinRoomResBody {
    /// The id of the room that was joined.
    pub room_id: OwnedRoomId,
}

/// Request type for the `invite` endpoint.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InviteUserReqBody {
    /// The user to invite.
    pub user_id: OwnedUserId,
}

/// Body for a direct `m.room.member` state PUT.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MembershipReqBody {
    /// The membership to set.
    pub membership: MembershipState,
}
