//! `PUT /directory/room/{alias}` and `DELETE /directory/room/{alias}`

use serde::{Deserialize, Serialize};

use crate::OwnedRoomId;

/// Request type for creating a directory alias mapping.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SetAliasReqBody {
    /// The room the alias should point at.
    pub room_id: OwnedRoomId,
}
