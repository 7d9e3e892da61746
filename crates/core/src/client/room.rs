//! `POST /createRoom`

use serde::{Deserialize, Serialize};

use crate::{OwnedRoomAliasId, OwnedRoomId};

/// Whether a room will be visible in the public room directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Listed in the public directory.
    Public,

    /// Not listed.
    Private,
}

/// Request type for the `createRoom` endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CreateRoomReqBody {
    /// The localpart of the alias to give the room, if any.
    ///
    /// The server qualifies it into a full `#alias:server` form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_alias_name: Option<String>,

    /// Directory visibility of the new room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

/// Response type for the `createRoom` endpoint.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CreateRoomResBody {
    /// The id of the new room.
    pub room_id: OwnedRoomId,

    /// The fully-qualified alias, if one was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_alias: Option<OwnedRoomAliasId>,
}
