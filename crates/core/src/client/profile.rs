//! `GET /profile/{user_id}/displayname` and the matching PUT.

use serde::{Deserialize, Serialize};

/// Request and response type for the display name endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DisplayNameBody {
    /// The display name, absent to clear it.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::serde::empty_string_as_none"
    )]
    pub displayname: Option<String>,
}
