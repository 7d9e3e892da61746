//! Matrix identifiers.
//!
//! Opaque, owned string newtypes with the sigil checks the grammar requires.
//! Anything past the sigil is treated as server-defined and kept verbatim.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// An error encountered when trying to parse an invalid identifier.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdParseError {
    /// The identifier is an empty string.
    #[error("identifier is empty")]
    Empty,

    /// The identifier does not start with the required sigil.
    #[error("identifier is missing the leading `{0}` sigil")]
    MissingSigil(char),

    /// The identifier is missing the `:server_name` part.
    #[error("identifier is missing the `:` separator")]
    MissingServerName,
}

macro_rules! owned_identifier {
    (
        $(#[doc = $docs:literal])*
        $name:ident, $parse:expr
    ) => {
        $(#[doc = $docs])*
        #[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
        pub struct $name(Box<str>);

        impl $name {
            /// Creates an identifier from the given string, validating it.
            pub fn parse(s: impl AsRef<str>) -> Result<Self, IdParseError> {
                let s = s.as_ref();
                ($parse)(s)?;
                Ok(Self(s.into()))
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = IdParseError;

            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdParseError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                ($parse)(s.as_str())?;
                Ok(Self(s.into()))
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.as_str() == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.as_str() == *other
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::try_from(s).map_err(D::Error::custom)
            }
        }
    };
}

fn validate_sigil(s: &str, sigil: char) -> Result<(), IdParseError> {
    if s.is_empty() {
        return Err(IdParseError::Empty);
    }
    if !s.starts_with(sigil) || s.len() == 1 {
        return Err(IdParseError::MissingSigil(sigil));
    }
    Ok(())
}

fn validate_user_id(s: &str) -> Result<(), IdParseError> {
    validate_sigil(s, '@')?;
    if !s[1..].contains(':') {
        return Err(IdParseError::MissingServerName);
    }
    Ok(())
}

fn validate_room_id(s: &str) -> Result<(), IdParseError> {
    validate_sigil(s, '!')
}

fn validate_room_alias_id(s: &str) -> Result<(), IdParseError> {
    validate_sigil(s, '#')?;
    if !s[1..].contains(':') {
        return Err(IdParseError::MissingServerName);
    }
    Ok(())
}

fn validate_server_name(s: &str) -> Result<(), IdParseError> {
    if s.is_empty() { Err(IdParseError::Empty) } else { Ok(()) }
}

owned_identifier! {
    /// A user id, of the form `@localpart:server_name`.
    OwnedUserId, validate_user_id
}

owned_identifier! {
    /// An opaque room id, of the form `!opaque_id`, optionally
    /// `!opaque_id:server_name`.
    OwnedRoomId, validate_room_id
}

owned_identifier! {
    /// A room alias, of the form `#alias:server_name`.
    OwnedRoomAliasId, validate_room_alias_id
}

owned_identifier! {
    /// The name of a home server, e.g. `matrix.org`.
    OwnedServerName, validate_server_name
}

impl OwnedUserId {
    /// The server name part of the user id.
    pub fn server_name(&self) -> &str {
        self.as_str()[1..]
            .split_once(':')
            .map(|(_, s)| s)
            .unwrap_or_default()
    }

    /// The localpart of the user id, without the sigil.
    pub fn localpart(&self) -> &str {
        self.as_str()[1..]
            .split_once(':')
            .map(|(l, _)| l)
            .unwrap_or(&self.as_str()[1..])
    }
}

impl OwnedRoomAliasId {
    /// The server name part of the alias.
    pub fn server_name(&self) -> &str {
        self.as_str()[1..]
            .split_once(':')
            .map(|(_, s)| s)
            .unwrap_or_default()
    }
}
