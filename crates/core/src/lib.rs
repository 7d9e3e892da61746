#![allow(missing_docs)]

pub mod client;
pub mod error;
pub mod events;
pub mod identifiers;
pub mod presence;
pub mod serde;

pub use self::error::MatrixError;
pub use self::identifiers::*;
