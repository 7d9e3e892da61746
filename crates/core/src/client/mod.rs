//! Request and response bodies for the client-server API endpoints.

pub mod directory;
pub mod membership;
pub mod message;
pub mod presence;
pub mod profile;
pub mod register;
pub mod room;
pub mod session;
pub mod state;
pub mod sync_events;
