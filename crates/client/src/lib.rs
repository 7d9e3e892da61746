//! An event-driven client library for the Matrix client-server protocol.
//!
//! A [`MatrixClient`] authenticates against one home server, pulls the
//! event stream (an `initialSync` snapshot followed by a `/events`
//! long-poll), folds typed room events into live per-room state
//! projections, and notifies a [`MatrixObserver`] of every change. Rooms
//! can additionally be paginated backwards, rewinding a separate
//! projection through history.
//!
//! ```no_run
//! use lattica::{ClientConfig, Credentials, MatrixClient};
//!
//! # async fn run() -> lattica::ApiResult<()> {
//! let client = MatrixClient::new(ClientConfig::new("https://matrix.example.com"))?;
//! client.login(Credentials::password("@alice:example.com", "secret")).await?;
//! for room in client.rooms().await {
//!     println!("{} {:?}", room.room_id(), room.name().await);
//! }
//! client.stop().await;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

pub use lattica_core as core;

pub mod client;
pub mod config;
mod dispatcher;
pub mod error;
pub mod http;
mod member;
pub mod observer;
mod pump;
pub mod room;
mod user;

pub use self::client::{Credentials, MatrixClient};
pub use self::config::ClientConfig;
pub use self::error::{ApiResult, ClientError};
pub use self::http::{HttpTransport, ReqwestTransport, UrlBuilder};
pub use self::member::Member;
pub use self::observer::{ChangeSet, MatrixObserver};
pub use self::room::{PaginationToken, Room};
pub use self::user::{SharedUser, User};
