//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Client connects
//!     → listener.rs (semaphore permit, then accept)
//!     → connection.rs (id, open-count guard)
//!     → http::server (one HTTP/1.1 exchange, then close)
//! ```
//!
//! # Design Decisions
//! - The listener stops accepting when `max_connections` permits are taken
//! - A connection's permit and guard live exactly as long as its task

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
