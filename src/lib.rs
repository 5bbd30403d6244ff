//! HTTP stub server library.
//!
//! Serves canned responses from a hot-reloaded JSON rule table.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::{LoadedConfig, RuleStore, ServerSettings};
pub use http::{RequestDispatcher, StubServer};
pub use lifecycle::{App, Shutdown, StartupError};
