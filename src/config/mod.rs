//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings.json
//!     → loader.rs (read & parse JSON)
//!     → validation.rs (per-endpoint checks, coercion, warnings)
//!     → RuleTable (validated, immutable)
//!     → store.rs (atomic publish, lock-free snapshots)
//!
//! On change:
//!     watcher.rs detects modification → trigger channel
//!     → reload task → reloader.rs (one load at a time)
//!     → loader.rs → store.rs publish
//!     → subsequent requests observe new rules
//! ```
//!
//! # Design Decisions
//! - Rule tables are immutable once built; changes require a full reload
//! - A failed reload keeps the last known good table
//! - Endpoint-level problems are warnings, document-level problems are errors

pub mod loader;
pub mod reloader;
pub mod schema;
pub mod store;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use reloader::ConfigReloader;
pub use schema::{ListenerConfig, LoadedConfig, Rule, RuleTable, ServerSettings};
pub use store::RuleStore;
pub use watcher::{ConfigWatcher, ReloadTrigger};
