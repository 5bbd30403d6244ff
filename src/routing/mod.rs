//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, request target)
//!     → matcher.rs (extract the match key)
//!     → RuleTable::matching (exact method + target)
//!     → selector.rs (pick one when several rules share a key)
//!     → Return: selected Rule or NoMatch
//! ```
//!
//! # Design Decisions
//! - Exact string match only, no prefixes or patterns
//! - Path match is case-sensitive and includes the query string
//! - Duplicate keys are deliberate; the tie-break is random but seedable

pub mod matcher;
pub mod selector;

pub use matcher::RouteKey;
pub use selector::{RandomSelector, RuleSelector};
