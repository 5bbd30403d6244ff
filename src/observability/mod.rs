//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields rather than formatted strings where practical
//! - Request ID (`x-request-id`) flows into every per-request log line
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
