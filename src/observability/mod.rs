//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, stderr)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation
//!     → Monitoring listener /metrics (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
