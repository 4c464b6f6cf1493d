//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Build dependencies → DiscoveryServer
//!
//! Server (server.rs, state.rs):
//!     Unstarted → Starting → Running → Stopping → Stopped
//!                    ↓
//!                 Failed (bind or dependency start error)
//!
//! Signals (signals.rs, shutdown.rs):
//!     SIGTERM/SIGINT → fire the single-shot Shutdown → stop()
//!     subsystem failure → Shutdown::fail(reason) → stop() → non-zero exit
//! ```
//!
//! # Design Decisions
//! - Listeners bind all-or-nothing before any of them serves
//! - Shutdown fires at most once; stop is idempotent
//! - Stop has a deadline: stragglers are aborted after `shutdown_timeout`

pub mod server;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use server::{BoundAddresses, DiscoveryServer};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::{OsSignals, SignalCoordinator, Termination};
pub use startup::{run, run_until};
pub use state::LifecycleState;
