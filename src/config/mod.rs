//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command line (+ POD_NAMESPACE)
//!     → cli.rs (clap derive, raw strings)
//!     → loader.rs (defaults, per-field parsing)
//!     → validation.rs (semantic checks)
//!     → RuntimeConfiguration (validated, immutable)
//!     → shared via Arc with the server lifecycle
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no ambient global state
//! - Every problem is reported in one pass
//! - Parsing never touches the filesystem; existence checks happen at construction

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use cli::{Cli, Command, DiscoveryArgs};
pub use loader::parse;
pub use schema::{
    ConfigSource, CrdOptions, FeatureToggles, ListenerAddresses, LoggingOptions, PollingOptions,
    RegistryOptions, RuntimeConfiguration, TlsConfig,
};
pub use validation::ValidationError;
