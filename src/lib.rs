//! Pilot discovery service library.

pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod mesh;
pub mod net;
pub mod observability;
pub mod registry;

pub use config::schema::RuntimeConfiguration;
pub use error::{ConfigError, PilotError, ShutdownError, StartupError};
pub use lifecycle::{DiscoveryServer, LifecycleState, Shutdown};
