//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! --registries "Consul,Eureka,Consul"
//!     → selector.rs (parse names, dedupe, keep order)
//!     → Vec<RegistryKind> stored in RuntimeConfiguration
//!     → adapter.rs (RegistryFactory builds one ServiceRegistry per kind)
//!     → started/stopped by the server lifecycle
//! ```
//!
//! # Design Decisions
//! - Unknown names are rejected before any server construction
//! - Adapter construction errors abort the whole startup

pub mod adapter;
pub mod kind;
pub mod selector;

pub use adapter::{DefaultRegistryFactory, RegistryFactory, ServiceRegistry};
pub use kind::RegistryKind;
pub use selector::resolve;
