//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! configured address string
//!     → address.rs (syntax check at config time)
//!     → listener.rs (bind at start time, report actual address)
//!     → tls.rs (optional rustls material for the secure listener)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Parsing is pure; resolution and binding happen only in `start`
//! - Dropping a bound listener closes it (and removes its socket file)

pub mod address;
pub mod listener;
pub mod tls;

pub use address::{AddressError, BoundAddress, ListenAddress};
pub use listener::{BoundListener, ListenerName, Socket, SocketFile};
