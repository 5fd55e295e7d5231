// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Plugin VM Types
//!
//! The foundational library for the plugin VM adapter, containing the
//! identifiers, status enums and error types that cross the RPC boundary.
//!
//! ## Architectural Role
//!
//! As the base crate, `plugvm-types` has minimal dependencies and is itself a
//! dependency for every other crate in the workspace. Both sides of the wire
//! (the adapter and the proxies the plugin calls back into) translate errors
//! through the single code table defined in [`error::codes`].

/// A top-level, crate-wide `Result` type alias with a default error type.
pub type Result<T, E = crate::error::VmError> = std::result::Result<T, E>;

/// Block status, engine phase and engine message enums.
pub mod choices;
/// The unified error taxonomy and the shared wire error-code table.
pub mod error;
/// Fixed-size content identifiers and node identifiers.
pub mod ids;

pub use choices::{EngineMessage, EngineState, LockOption, Status};
pub use error::{DatabaseError, VmError};
pub use ids::{Id, NodeId};
