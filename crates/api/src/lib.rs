// Path: crates/api/src/lib.rs

//! # Plugin VM API Crate Lints
//!
//! This crate enforces a strict set of lints to ensure high-quality,
//! panic-free, and well-documented code. Panics are disallowed in non-test
//! code to promote robust error handling.
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing
    )
)]
//! # Plugin VM API
//!
//! The in-process contracts the consensus engine programs against, and the
//! node-local subsystems a plugin VM may call back into. The RPC adapter
//! implements the former; the proxy services front the latter.

/// Block and state-summary handles.
pub mod block;
/// The versioned key-value database contract and an in-memory implementation.
pub mod database;
/// The handler-set contract consumed by the HTTP exposure layer.
pub mod http;
/// Plugin process ownership and resource tracking.
pub mod process;
/// Node-local subsystems exposed to plugins through proxy services.
pub mod subsystems;
/// The consensus VM contract and its optional capabilities.
pub mod vm;

/// A curated set of the most commonly used traits and types.
pub mod prelude {
    pub use crate::block::{Block, StateSummary};
    pub use crate::database::{Database, DatabaseManager, DbIterator, VersionedDatabase};
    pub use crate::http::{HandlerSet, HttpHandler, HttpHandlerEntry};
    pub use crate::process::{PluginProcess, ProcessTracker};
    pub use crate::subsystems::{
        AliasReader, AppSender, Keystore, SharedMemory, SubnetLookup, ValidatorState,
    };
    pub use crate::vm::{
        AppHandler, BatchedChainVm, ChainContext, ChainVm, CommonVm, HeightIndexStatus,
        HeightIndexedChainVm, InitializeParams, StateSyncableVm,
    };
}
