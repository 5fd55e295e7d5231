// Path: crates/chain/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Plugin VM Chain State
//!
//! Sits between the consensus engine and a remote VM. Blocks are cached by
//! consensus phase (verified, decided, unverified) so repeated lookups of hot
//! blocks never cross the process boundary, ids known to be absent are
//! remembered, and the last accepted block is tracked locally.

/// Cache capacities.
pub mod config;
/// The caching wrapper and the block wrappers it hands out.
pub mod state;

pub use config::ChainStateConfig;
pub use state::{BlockSource, ChainState};
