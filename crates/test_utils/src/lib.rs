// Path: crates/test_utils/src/lib.rs
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

//! # Plugin VM Test Utilities
//!
//! Recording mocks for every node-local subsystem and a scriptable mock
//! plugin served over real gRPC on a loopback listener.

pub mod assertions;
pub mod fixtures;
pub mod mocks;
pub mod plugin;
