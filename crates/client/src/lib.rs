// Path: crates/client/src/lib.rs
//! # Plugin VM Client Crate Lints
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
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Plugin VM Client
//!
//! The node-side adapter for a VM running in a separate plugin process. The
//! consensus engine programs against the in-process VM traits; [`VmClient`]
//! turns each call into a request on the plugin's `vm.VM` service and hosts
//! the callback services the plugin needs in return.

pub mod block;
pub mod config;
pub mod http;
pub mod metrics;
pub mod process;
pub mod remote;
pub mod summary;
pub mod vm;

pub use block::BlockClient;
pub use config::VmClientConfig;
pub use summary::SummaryClient;
pub use vm::VmClient;
