// Path: crates/services/src/lib.rs
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

//! # Plugin VM Proxy Services
//!
//! Thin gRPC shims over node-local subsystems. A plugin process reaches the
//! node's database, keystore, shared memory, alias and subnet registries,
//! network sender, validator state and engine outbox only through these.
//!
//! Proxies hold no state beyond the subsystem they front (the database proxy
//! additionally owns its open iterators) and add no locking; the subsystems
//! are required to be thread-safe.

pub mod alias_reader;
pub mod app_sender;
pub mod database;
pub mod keystore;
pub mod messenger;
pub mod server;
pub mod shared_memory;
pub mod subnet_lookup;
pub mod validator_state;

pub use alias_reader::AliasReaderProxy;
pub use app_sender::AppSenderProxy;
pub use database::DatabaseProxy;
pub use keystore::KeystoreProxy;
pub use messenger::MessengerProxy;
pub use server::{serve_database, serve_vm_services, VmServices};
pub use shared_memory::SharedMemoryProxy;
pub use subnet_lookup::SubnetLookupProxy;
pub use validator_state::ValidatorStateProxy;

use plugvm_types::{Id, NodeId, VmError};
use tonic::Status;

/// Maps a subsystem failure onto the status returned to the plugin.
pub(crate) fn to_status(err: VmError) -> Status {
    match &err {
        VmError::NotFound => Status::not_found(err.to_string()),
        VmError::Closed => Status::unavailable(err.to_string()),
        VmError::InvalidId { .. }
        | VmError::InvalidArgument(_)
        | VmError::InvalidStatus(_)
        | VmError::InvalidLockOption(_)
        | VmError::InvalidTimestamp(_) => Status::invalid_argument(err.to_string()),
        _ => Status::internal(err.to_string()),
    }
}

pub(crate) fn parse_id(bytes: &[u8]) -> Result<Id, Status> {
    Id::from_slice(bytes).map_err(to_status)
}

pub(crate) fn parse_node_id(bytes: &[u8]) -> Result<NodeId, Status> {
    NodeId::from_slice(bytes).map_err(to_status)
}
