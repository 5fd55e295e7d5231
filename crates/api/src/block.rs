// Path: crates/api/src/block.rs
//! Handles to consensus entities whose authoritative copy may live elsewhere.

use async_trait::async_trait;
use plugvm_types::{Id, Status, VmError};
use std::fmt::Debug;
use std::time::SystemTime;

/// A block as seen by the consensus engine.
///
/// Accessors are side-effect free. Only `accept` and `reject` move the status
/// out of `Processing`; `verify` never does.
#[async_trait]
pub trait Block: Send + Sync + Debug {
    fn id(&self) -> Id;
    fn parent(&self) -> Id;
    fn status(&self) -> Status;
    /// The serialized block, exactly as it was built or parsed.
    fn bytes(&self) -> &[u8];
    fn height(&self) -> u64;
    fn timestamp(&self) -> SystemTime;

    /// Checks the block's validity against its parent.
    async fn verify(&self) -> Result<(), VmError>;
    /// Marks the block accepted. Called at most once, after a successful verify.
    async fn accept(&self) -> Result<(), VmError>;
    /// Marks the block rejected.
    async fn reject(&self) -> Result<(), VmError>;
}

/// A state summary offered to a syncing node.
#[async_trait]
pub trait StateSummary: Send + Sync + Debug {
    fn id(&self) -> Id;
    fn height(&self) -> u64;
    fn bytes(&self) -> &[u8];

    /// Asks the VM to adopt this summary. Returns whether the VM will sync to it.
    async fn accept(&self) -> Result<bool, VmError>;
}
