// Path: crates/types/src/choices.rs
//! Small enums whose discriminants are part of the wire protocol.

use crate::error::VmError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The consensus status of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Status {
    /// The status is not known to this node.
    Unknown = 0,
    /// The block is being processed by consensus.
    Processing = 1,
    /// The block has been rejected.
    Rejected = 2,
    /// The block has been accepted.
    Accepted = 3,
}

impl Status {
    /// Returns true if consensus has reached a final decision on the block.
    pub fn decided(self) -> bool {
        matches!(self, Status::Accepted | Status::Rejected)
    }
}

impl TryFrom<u32> for Status {
    type Error = VmError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Status::Unknown),
            1 => Ok(Status::Processing),
            2 => Ok(Status::Rejected),
            3 => Ok(Status::Accepted),
            other => Err(VmError::InvalidStatus(other)),
        }
    }
}

impl From<Status> for u32 {
    fn from(status: Status) -> Self {
        status as u32
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Unknown => "Unknown",
            Status::Processing => "Processing",
            Status::Rejected => "Rejected",
            Status::Accepted => "Accepted",
        };
        f.write_str(s)
    }
}

/// The phase the consensus engine is in, pushed to the plugin through `SetState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum EngineState {
    /// The chain is being created.
    Initializing = 0,
    /// The engine is fetching a state summary.
    StateSyncing = 1,
    /// The engine is fetching and executing historical blocks.
    Bootstrapping = 2,
    /// The engine is following the tip of the chain.
    NormalOp = 3,
}

impl From<EngineState> for u32 {
    fn from(state: EngineState) -> Self {
        state as u32
    }
}

/// A notification the plugin sends to the consensus engine through the messenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum EngineMessage {
    /// The plugin has transactions it would like to put into a block.
    PendingTxs = 1,
    /// The plugin has finished syncing to a state summary.
    StateSyncDone = 2,
}

impl TryFrom<u32> for EngineMessage {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(EngineMessage::PendingTxs),
            2 => Ok(EngineMessage::StateSyncDone),
            other => Err(other),
        }
    }
}

impl From<EngineMessage> for u32 {
    fn from(msg: EngineMessage) -> Self {
        msg as u32
    }
}

/// The engine lock an HTTP handler must hold while serving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum LockOption {
    /// The handler takes the engine's write lock.
    Write = 0,
    /// The handler takes the engine's read lock.
    Read = 1,
    /// The handler runs without taking the engine lock.
    None = 2,
}

impl TryFrom<u32> for LockOption {
    type Error = VmError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LockOption::Write),
            1 => Ok(LockOption::Read),
            2 => Ok(LockOption::None),
            other => Err(VmError::InvalidLockOption(other)),
        }
    }
}

impl From<LockOption> for u32 {
    fn from(opt: LockOption) -> Self {
        opt as u32
    }
}
