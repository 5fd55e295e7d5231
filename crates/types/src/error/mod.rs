// Path: crates/types/src/error/mod.rs
//! Core error types for the plugin VM adapter.

use thiserror::Error;

/// The shared table translating embedded wire codes to typed errors.
pub mod codes;

pub use codes::{
    code_from_db_error, code_from_error, db_error_from_code, error_from_code, WireCode,
};

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors produced by the local database a proxy fronts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// The database has been closed.
    #[error("closed")]
    Closed,
    /// The requested key does not exist.
    #[error("not found")]
    NotFound,
    /// The storage backend failed.
    #[error("Database backend error: {0}")]
    Backend(String),
}

impl ErrorCode for DatabaseError {
    fn code(&self) -> &'static str {
        match self {
            Self::Closed => "DB_CLOSED",
            Self::NotFound => "DB_NOT_FOUND",
            Self::Backend(_) => "DB_BACKEND_ERROR",
        }
    }
}

/// Errors surfaced by the VM adapter, its handles and the proxies it hosts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// The remote resource has been closed (wire code 1).
    #[error("closed")]
    Closed,
    /// The requested entity does not exist (wire code 2).
    #[error("not found")]
    NotFound,
    /// The plugin does not implement the height index (wire code 3).
    #[error("this VM does not implement the height index")]
    HeightIndexNotImplemented,
    /// The plugin's height index is still being built (wire code 4).
    #[error("query failed because height index is incomplete")]
    HeightIndexIncomplete,
    /// The plugin does not implement state sync (wire code 5).
    #[error("this VM does not implement state sync")]
    StateSyncNotImplemented,
    /// The plugin returned a non-zero code absent from the code table.
    #[error("unknown wire error code {0}")]
    UnknownCode(u32),

    /// Feature extensions were passed to a plugin that cannot support them.
    #[error("unsupported feature extensions")]
    UnsupportedFeatureExtensions,
    /// A batched parse returned a different number of blocks than were sent.
    #[error("BatchedParseBlock returned {got} blocks, expected {expected}")]
    BatchCountMismatch {
        /// The number of blocks in the request.
        expected: usize,
        /// The number of blocks in the response.
        got: usize,
    },
    /// An identifier had the wrong length.
    #[error("Invalid identifier length. Expected {expected} bytes, got {got}")]
    InvalidId {
        /// The required length in bytes.
        expected: usize,
        /// The length that was received.
        got: usize,
    },
    /// A block status value outside the known set.
    #[error("Invalid block status {0}")]
    InvalidStatus(u32),
    /// An HTTP lock option value outside the known set.
    #[error("Invalid lock option {0}")]
    InvalidLockOption(u32),
    /// A timestamp was missing or out of range.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// The RPC call failed in transport: connection loss, timeout, cancellation
    /// or an undecodable message.
    #[error("RPC transport error: {0}")]
    Transport(String),
    /// The plugin's health endpoint could not be reached.
    #[error("health check failed: {0}")]
    HealthCheck(String),
    /// The adapter was used before `initialize` completed.
    #[error("VM not initialized")]
    NotInitialized,
    /// A request argument was rejected by a local subsystem.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Attaching, killing or tracking the plugin process failed.
    #[error("Plugin process error: {0}")]
    Process(String),
    /// Registering or gathering metrics failed.
    #[error("Metrics error: {0}")]
    Metrics(String),
    /// A local IO operation (e.g. binding a listener) failed.
    #[error("IO error: {0}")]
    Io(String),
    /// A node-local subsystem failed.
    #[error("Subsystem error: {0}")]
    Subsystem(String),
}

impl VmError {
    /// Returns true for the soft "capability absent" signals a caller may
    /// treat as an optional feature being unavailable.
    pub fn is_not_implemented(&self) -> bool {
        matches!(
            self,
            Self::HeightIndexNotImplemented | Self::StateSyncNotImplemented
        )
    }
}

impl ErrorCode for VmError {
    fn code(&self) -> &'static str {
        match self {
            Self::Closed => "VM_CLOSED",
            Self::NotFound => "VM_NOT_FOUND",
            Self::HeightIndexNotImplemented => "VM_HEIGHT_INDEX_NOT_IMPLEMENTED",
            Self::HeightIndexIncomplete => "VM_HEIGHT_INDEX_INCOMPLETE",
            Self::StateSyncNotImplemented => "VM_STATE_SYNC_NOT_IMPLEMENTED",
            Self::UnknownCode(_) => "VM_UNKNOWN_CODE",
            Self::UnsupportedFeatureExtensions => "VM_UNSUPPORTED_FXS",
            Self::BatchCountMismatch { .. } => "VM_BATCH_COUNT_MISMATCH",
            Self::InvalidId { .. } => "VM_INVALID_ID",
            Self::InvalidStatus(_) => "VM_INVALID_STATUS",
            Self::InvalidLockOption(_) => "VM_INVALID_LOCK_OPTION",
            Self::InvalidTimestamp(_) => "VM_INVALID_TIMESTAMP",
            Self::Transport(_) => "VM_TRANSPORT",
            Self::HealthCheck(_) => "VM_HEALTH_CHECK",
            Self::NotInitialized => "VM_NOT_INITIALIZED",
            Self::InvalidArgument(_) => "VM_INVALID_ARGUMENT",
            Self::Process(_) => "VM_PROCESS",
            Self::Metrics(_) => "VM_METRICS",
            Self::Io(_) => "VM_IO",
            Self::Subsystem(_) => "VM_SUBSYSTEM",
        }
    }
}

impl From<DatabaseError> for VmError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Closed => VmError::Closed,
            DatabaseError::NotFound => VmError::NotFound,
            DatabaseError::Backend(msg) => VmError::Subsystem(msg),
        }
    }
}

impl From<std::io::Error> for VmError {
    fn from(e: std::io::Error) -> Self {
        VmError::Io(e.to_string())
    }
}
