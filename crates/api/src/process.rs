// Path: crates/api/src/process.rs
use plugvm_types::VmError;

/// Tracks the OS processes whose resource usage the node accounts for.
pub trait ProcessTracker: Send + Sync {
    fn track_process(&self, pid: u32);
    fn untrack_process(&self, pid: u32);
}

/// A running plugin process owned by exactly one VM adapter.
pub trait PluginProcess: Send + Sync {
    fn pid(&self) -> u32;
    /// Terminates the process. Killing an already exited process is not an error.
    fn kill(&mut self) -> Result<(), VmError>;
}
