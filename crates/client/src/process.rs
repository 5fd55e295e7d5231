// Path: crates/client/src/process.rs
//! Scoped ownership of the plugin process.

use plugvm_api::process::{PluginProcess, ProcessTracker};
use plugvm_types::VmError;
use std::sync::Arc;

/// A plugin process registered with the node's process tracker.
///
/// Tracking starts on construction. [`TrackedProcess::release`] kills the
/// process and stops tracking it; dropping an unreleased value does the same.
pub struct TrackedProcess {
    process: Box<dyn PluginProcess>,
    tracker: Arc<dyn ProcessTracker>,
    pid: u32,
    released: bool,
}

impl std::fmt::Debug for TrackedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedProcess")
            .field("pid", &self.pid)
            .field("released", &self.released)
            .finish()
    }
}

impl TrackedProcess {
    pub fn new(process: Box<dyn PluginProcess>, tracker: Arc<dyn ProcessTracker>) -> Self {
        let pid = process.pid();
        tracker.track_process(pid);
        tracing::debug!(target: "vm_client", pid, "tracking plugin process");
        Self {
            process,
            tracker,
            pid,
            released: false,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Kills the process and untracks it. The pid is untracked even if the kill fails.
    pub fn release(&mut self) -> Result<(), VmError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let killed = self.process.kill();
        self.tracker.untrack_process(self.pid);
        killed
    }
}

impl Drop for TrackedProcess {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.release() {
            tracing::warn!(target: "vm_client", pid = self.pid, error = %e, "failed to kill plugin process");
        }
    }
}
