// Path: crates/chain/src/config.rs
//! Capacities of the chain-state caches.

use plugvm_types::VmError;
use serde::{Deserialize, Serialize};

const DEFAULT_CACHE_SIZE: usize = 2048;

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

/// Bounds for the LRU caches kept by [`crate::ChainState`].
///
/// Verified blocks are not bounded: they stay cached until accepted or
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainStateConfig {
    /// Accepted and rejected blocks.
    #[serde(default = "default_cache_size")]
    pub decided_cache_size: usize,
    /// Ids the VM reported as unknown.
    #[serde(default = "default_cache_size")]
    pub missing_cache_size: usize,
    /// Processing blocks that have not been verified yet.
    #[serde(default = "default_cache_size")]
    pub unverified_cache_size: usize,
    /// Serialized block to id, so re-parsing known bytes skips the VM.
    #[serde(default = "default_cache_size")]
    pub bytes_to_id_cache_size: usize,
}

impl Default for ChainStateConfig {
    fn default() -> Self {
        Self {
            decided_cache_size: DEFAULT_CACHE_SIZE,
            missing_cache_size: DEFAULT_CACHE_SIZE,
            unverified_cache_size: DEFAULT_CACHE_SIZE,
            bytes_to_id_cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl ChainStateConfig {
    /// Rejects zero capacities.
    pub fn validate(&self) -> Result<(), VmError> {
        for (name, size) in [
            ("decided_cache_size", self.decided_cache_size),
            ("missing_cache_size", self.missing_cache_size),
            ("unverified_cache_size", self.unverified_cache_size),
            ("bytes_to_id_cache_size", self.bytes_to_id_cache_size),
        ] {
            if size == 0 {
                return Err(VmError::InvalidArgument(format!("{} must be non-zero", name)));
            }
        }
        Ok(())
    }
}
