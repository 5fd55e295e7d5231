// Path: crates/chain/src/state.rs
//! The caching wrapper in front of a VM's block operations.

use crate::config::ChainStateConfig;
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use plugvm_api::block::Block;
use plugvm_telemetry::CacheMetricsSink;
use plugvm_types::{Id, Status, VmError};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::SystemTime;

/// The uncached block operations of a VM.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn get_block(&self, id: Id) -> Result<Arc<dyn Block>, VmError>;
    async fn parse_block(&self, bytes: &[u8]) -> Result<Arc<dyn Block>, VmError>;
    async fn build_block(&self) -> Result<Arc<dyn Block>, VmError>;
}

struct Caches {
    /// Processing blocks that passed verification. Unbounded.
    verified: HashMap<Id, Arc<dyn Block>>,
    decided: LruCache<Id, Arc<dyn Block>>,
    unverified: LruCache<Id, Arc<dyn Block>>,
    missing: LruCache<Id, ()>,
    bytes_to_id: LruCache<Vec<u8>, Id>,
    last_accepted: Arc<dyn Block>,
}

impl Caches {
    fn lookup(&mut self, id: &Id) -> Option<Arc<dyn Block>> {
        if let Some(blk) = self.verified.get(id) {
            return Some(blk.clone());
        }
        if let Some(blk) = self.decided.get(id) {
            return Some(blk.clone());
        }
        self.unverified.get(id).cloned()
    }

    fn insert_by_status(&mut self, blk: Arc<dyn Block>) {
        let id = blk.id();
        self.missing.pop(&id);
        if blk.status() == Status::Processing {
            self.unverified.put(id, blk);
        } else {
            self.decided.put(id, blk);
        }
    }

    fn flush(&mut self) {
        self.verified.clear();
        self.decided.clear();
        self.unverified.clear();
        self.missing.clear();
        self.bytes_to_id.clear();
    }
}

struct Shared {
    caches: Mutex<Caches>,
    source: Arc<dyn BlockSource>,
    metrics: Arc<dyn CacheMetricsSink>,
}

impl Shared {
    fn wrap(self: &Arc<Self>, blk: Arc<dyn Block>) -> Arc<dyn Block> {
        Arc::new(BlockWrapper {
            inner: blk,
            state: Arc::downgrade(self),
        })
    }

    fn lookup(&self, id: &Id) -> Option<Arc<dyn Block>> {
        let found = self.caches.lock().lookup(id);
        self.metrics.inc_lookup("block", found.is_some());
        found
    }
}

/// Caches blocks by consensus phase and tracks the last accepted block.
///
/// Cloning is cheap; clones share the same caches.
#[derive(Clone)]
pub struct ChainState {
    shared: Arc<Shared>,
}

impl fmt::Debug for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let caches = self.shared.caches.lock();
        f.debug_struct("ChainState")
            .field("last_accepted", &caches.last_accepted.id())
            .field("verified", &caches.verified.len())
            .field("decided", &caches.decided.len())
            .field("unverified", &caches.unverified.len())
            .finish()
    }
}

fn capacity(size: usize, name: &str) -> Result<NonZeroUsize, VmError> {
    NonZeroUsize::new(size)
        .ok_or_else(|| VmError::InvalidArgument(format!("{} must be non-zero", name)))
}

impl ChainState {
    /// Creates the state seeded with `last_accepted`, which must have status
    /// [`Status::Accepted`].
    pub fn new(
        config: &ChainStateConfig,
        source: Arc<dyn BlockSource>,
        last_accepted: Arc<dyn Block>,
        metrics: Arc<dyn CacheMetricsSink>,
    ) -> Result<Self, VmError> {
        config.validate()?;
        ensure_accepted(last_accepted.as_ref())?;
        let mut caches = Caches {
            verified: HashMap::new(),
            decided: LruCache::new(capacity(config.decided_cache_size, "decided_cache_size")?),
            unverified: LruCache::new(capacity(
                config.unverified_cache_size,
                "unverified_cache_size",
            )?),
            missing: LruCache::new(capacity(config.missing_cache_size, "missing_cache_size")?),
            bytes_to_id: LruCache::new(capacity(
                config.bytes_to_id_cache_size,
                "bytes_to_id_cache_size",
            )?),
            last_accepted: last_accepted.clone(),
        };
        caches.decided.put(last_accepted.id(), last_accepted);
        Ok(Self {
            shared: Arc::new(Shared {
                caches: Mutex::new(caches),
                source,
                metrics,
            }),
        })
    }

    /// Fetches a block, consulting the caches before the VM.
    pub async fn get_block(&self, id: Id) -> Result<Arc<dyn Block>, VmError> {
        if let Some(blk) = self.shared.lookup(&id) {
            return Ok(self.shared.wrap(blk));
        }
        if self.shared.caches.lock().missing.contains(&id) {
            self.shared.metrics.inc_lookup("missing", true);
            return Err(VmError::NotFound);
        }

        let blk = match self.shared.source.get_block(id).await {
            Ok(blk) => blk,
            Err(VmError::NotFound) => {
                self.shared.caches.lock().missing.put(id, ());
                tracing::debug!(target: "chain_state", block = %id, "marked missing");
                return Err(VmError::NotFound);
            }
            Err(e) => return Err(e),
        };

        let mut caches = self.shared.caches.lock();
        if let Some(cached) = caches.lookup(&id) {
            return Ok(self.shared.wrap(cached));
        }
        caches.insert_by_status(blk.clone());
        drop(caches);
        Ok(self.shared.wrap(blk))
    }

    /// Parses a block, skipping the VM when the bytes were seen before.
    pub async fn parse_block(&self, bytes: &[u8]) -> Result<Arc<dyn Block>, VmError> {
        let known = self.shared.caches.lock().bytes_to_id.get(bytes).copied();
        self.shared.metrics.inc_lookup("bytes_to_id", known.is_some());
        if let Some(id) = known {
            if let Some(blk) = self.shared.lookup(&id) {
                return Ok(self.shared.wrap(blk));
            }
        }

        let blk = self.shared.source.parse_block(bytes).await?;
        let id = blk.id();
        let mut caches = self.shared.caches.lock();
        caches.bytes_to_id.put(bytes.to_vec(), id);
        if let Some(cached) = caches.lookup(&id) {
            return Ok(self.shared.wrap(cached));
        }
        caches.insert_by_status(blk.clone());
        drop(caches);
        Ok(self.shared.wrap(blk))
    }

    /// Asks the VM for a new block and caches it as unverified.
    pub async fn build_block(&self) -> Result<Arc<dyn Block>, VmError> {
        let blk = self.shared.source.build_block().await?;
        let id = blk.id();
        {
            let mut caches = self.shared.caches.lock();
            caches.missing.pop(&id);
            caches.bytes_to_id.put(blk.bytes().to_vec(), id);
            if let Some(cached) = caches.lookup(&id) {
                return Ok(self.shared.wrap(cached));
            }
            caches.unverified.put(id, blk.clone());
        }
        tracing::debug!(target: "chain_state", block = %id, height = blk.height(), "built block");
        Ok(self.shared.wrap(blk))
    }

    pub fn last_accepted(&self) -> Id {
        self.shared.caches.lock().last_accepted.id()
    }

    pub fn last_accepted_block(&self) -> Arc<dyn Block> {
        let blk = self.shared.caches.lock().last_accepted.clone();
        self.shared.wrap(blk)
    }

    /// Replaces the last accepted block and flushes every cache.
    ///
    /// Used when the VM's chain moved underneath the engine, e.g. after state sync.
    pub fn set_last_accepted(&self, blk: Arc<dyn Block>) -> Result<(), VmError> {
        ensure_accepted(blk.as_ref())?;
        let id = blk.id();
        let mut caches = self.shared.caches.lock();
        caches.flush();
        caches.decided.put(id, blk.clone());
        caches.last_accepted = blk;
        drop(caches);
        tracing::info!(target: "chain_state", block = %id, "last accepted block reset");
        Ok(())
    }

    /// Whether `id` is a processing block that passed verification.
    pub fn is_verified(&self, id: &Id) -> bool {
        self.shared.caches.lock().verified.contains_key(id)
    }

    /// Whether the VM reported `id` as unknown and the mark is still cached.
    pub fn is_missing(&self, id: &Id) -> bool {
        self.shared.caches.lock().missing.contains(id)
    }

    /// Drops every cached block except the last accepted one.
    pub fn flush(&self) {
        let mut caches = self.shared.caches.lock();
        caches.flush();
        let last = caches.last_accepted.clone();
        caches.decided.put(last.id(), last);
    }
}

fn ensure_accepted(blk: &dyn Block) -> Result<(), VmError> {
    match blk.status() {
        Status::Accepted => Ok(()),
        other => Err(VmError::InvalidArgument(format!(
            "last accepted block {} has status {}",
            blk.id(),
            other
        ))),
    }
}

/// A block handed out by [`ChainState`].
///
/// Shares the cached block, so status changes are visible through every
/// wrapper. Holds the state weakly; once the state is gone the wrapper still
/// forwards to the VM but no longer moves the block between caches.
struct BlockWrapper {
    inner: Arc<dyn Block>,
    state: Weak<Shared>,
}

impl fmt::Debug for BlockWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BlockWrapper").field(&self.inner).finish()
    }
}

#[async_trait]
impl Block for BlockWrapper {
    fn id(&self) -> Id {
        self.inner.id()
    }

    fn parent(&self) -> Id {
        self.inner.parent()
    }

    fn status(&self) -> Status {
        self.inner.status()
    }

    fn bytes(&self) -> &[u8] {
        self.inner.bytes()
    }

    fn height(&self) -> u64 {
        self.inner.height()
    }

    fn timestamp(&self) -> SystemTime {
        self.inner.timestamp()
    }

    async fn verify(&self) -> Result<(), VmError> {
        let id = self.inner.id();
        let result = self.inner.verify().await;
        if let Some(shared) = self.state.upgrade() {
            let mut caches = shared.caches.lock();
            caches.unverified.pop(&id);
            if result.is_ok() {
                caches.verified.insert(id, self.inner.clone());
            }
        }
        if let Err(e) = &result {
            tracing::debug!(target: "chain_state", block = %id, error = %e, "verify failed");
        }
        result
    }

    /// The caches move before the VM is told, matching the optimistic status
    /// the inner block takes on.
    async fn accept(&self) -> Result<(), VmError> {
        let id = self.inner.id();
        if let Some(shared) = self.state.upgrade() {
            let mut caches = shared.caches.lock();
            caches.verified.remove(&id);
            caches.unverified.pop(&id);
            caches.decided.put(id, self.inner.clone());
            caches.last_accepted = self.inner.clone();
        }
        tracing::debug!(target: "chain_state", block = %id, height = self.inner.height(), "accepted");
        self.inner.accept().await
    }

    async fn reject(&self) -> Result<(), VmError> {
        let id = self.inner.id();
        if let Some(shared) = self.state.upgrade() {
            let mut caches = shared.caches.lock();
            caches.verified.remove(&id);
            caches.unverified.pop(&id);
            caches.decided.put(id, self.inner.clone());
        }
        self.inner.reject().await
    }
}
