// Path: crates/api/src/vm.rs
//! The consensus VM contract.
//!
//! [`ChainVm`] is the mandatory surface. Batched block transfer, the height
//! index and state sync are optional capabilities; a VM that lacks one says so
//! through the result types below instead of failing the caller.

use crate::block::{Block, StateSummary};
use crate::database::DatabaseManager;
use crate::http::HandlerSet;
use crate::subsystems::{
    AliasReader, AppSender, Keystore, SharedMemory, SubnetLookup, ValidatorState,
};
use async_trait::async_trait;
use plugvm_telemetry::MetricsRegisterer;
use plugvm_types::{EngineMessage, EngineState, Id, NodeId, VmError};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;

/// A feature extension offered to a VM at initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fx {
    pub id: Id,
}

/// Everything the node knows about the chain a VM runs.
#[derive(Clone)]
pub struct ChainContext {
    pub network_id: u32,
    pub subnet_id: Id,
    pub chain_id: Id,
    pub node_id: NodeId,
    /// The exchange chain of the primary network.
    pub x_chain_id: Id,
    /// The asset fees are paid in.
    pub primary_asset_id: Id,

    pub keystore: Arc<dyn Keystore>,
    pub shared_memory: Arc<dyn SharedMemory>,
    pub bc_lookup: Arc<dyn AliasReader>,
    pub sn_lookup: Arc<dyn SubnetLookup>,
    pub validator_state: Arc<dyn ValidatorState>,
    pub metrics: Arc<dyn MetricsRegisterer>,
}

impl std::fmt::Debug for ChainContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainContext")
            .field("network_id", &self.network_id)
            .field("subnet_id", &self.subnet_id)
            .field("chain_id", &self.chain_id)
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}

/// Inputs to [`CommonVm::initialize`].
#[derive(Clone)]
pub struct InitializeParams {
    pub context: ChainContext,
    pub db_manager: Arc<dyn DatabaseManager>,
    pub genesis_bytes: Vec<u8>,
    pub upgrade_bytes: Vec<u8>,
    pub config_bytes: Vec<u8>,
    /// Where the VM posts notifications for the engine.
    pub to_engine: mpsc::Sender<EngineMessage>,
    pub fxs: Vec<Fx>,
    pub app_sender: Arc<dyn AppSender>,
}

/// Application-level messages delivered from the network.
#[async_trait]
pub trait AppHandler: Send + Sync {
    async fn app_request(
        &self,
        node_id: NodeId,
        request_id: u32,
        deadline: SystemTime,
        request: Vec<u8>,
    ) -> Result<(), VmError>;
    async fn app_request_failed(&self, node_id: NodeId, request_id: u32) -> Result<(), VmError>;
    async fn app_response(
        &self,
        node_id: NodeId,
        request_id: u32,
        response: Vec<u8>,
    ) -> Result<(), VmError>;
    async fn app_gossip(&self, node_id: NodeId, msg: Vec<u8>) -> Result<(), VmError>;

    async fn cross_chain_app_request(
        &self,
        chain_id: Id,
        request_id: u32,
        deadline: SystemTime,
        request: Vec<u8>,
    ) -> Result<(), VmError>;
    async fn cross_chain_app_request_failed(
        &self,
        chain_id: Id,
        request_id: u32,
    ) -> Result<(), VmError>;
    async fn cross_chain_app_response(
        &self,
        chain_id: Id,
        request_id: u32,
        response: Vec<u8>,
    ) -> Result<(), VmError>;
}

/// Lifecycle and networking hooks common to every VM.
#[async_trait]
pub trait CommonVm: AppHandler {
    /// Must complete successfully before any other method is called.
    async fn initialize(&mut self, params: InitializeParams) -> Result<(), VmError>;
    async fn set_state(&self, state: EngineState) -> Result<(), VmError>;
    /// Must be called at most once; no other method is valid afterwards.
    async fn shutdown(&self) -> Result<(), VmError>;
    async fn version(&self) -> Result<String, VmError>;
    /// Handlers that do not depend on chain state, mounted once per VM type.
    async fn create_static_handlers(&self) -> Result<HandlerSet, VmError>;
    async fn create_handlers(&self) -> Result<HandlerSet, VmError>;
    async fn connected(&self, node_id: NodeId, version: &str) -> Result<(), VmError>;
    async fn disconnected(&self, node_id: NodeId) -> Result<(), VmError>;
    async fn health_check(&self) -> Result<serde_json::Value, VmError>;
}

/// A linear chain of blocks.
#[async_trait]
pub trait ChainVm: CommonVm {
    async fn build_block(&self) -> Result<Arc<dyn Block>, VmError>;
    async fn parse_block(&self, bytes: &[u8]) -> Result<Arc<dyn Block>, VmError>;
    async fn get_block(&self, id: Id) -> Result<Arc<dyn Block>, VmError>;
    async fn set_preference(&self, id: Id) -> Result<(), VmError>;
    async fn last_accepted(&self) -> Result<Id, VmError>;
}

/// Bulk block transfer for bootstrapping.
#[async_trait]
pub trait BatchedChainVm: Send + Sync {
    /// Returns serialized ancestors of `blk_id`, bounded by count, total size and time.
    async fn get_ancestors(
        &self,
        blk_id: Id,
        max_blocks_num: usize,
        max_blocks_size: usize,
        max_retrieval_time: Duration,
    ) -> Result<Vec<Vec<u8>>, VmError>;
    async fn batched_parse_block(&self, blks: &[Vec<u8>]) -> Result<Vec<Arc<dyn Block>>, VmError>;
}

/// Whether the VM's height index can serve queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightIndexStatus {
    Ready,
    /// The VM does not keep a height index at all.
    NotImplemented,
}

/// Lookup of accepted blocks by height.
#[async_trait]
pub trait HeightIndexedChainVm: Send + Sync {
    async fn verify_height_index(&self) -> Result<HeightIndexStatus, VmError>;
    async fn get_block_id_at_height(&self, height: u64) -> Result<Id, VmError>;
}

/// Syncing to a state summary instead of replaying history.
#[async_trait]
pub trait StateSyncableVm: Send + Sync {
    /// `Ok(false)` when the VM does not implement state sync.
    async fn state_sync_enabled(&self) -> Result<bool, VmError>;
    async fn get_ongoing_sync_state_summary(&self) -> Result<Arc<dyn StateSummary>, VmError>;
    async fn get_last_state_summary(&self) -> Result<Arc<dyn StateSummary>, VmError>;
    async fn parse_state_summary(&self, bytes: &[u8]) -> Result<Arc<dyn StateSummary>, VmError>;
    async fn get_state_summary(&self, height: u64) -> Result<Arc<dyn StateSummary>, VmError>;
}
