// Path: crates/api/src/subsystems.rs
//! Node-local subsystems a plugin reaches through the proxy services.
//!
//! Every implementation must tolerate concurrent calls: a plugin may call back
//! into the same subsystem from several in-flight requests at once.

use crate::database::{BatchOp, Database};
use async_trait::async_trait;
use plugvm_types::{Id, NodeId, VmError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Per-user databases guarded by a password.
pub trait Keystore: Send + Sync {
    fn get_database(&self, username: &str, password: &str) -> Result<Arc<dyn Database>, VmError>;
}

/// A value written to shared memory, indexed by zero or more traits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub traits: Vec<Vec<u8>>,
}

/// The writes one chain makes to its shared region with a peer chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomicRequests {
    pub remove_requests: Vec<Vec<u8>>,
    pub put_requests: Vec<Element>,
}

/// One page of an indexed shared-memory scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedPage {
    pub values: Vec<Vec<u8>>,
    pub last_trait: Vec<u8>,
    pub last_key: Vec<u8>,
}

/// Memory shared between this chain and its peers for cross-chain transfers.
pub trait SharedMemory: Send + Sync {
    fn get(&self, peer_chain_id: Id, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, VmError>;

    /// Returns up to `limit` values carrying any of `traits`, resuming after
    /// (`start_trait`, `start_key`).
    fn indexed(
        &self,
        peer_chain_id: Id,
        traits: &[Vec<u8>],
        start_trait: &[u8],
        start_key: &[u8],
        limit: usize,
    ) -> Result<IndexedPage, VmError>;

    /// Applies the per-chain requests together with `batch` atomically.
    fn apply(
        &self,
        requests: BTreeMap<Id, AtomicRequests>,
        batch: Vec<BatchOp>,
    ) -> Result<(), VmError>;
}

/// The node's registry of chain aliases.
pub trait AliasReader: Send + Sync {
    fn lookup(&self, alias: &str) -> Result<Id, VmError>;
    fn primary_alias(&self, id: Id) -> Result<String, VmError>;
    fn aliases(&self, id: Id) -> Result<Vec<String>, VmError>;
}

/// Resolves the subnet validating a chain.
pub trait SubnetLookup: Send + Sync {
    fn subnet_id(&self, chain_id: Id) -> Result<Id, VmError>;
}

/// Sends application-level messages on behalf of the VM.
#[async_trait]
pub trait AppSender: Send + Sync {
    async fn send_app_request(
        &self,
        node_ids: BTreeSet<NodeId>,
        request_id: u32,
        request: Vec<u8>,
    ) -> Result<(), VmError>;
    async fn send_app_response(
        &self,
        node_id: NodeId,
        request_id: u32,
        response: Vec<u8>,
    ) -> Result<(), VmError>;
    async fn send_app_gossip(&self, msg: Vec<u8>) -> Result<(), VmError>;
    async fn send_app_gossip_specific(
        &self,
        node_ids: BTreeSet<NodeId>,
        msg: Vec<u8>,
    ) -> Result<(), VmError>;
    async fn send_cross_chain_app_request(
        &self,
        chain_id: Id,
        request_id: u32,
        request: Vec<u8>,
    ) -> Result<(), VmError>;
    async fn send_cross_chain_app_response(
        &self,
        chain_id: Id,
        request_id: u32,
        response: Vec<u8>,
    ) -> Result<(), VmError>;
}

/// A validator's entry in a validator set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorOutput {
    pub node_id: NodeId,
    pub weight: u64,
    /// Compressed BLS public key, if the validator registered one.
    pub public_key: Option<Vec<u8>>,
}

/// Read access to validator sets at P-chain heights.
#[async_trait]
pub trait ValidatorState: Send + Sync {
    async fn get_minimum_height(&self) -> Result<u64, VmError>;
    async fn get_current_height(&self) -> Result<u64, VmError>;
    async fn get_subnet_id(&self, chain_id: Id) -> Result<Id, VmError>;
    async fn get_validator_set(
        &self,
        height: u64,
        subnet_id: Id,
    ) -> Result<BTreeMap<NodeId, ValidatorOutput>, VmError>;
}
