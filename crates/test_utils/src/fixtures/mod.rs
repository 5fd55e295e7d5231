//! Deterministic identifiers and a fully mocked chain context.

use crate::mocks::{
    MockAliasReader, MockKeystore, MockSharedMemory, MockSubnetLookup, MockValidatorState,
    RecordingAppSender, RecordingRegisterer,
};
use plugvm_api::vm::ChainContext;
use plugvm_types::{Id, NodeId};
use std::sync::Arc;

/// An identifier whose every byte is `n`.
pub fn id(n: u8) -> Id {
    Id([n; 32])
}

/// A node identifier whose every byte is `n`.
pub fn node_id(n: u8) -> NodeId {
    NodeId([n; 20])
}

/// The mocks behind a [`ChainContext`] built by [`test_context`].
#[derive(Clone)]
pub struct ContextMocks {
    pub keystore: Arc<MockKeystore>,
    pub shared_memory: Arc<MockSharedMemory>,
    pub bc_lookup: Arc<MockAliasReader>,
    pub sn_lookup: Arc<MockSubnetLookup>,
    pub validator_state: Arc<MockValidatorState>,
    pub app_sender: Arc<RecordingAppSender>,
    pub metrics: Arc<RecordingRegisterer>,
}

/// A context for network 12345 with chain `id(2)` on subnet `id(1)`, node `node_id(3)`.
pub fn test_context() -> (ChainContext, ContextMocks) {
    let mocks = ContextMocks {
        keystore: Arc::new(MockKeystore::default()),
        shared_memory: Arc::new(MockSharedMemory::default()),
        bc_lookup: Arc::new(MockAliasReader::default()),
        sn_lookup: Arc::new(MockSubnetLookup::new(id(1))),
        validator_state: Arc::new(MockValidatorState::default()),
        app_sender: Arc::new(RecordingAppSender::default()),
        metrics: Arc::new(RecordingRegisterer::default()),
    };
    let ctx = ChainContext {
        network_id: 12345,
        subnet_id: id(1),
        chain_id: id(2),
        node_id: node_id(3),
        x_chain_id: id(4),
        primary_asset_id: id(5),
        keystore: mocks.keystore.clone(),
        shared_memory: mocks.shared_memory.clone(),
        bc_lookup: mocks.bc_lookup.clone(),
        sn_lookup: mocks.sn_lookup.clone(),
        validator_state: mocks.validator_state.clone(),
        metrics: mocks.metrics.clone(),
    };
    (ctx, mocks)
}
