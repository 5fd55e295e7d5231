// Path: crates/test_utils/src/mocks.rs
//! In-memory stand-ins for the node-local subsystems, recording what they were asked.

use async_trait::async_trait;
use parking_lot::Mutex;
use plugvm_api::database::{BatchOp, Database, MemDb};
use plugvm_api::process::{PluginProcess, ProcessTracker};
use plugvm_api::subsystems::{
    AliasReader, AppSender, AtomicRequests, Element, IndexedPage, Keystore, SharedMemory, SubnetLookup,
    ValidatorOutput, ValidatorState,
};
use plugvm_telemetry::{Gatherer, MetricsRegisterer};
use plugvm_types::{Id, NodeId, VmError};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct MockKeystore {
    users: Mutex<HashMap<String, (String, Arc<MemDb>)>>,
}

impl MockKeystore {
    pub fn add_user(&self, username: &str, password: &str) -> Arc<MemDb> {
        let db = Arc::new(MemDb::new());
        self.users
            .lock()
            .insert(username.to_string(), (password.to_string(), db.clone()));
        db
    }
}

impl Keystore for MockKeystore {
    fn get_database(&self, username: &str, password: &str) -> Result<Arc<dyn Database>, VmError> {
        let users = self.users.lock();
        match users.get(username) {
            Some((expected, db)) if expected == password => Ok(db.clone()),
            Some(_) => Err(VmError::InvalidArgument("incorrect password".into())),
            None => Err(VmError::NotFound),
        }
    }
}

#[derive(Default)]
pub struct MockSharedMemory {
    values: Mutex<BTreeMap<(Id, Vec<u8>), Element>>,
    pub applied_batches: Mutex<Vec<Vec<BatchOp>>>,
}

impl SharedMemory for MockSharedMemory {
    fn get(&self, peer_chain_id: Id, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, VmError> {
        let values = self.values.lock();
        keys.iter()
            .map(|k| {
                values
                    .get(&(peer_chain_id, k.clone()))
                    .map(|e| e.value.clone())
                    .ok_or(VmError::NotFound)
            })
            .collect()
    }

    fn indexed(
        &self,
        peer_chain_id: Id,
        traits: &[Vec<u8>],
        _start_trait: &[u8],
        start_key: &[u8],
        limit: usize,
    ) -> Result<IndexedPage, VmError> {
        let values = self.values.lock();
        let mut page = IndexedPage::default();
        for ((peer, key), element) in values.iter() {
            if *peer != peer_chain_id || key.as_slice() <= start_key && !start_key.is_empty() {
                continue;
            }
            let Some(matched) = element.traits.iter().find(|t| traits.contains(t)) else {
                continue;
            };
            if page.values.len() == limit {
                break;
            }
            page.values.push(element.value.clone());
            page.last_trait = matched.clone();
            page.last_key = key.clone();
        }
        Ok(page)
    }

    fn apply(
        &self,
        requests: BTreeMap<Id, AtomicRequests>,
        batch: Vec<BatchOp>,
    ) -> Result<(), VmError> {
        let mut values = self.values.lock();
        for (peer, reqs) in requests {
            for key in reqs.remove_requests {
                values.remove(&(peer, key));
            }
            for element in reqs.put_requests {
                values.insert((peer, element.key.clone()), element);
            }
        }
        self.applied_batches.lock().push(batch);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockAliasReader {
    aliases: Mutex<BTreeMap<Id, Vec<String>>>,
}

impl MockAliasReader {
    pub fn alias(&self, id: Id, alias: &str) {
        self.aliases
            .lock()
            .entry(id)
            .or_default()
            .push(alias.to_string());
    }
}

impl AliasReader for MockAliasReader {
    fn lookup(&self, alias: &str) -> Result<Id, VmError> {
        self.aliases
            .lock()
            .iter()
            .find(|(_, names)| names.iter().any(|n| n == alias))
            .map(|(id, _)| *id)
            .ok_or(VmError::NotFound)
    }

    fn primary_alias(&self, id: Id) -> Result<String, VmError> {
        self.aliases
            .lock()
            .get(&id)
            .and_then(|names| names.first().cloned())
            .ok_or(VmError::NotFound)
    }

    fn aliases(&self, id: Id) -> Result<Vec<String>, VmError> {
        Ok(self.aliases.lock().get(&id).cloned().unwrap_or_default())
    }
}

pub struct MockSubnetLookup {
    subnet_id: Id,
}

impl MockSubnetLookup {
    pub fn new(subnet_id: Id) -> Self {
        Self { subnet_id }
    }
}

impl SubnetLookup for MockSubnetLookup {
    fn subnet_id(&self, _chain_id: Id) -> Result<Id, VmError> {
        Ok(self.subnet_id)
    }
}

/// A message handed to [`RecordingAppSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentAppMessage {
    Request {
        node_ids: BTreeSet<NodeId>,
        request_id: u32,
        request: Vec<u8>,
    },
    Response {
        node_id: NodeId,
        request_id: u32,
        response: Vec<u8>,
    },
    Gossip {
        msg: Vec<u8>,
    },
    GossipSpecific {
        node_ids: BTreeSet<NodeId>,
        msg: Vec<u8>,
    },
    CrossChainRequest {
        chain_id: Id,
        request_id: u32,
        request: Vec<u8>,
    },
    CrossChainResponse {
        chain_id: Id,
        request_id: u32,
        response: Vec<u8>,
    },
}

#[derive(Default)]
pub struct RecordingAppSender {
    pub sent: Mutex<Vec<SentAppMessage>>,
}

#[async_trait]
impl AppSender for RecordingAppSender {
    async fn send_app_request(
        &self,
        node_ids: BTreeSet<NodeId>,
        request_id: u32,
        request: Vec<u8>,
    ) -> Result<(), VmError> {
        self.sent.lock().push(SentAppMessage::Request {
            node_ids,
            request_id,
            request,
        });
        Ok(())
    }

    async fn send_app_response(
        &self,
        node_id: NodeId,
        request_id: u32,
        response: Vec<u8>,
    ) -> Result<(), VmError> {
        self.sent.lock().push(SentAppMessage::Response {
            node_id,
            request_id,
            response,
        });
        Ok(())
    }

    async fn send_app_gossip(&self, msg: Vec<u8>) -> Result<(), VmError> {
        self.sent.lock().push(SentAppMessage::Gossip { msg });
        Ok(())
    }

    async fn send_app_gossip_specific(
        &self,
        node_ids: BTreeSet<NodeId>,
        msg: Vec<u8>,
    ) -> Result<(), VmError> {
        self.sent
            .lock()
            .push(SentAppMessage::GossipSpecific { node_ids, msg });
        Ok(())
    }

    async fn send_cross_chain_app_request(
        &self,
        chain_id: Id,
        request_id: u32,
        request: Vec<u8>,
    ) -> Result<(), VmError> {
        self.sent.lock().push(SentAppMessage::CrossChainRequest {
            chain_id,
            request_id,
            request,
        });
        Ok(())
    }

    async fn send_cross_chain_app_response(
        &self,
        chain_id: Id,
        request_id: u32,
        response: Vec<u8>,
    ) -> Result<(), VmError> {
        self.sent.lock().push(SentAppMessage::CrossChainResponse {
            chain_id,
            request_id,
            response,
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct MockValidatorState {
    pub minimum_height: Mutex<u64>,
    pub current_height: Mutex<u64>,
    pub validators: Mutex<BTreeMap<NodeId, ValidatorOutput>>,
}

#[async_trait]
impl ValidatorState for MockValidatorState {
    async fn get_minimum_height(&self) -> Result<u64, VmError> {
        Ok(*self.minimum_height.lock())
    }

    async fn get_current_height(&self) -> Result<u64, VmError> {
        Ok(*self.current_height.lock())
    }

    async fn get_subnet_id(&self, _chain_id: Id) -> Result<Id, VmError> {
        Ok(Id::EMPTY)
    }

    async fn get_validator_set(
        &self,
        height: u64,
        _subnet_id: Id,
    ) -> Result<BTreeMap<NodeId, ValidatorOutput>, VmError> {
        if height > *self.current_height.lock() {
            return Err(VmError::InvalidArgument(format!(
                "height {} is above the current height",
                height
            )));
        }
        Ok(self.validators.lock().clone())
    }
}

/// Keeps every gatherer registered through the chain context.
#[derive(Default)]
pub struct RecordingRegisterer {
    pub registered: Mutex<Vec<Arc<dyn Gatherer>>>,
}

impl RecordingRegisterer {
    pub fn count(&self) -> usize {
        self.registered.lock().len()
    }

    pub fn first(&self) -> Option<Arc<dyn Gatherer>> {
        self.registered.lock().first().cloned()
    }
}

impl MetricsRegisterer for RecordingRegisterer {
    fn register(&self, gatherer: Arc<dyn Gatherer>) -> Result<(), VmError> {
        self.registered.lock().push(gatherer);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingTracker {
    pub tracked: Mutex<BTreeSet<u32>>,
    pub untracked: Mutex<Vec<u32>>,
}

impl ProcessTracker for RecordingTracker {
    fn track_process(&self, pid: u32) {
        self.tracked.lock().insert(pid);
    }

    fn untrack_process(&self, pid: u32) {
        self.tracked.lock().remove(&pid);
        self.untracked.lock().push(pid);
    }
}

/// A process handle whose `kill` can be told to fail.
pub struct MockProcess {
    pid: u32,
    fail_kill: bool,
    pub killed: Arc<AtomicBool>,
}

impl MockProcess {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            fail_kill: false,
            killed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failing(pid: u32) -> Self {
        Self {
            fail_kill: true,
            ..Self::new(pid)
        }
    }
}

impl PluginProcess for MockProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn kill(&mut self) -> Result<(), VmError> {
        self.killed.store(true, Ordering::SeqCst);
        if self.fail_kill {
            return Err(VmError::Process(format!("failed to kill process {}", self.pid)));
        }
        Ok(())
    }
}
