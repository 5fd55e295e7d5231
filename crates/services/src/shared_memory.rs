// Path: crates/services/src/shared_memory.rs
//! `sharedmemory.SharedMemory`: cross-chain atomic state.

use crate::{parse_id, to_status};
use plugvm_api::database::BatchOp;
use plugvm_api::subsystems::{AtomicRequests, Element, SharedMemory};
use plugvm_ipc::sharedmemory::{
    shared_memory_server::SharedMemory as SharedMemoryService, ApplyRequest, ApplyResponse,
    GetRequest, GetResponse, IndexedRequest, IndexedResponse,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// `sharedmemory.SharedMemory`.
pub struct SharedMemoryProxy {
    memory: Arc<dyn SharedMemory>,
}

impl SharedMemoryProxy {
    pub fn new(memory: Arc<dyn SharedMemory>) -> Self {
        Self { memory }
    }
}

#[tonic::async_trait]
impl SharedMemoryService for SharedMemoryProxy {
    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let req = request.into_inner();
        let peer = parse_id(&req.peer_chain_id)?;
        let values = self.memory.get(peer, &req.keys).map_err(to_status)?;
        Ok(Response::new(GetResponse { values }))
    }

    async fn indexed(
        &self,
        request: Request<IndexedRequest>,
    ) -> Result<Response<IndexedResponse>, Status> {
        let req = request.into_inner();
        let peer = parse_id(&req.peer_chain_id)?;
        let limit = usize::try_from(req.limit)
            .map_err(|_| Status::invalid_argument(format!("negative limit {}", req.limit)))?;
        let page = self
            .memory
            .indexed(peer, &req.traits, &req.start_trait, &req.start_key, limit)
            .map_err(to_status)?;
        Ok(Response::new(IndexedResponse {
            values: page.values,
            last_trait: page.last_trait,
            last_key: page.last_key,
        }))
    }

    async fn apply(&self, request: Request<ApplyRequest>) -> Result<Response<ApplyResponse>, Status> {
        let req = request.into_inner();
        let mut requests = BTreeMap::new();
        for atomic in req.requests {
            let peer = parse_id(&atomic.peer_chain_id)?;
            let entry: &mut AtomicRequests = requests.entry(peer).or_default();
            entry.remove_requests.extend(atomic.remove_requests);
            entry
                .put_requests
                .extend(atomic.put_requests.into_iter().map(|e| Element {
                    key: e.key,
                    value: e.value,
                    traits: e.traits,
                }));
        }
        let batch = req
            .batch
            .into_iter()
            .map(|op| {
                if op.delete {
                    BatchOp::Delete { key: op.key }
                } else {
                    BatchOp::Put {
                        key: op.key,
                        value: op.value,
                    }
                }
            })
            .collect();
        self.memory.apply(requests, batch).map_err(to_status)?;
        Ok(Response::new(ApplyResponse {}))
    }
}
