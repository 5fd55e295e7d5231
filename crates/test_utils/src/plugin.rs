// Path: crates/test_utils/src/plugin.rs
//! A scriptable stand-in for a plugin process, serving `vm.Vm` over loopback.

use parking_lot::Mutex;
use plugvm_ipc::ghttp::{
    http_server::{Http, HttpServer},
    HandleSimpleHttpRequest, HandleSimpleHttpResponse,
};
use plugvm_ipc::grpcutils::{dial, incoming, new_listener, timestamp_from_time, ServerCloser};
use plugvm_ipc::messenger::{messenger_client::MessengerClient, NotifyRequest};
use plugvm_ipc::rpcdb::{database_client::DatabaseClient, PutRequest};
use plugvm_ipc::vm::{
    vm_server::{Vm, VmServer},
    AppGossipMsg, AppRequestFailedMsg, AppRequestMsg, AppResponseMsg, BatchedParseBlockRequest,
    BatchedParseBlockResponse, BlockAcceptRequest, BlockRejectRequest, BlockVerifyRequest,
    BlockVerifyResponse, BuildBlockResponse, ConnectedRequest, CreateHandlersResponse,
    CrossChainAppRequestFailedMsg, CrossChainAppRequestMsg, CrossChainAppResponseMsg,
    DisconnectedRequest, GatherResponse, GetAncestorsRequest, GetAncestorsResponse,
    GetBlockIdAtHeightRequest, GetBlockIdAtHeightResponse, GetBlockRequest, GetBlockResponse,
    GetLastStateSummaryResponse, GetOngoingSyncStateSummaryResponse, GetStateSummaryRequest,
    GetStateSummaryResponse, Handler, HealthResponse, InitializeRequest, InitializeResponse,
    MetricFamily, ParseBlockRequest, ParseBlockResponse, ParseStateSummaryRequest,
    ParseStateSummaryResponse, SetPreferenceRequest, SetStateRequest, SetStateResponse,
    StateSummaryAcceptRequest, StateSummaryAcceptResponse, StateSyncEnabledResponse,
    VerifyHeightIndexResponse, VersionResponse,
};
use plugvm_types::error::WireCode;
use plugvm_types::{EngineMessage, Id, LockOption, Status as BlockStatus, VmError};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tonic::{Request, Response, Status};

/// A block the mock plugin knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockFixture {
    pub id: Id,
    pub parent: Id,
    pub bytes: Vec<u8>,
    pub status: BlockStatus,
    pub height: u64,
    pub timestamp: SystemTime,
}

impl BlockFixture {
    /// A processing block with id `[n; 32]` and payload `[n; 8]`.
    pub fn new(n: u8, parent: Id, height: u64) -> Self {
        Self {
            id: Id([n; 32]),
            parent,
            bytes: vec![n; 8],
            status: BlockStatus::Processing,
            height,
            timestamp: UNIX_EPOCH + Duration::from_secs(1_700_000_000 + height),
        }
    }

    pub fn with_status(mut self, status: BlockStatus) -> Self {
        self.status = status;
        self
    }

    fn parse_response(&self) -> ParseBlockResponse {
        ParseBlockResponse {
            id: self.id.to_vec(),
            parent_id: self.parent.to_vec(),
            status: u32::from(self.status),
            height: self.height,
            timestamp: Some(timestamp_from_time(self.timestamp)),
        }
    }
}

/// A state summary the mock plugin offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryFixture {
    pub id: Id,
    pub height: u64,
    pub bytes: Vec<u8>,
}

/// What the mock plugin answers. Every field can be changed between calls.
#[derive(Debug, Clone)]
pub struct PluginScript {
    pub last_accepted: BlockFixture,
    /// Blocks served by `GetBlock` (by id) and `ParseBlock` (by bytes).
    pub blocks: Vec<BlockFixture>,
    pub next_built: Option<BlockFixture>,
    /// Replaces the status of every parsed block with this raw value.
    pub parse_status_override: Option<u32>,
    /// Truncates or pads `BatchedParseBlock` responses to this length.
    pub batched_response_len: Option<usize>,
    pub height_index_err: u32,
    pub block_ids_by_height: BTreeMap<u64, Id>,
    pub state_sync_enabled: bool,
    pub state_sync_err: u32,
    pub summary: Option<SummaryFixture>,
    pub summary_err: u32,
    pub summary_accepted: bool,
    pub summary_accept_err: u32,
    pub ancestors: Vec<Vec<u8>>,
    pub verify_timestamp: Option<SystemTime>,
    pub verify_error: Option<String>,
    pub handlers: Vec<(String, LockOption)>,
    pub health_details: Vec<u8>,
    pub version: String,
    pub metric_families: Vec<MetricFamily>,
    pub fail_initialize: bool,
    pub fail_shutdown: bool,
    /// Every call sleeps this long before answering.
    pub delay: Duration,
}

impl Default for PluginScript {
    fn default() -> Self {
        Self {
            last_accepted: BlockFixture::new(9, Id::EMPTY, 0).with_status(BlockStatus::Accepted),
            blocks: Vec::new(),
            next_built: None,
            parse_status_override: None,
            batched_response_len: None,
            height_index_err: 0,
            block_ids_by_height: BTreeMap::new(),
            state_sync_enabled: false,
            state_sync_err: 0,
            summary: None,
            summary_err: 0,
            summary_accepted: false,
            summary_accept_err: 0,
            ancestors: Vec::new(),
            verify_timestamp: None,
            verify_error: None,
            handlers: Vec::new(),
            health_details: Vec::new(),
            version: "mockvm/1.0.0".to_string(),
            metric_families: Vec::new(),
            fail_initialize: false,
            fail_shutdown: false,
            delay: Duration::ZERO,
        }
    }
}

/// The mock plugin. Records every call it receives by method name.
#[derive(Default)]
pub struct MockPlugin {
    pub script: Mutex<PluginScript>,
    pub calls: Mutex<Vec<String>>,
    pub initialize_requests: Mutex<Vec<InitializeRequest>>,
    pub accepted: Mutex<Vec<Id>>,
    pub rejected: Mutex<Vec<Id>>,
    closer: ServerCloser,
}

impl MockPlugin {
    pub fn new(script: PluginScript) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            ..Self::default()
        })
    }

    /// Serves the plugin on a fresh loopback listener.
    pub async fn serve(self: &Arc<Self>) -> Result<SocketAddr, VmError> {
        let listener = new_listener().await?;
        let addr = listener.local_addr()?;
        let router = tonic::transport::Server::builder().add_service(VmServer::from_arc(self.clone()));
        self.closer.spawn("mock plugin", move |stop| {
            router.serve_with_incoming_shutdown(incoming(listener), async move {
                let _ = stop.await;
            })
        });
        Ok(addr)
    }

    /// Stops the plugin and every handler server it started.
    pub async fn stop(&self) {
        self.closer.stop().await;
    }

    pub fn called(&self, method: &str) -> bool {
        self.calls.lock().iter().any(|c| c == method)
    }

    async fn record(&self, method: &str) -> PluginScript {
        self.calls.lock().push(method.to_string());
        let script = self.script.lock().clone();
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        script
    }

    async fn serve_handlers(&self, handlers: Vec<(String, LockOption)>) -> Result<Vec<Handler>, Status> {
        let mut out = Vec::with_capacity(handlers.len());
        for (prefix, lock) in handlers {
            let listener = new_listener()
                .await
                .map_err(|e| Status::internal(e.to_string()))?;
            let addr = listener
                .local_addr()
                .map_err(|e| Status::internal(e.to_string()))?;
            let router = tonic::transport::Server::builder().add_service(HttpServer::new(EchoHttp {
                prefix: prefix.clone(),
            }));
            self.closer.spawn("mock http", move |stop| {
                router.serve_with_incoming_shutdown(incoming(listener), async move {
                    let _ = stop.await;
                })
            });
            out.push(Handler {
                prefix,
                lock_options: u32::from(lock),
                server_addr: addr.to_string(),
            });
        }
        Ok(out)
    }
}

fn internal(e: impl std::fmt::Display) -> Status {
    Status::internal(e.to_string())
}

/// Calls back into the node the way a real plugin would during initialization.
async fn exercise_callbacks(req: &InitializeRequest) -> Result<(), Status> {
    if let Some(server) = req.db_servers.first() {
        let mut db = DatabaseClient::new(dial(&server.server_addr).map_err(internal)?);
        db.put(PutRequest {
            key: b"initialized".to_vec(),
            value: req.chain_id.clone(),
        })
        .await?;
    }
    let mut messenger = MessengerClient::new(dial(&req.server_addr).map_err(internal)?);
    messenger
        .notify(NotifyRequest {
            message: u32::from(EngineMessage::PendingTxs),
        })
        .await?;
    Ok(())
}

#[tonic::async_trait]
impl Vm for MockPlugin {
    async fn initialize(
        &self,
        request: Request<InitializeRequest>,
    ) -> Result<Response<InitializeResponse>, Status> {
        let script = self.record("Initialize").await;
        let req = request.into_inner();
        self.initialize_requests.lock().push(req.clone());
        if script.fail_initialize {
            return Err(Status::internal("initialize failed"));
        }
        exercise_callbacks(&req).await?;
        let last = script.last_accepted;
        Ok(Response::new(InitializeResponse {
            last_accepted_id: last.id.to_vec(),
            last_accepted_parent_id: last.parent.to_vec(),
            height: last.height,
            bytes: last.bytes,
            timestamp: Some(timestamp_from_time(last.timestamp)),
        }))
    }

    async fn set_state(
        &self,
        _request: Request<SetStateRequest>,
    ) -> Result<Response<SetStateResponse>, Status> {
        let last = self.record("SetState").await.last_accepted;
        Ok(Response::new(SetStateResponse {
            last_accepted_id: last.id.to_vec(),
            last_accepted_parent_id: last.parent.to_vec(),
            height: last.height,
            bytes: last.bytes,
            timestamp: Some(timestamp_from_time(last.timestamp)),
        }))
    }

    async fn shutdown(&self, _request: Request<()>) -> Result<Response<()>, Status> {
        if self.record("Shutdown").await.fail_shutdown {
            return Err(Status::internal("shutdown failed"));
        }
        Ok(Response::new(()))
    }

    async fn create_handlers(
        &self,
        _request: Request<()>,
    ) -> Result<Response<CreateHandlersResponse>, Status> {
        let script = self.record("CreateHandlers").await;
        let handlers = self.serve_handlers(script.handlers).await?;
        Ok(Response::new(CreateHandlersResponse { handlers }))
    }

    async fn create_static_handlers(
        &self,
        _request: Request<()>,
    ) -> Result<Response<CreateHandlersResponse>, Status> {
        let script = self.record("CreateStaticHandlers").await;
        let handlers = self.serve_handlers(script.handlers).await?;
        Ok(Response::new(CreateHandlersResponse { handlers }))
    }

    async fn connected(&self, _request: Request<ConnectedRequest>) -> Result<Response<()>, Status> {
        self.record("Connected").await;
        Ok(Response::new(()))
    }

    async fn disconnected(
        &self,
        _request: Request<DisconnectedRequest>,
    ) -> Result<Response<()>, Status> {
        self.record("Disconnected").await;
        Ok(Response::new(()))
    }

    async fn build_block(&self, _request: Request<()>) -> Result<Response<BuildBlockResponse>, Status> {
        self.record("BuildBlock").await;
        let blk = self
            .script
            .lock()
            .next_built
            .take()
            .ok_or_else(|| Status::failed_precondition("no block to build"))?;
        self.script.lock().blocks.push(blk.clone());
        Ok(Response::new(BuildBlockResponse {
            id: blk.id.to_vec(),
            parent_id: blk.parent.to_vec(),
            bytes: blk.bytes,
            height: blk.height,
            timestamp: Some(timestamp_from_time(blk.timestamp)),
        }))
    }

    async fn parse_block(
        &self,
        request: Request<ParseBlockRequest>,
    ) -> Result<Response<ParseBlockResponse>, Status> {
        let script = self.record("ParseBlock").await;
        let bytes = request.into_inner().bytes;
        let blk = script
            .blocks
            .iter()
            .find(|b| b.bytes == bytes)
            .ok_or_else(|| Status::invalid_argument("unparseable block"))?;
        let mut resp = blk.parse_response();
        if let Some(status) = script.parse_status_override {
            resp.status = status;
        }
        Ok(Response::new(resp))
    }

    async fn get_block(
        &self,
        request: Request<GetBlockRequest>,
    ) -> Result<Response<GetBlockResponse>, Status> {
        let script = self.record("GetBlock").await;
        let id = request.into_inner().id;
        let found = script
            .blocks
            .iter()
            .chain(std::iter::once(&script.last_accepted))
            .find(|b| b.id.as_ref() == id.as_slice());
        let resp = match found {
            Some(blk) => GetBlockResponse {
                parent_id: blk.parent.to_vec(),
                bytes: blk.bytes.clone(),
                status: u32::from(blk.status),
                height: blk.height,
                timestamp: Some(timestamp_from_time(blk.timestamp)),
                err: 0,
            },
            None => GetBlockResponse {
                err: WireCode::NotFound.as_u32(),
                ..Default::default()
            },
        };
        Ok(Response::new(resp))
    }

    async fn set_preference(
        &self,
        _request: Request<SetPreferenceRequest>,
    ) -> Result<Response<()>, Status> {
        self.record("SetPreference").await;
        Ok(Response::new(()))
    }

    async fn health(&self, _request: Request<()>) -> Result<Response<HealthResponse>, Status> {
        let details = self.record("Health").await.health_details;
        Ok(Response::new(HealthResponse { details }))
    }

    async fn version(&self, _request: Request<()>) -> Result<Response<VersionResponse>, Status> {
        let version = self.record("Version").await.version;
        Ok(Response::new(VersionResponse { version }))
    }

    async fn app_request(&self, _request: Request<AppRequestMsg>) -> Result<Response<()>, Status> {
        self.record("AppRequest").await;
        Ok(Response::new(()))
    }

    async fn app_request_failed(
        &self,
        _request: Request<AppRequestFailedMsg>,
    ) -> Result<Response<()>, Status> {
        self.record("AppRequestFailed").await;
        Ok(Response::new(()))
    }

    async fn app_response(&self, _request: Request<AppResponseMsg>) -> Result<Response<()>, Status> {
        self.record("AppResponse").await;
        Ok(Response::new(()))
    }

    async fn app_gossip(&self, _request: Request<AppGossipMsg>) -> Result<Response<()>, Status> {
        self.record("AppGossip").await;
        Ok(Response::new(()))
    }

    async fn cross_chain_app_request(
        &self,
        _request: Request<CrossChainAppRequestMsg>,
    ) -> Result<Response<()>, Status> {
        self.record("CrossChainAppRequest").await;
        Ok(Response::new(()))
    }

    async fn cross_chain_app_request_failed(
        &self,
        _request: Request<CrossChainAppRequestFailedMsg>,
    ) -> Result<Response<()>, Status> {
        self.record("CrossChainAppRequestFailed").await;
        Ok(Response::new(()))
    }

    async fn cross_chain_app_response(
        &self,
        _request: Request<CrossChainAppResponseMsg>,
    ) -> Result<Response<()>, Status> {
        self.record("CrossChainAppResponse").await;
        Ok(Response::new(()))
    }

    async fn gather(&self, _request: Request<()>) -> Result<Response<GatherResponse>, Status> {
        let metric_families = self.record("Gather").await.metric_families;
        Ok(Response::new(GatherResponse { metric_families }))
    }

    async fn block_verify(
        &self,
        request: Request<BlockVerifyRequest>,
    ) -> Result<Response<BlockVerifyResponse>, Status> {
        let script = self.record("BlockVerify").await;
        if let Some(reason) = script.verify_error {
            return Err(Status::internal(reason));
        }
        let bytes = request.into_inner().bytes;
        let timestamp = script
            .verify_timestamp
            .or_else(|| {
                script
                    .blocks
                    .iter()
                    .find(|b| b.bytes == bytes)
                    .map(|b| b.timestamp)
            })
            .unwrap_or(UNIX_EPOCH);
        Ok(Response::new(BlockVerifyResponse {
            timestamp: Some(timestamp_from_time(timestamp)),
        }))
    }

    async fn block_accept(
        &self,
        request: Request<BlockAcceptRequest>,
    ) -> Result<Response<()>, Status> {
        self.record("BlockAccept").await;
        let id = Id::from_slice(&request.into_inner().id).map_err(internal)?;
        self.accepted.lock().push(id);
        let mut script = self.script.lock();
        if let Some(blk) = script.blocks.iter_mut().find(|b| b.id == id) {
            blk.status = BlockStatus::Accepted;
            let accepted = blk.clone();
            script.last_accepted = accepted;
        }
        Ok(Response::new(()))
    }

    async fn block_reject(
        &self,
        request: Request<BlockRejectRequest>,
    ) -> Result<Response<()>, Status> {
        self.record("BlockReject").await;
        let id = Id::from_slice(&request.into_inner().id).map_err(internal)?;
        self.rejected.lock().push(id);
        if let Some(blk) = self.script.lock().blocks.iter_mut().find(|b| b.id == id) {
            blk.status = BlockStatus::Rejected;
        }
        Ok(Response::new(()))
    }

    async fn get_ancestors(
        &self,
        _request: Request<GetAncestorsRequest>,
    ) -> Result<Response<GetAncestorsResponse>, Status> {
        let blks_bytes = self.record("GetAncestors").await.ancestors;
        Ok(Response::new(GetAncestorsResponse { blks_bytes }))
    }

    async fn batched_parse_block(
        &self,
        request: Request<BatchedParseBlockRequest>,
    ) -> Result<Response<BatchedParseBlockResponse>, Status> {
        let script = self.record("BatchedParseBlock").await;
        let mut response = Vec::new();
        for bytes in request.into_inner().request {
            let blk = script
                .blocks
                .iter()
                .find(|b| b.bytes == bytes)
                .ok_or_else(|| Status::invalid_argument("unparseable block"))?;
            response.push(blk.parse_response());
        }
        if let Some(len) = script.batched_response_len {
            response.resize(len, ParseBlockResponse::default());
        }
        Ok(Response::new(BatchedParseBlockResponse { response }))
    }

    async fn verify_height_index(
        &self,
        _request: Request<()>,
    ) -> Result<Response<VerifyHeightIndexResponse>, Status> {
        let err = self.record("VerifyHeightIndex").await.height_index_err;
        Ok(Response::new(VerifyHeightIndexResponse { err }))
    }

    async fn get_block_id_at_height(
        &self,
        request: Request<GetBlockIdAtHeightRequest>,
    ) -> Result<Response<GetBlockIdAtHeightResponse>, Status> {
        let script = self.record("GetBlockIdAtHeight").await;
        if script.height_index_err != 0 {
            return Ok(Response::new(GetBlockIdAtHeightResponse {
                blk_id: Vec::new(),
                err: script.height_index_err,
            }));
        }
        let height = request.into_inner().height;
        let resp = match script.block_ids_by_height.get(&height) {
            Some(id) => GetBlockIdAtHeightResponse {
                blk_id: id.to_vec(),
                err: 0,
            },
            None => GetBlockIdAtHeightResponse {
                blk_id: Vec::new(),
                err: WireCode::NotFound.as_u32(),
            },
        };
        Ok(Response::new(resp))
    }

    async fn state_sync_enabled(
        &self,
        _request: Request<()>,
    ) -> Result<Response<StateSyncEnabledResponse>, Status> {
        let script = self.record("StateSyncEnabled").await;
        Ok(Response::new(StateSyncEnabledResponse {
            enabled: script.state_sync_enabled,
            err: script.state_sync_err,
        }))
    }

    async fn get_ongoing_sync_state_summary(
        &self,
        _request: Request<()>,
    ) -> Result<Response<GetOngoingSyncStateSummaryResponse>, Status> {
        let script = self.record("GetOngoingSyncStateSummary").await;
        let resp = match (script.summary_err, script.summary) {
            (0, Some(s)) => GetOngoingSyncStateSummaryResponse {
                id: s.id.to_vec(),
                height: s.height,
                bytes: s.bytes,
                err: 0,
            },
            (0, None) => GetOngoingSyncStateSummaryResponse {
                err: WireCode::NotFound.as_u32(),
                ..Default::default()
            },
            (err, _) => GetOngoingSyncStateSummaryResponse {
                err,
                ..Default::default()
            },
        };
        Ok(Response::new(resp))
    }

    async fn get_last_state_summary(
        &self,
        _request: Request<()>,
    ) -> Result<Response<GetLastStateSummaryResponse>, Status> {
        let script = self.record("GetLastStateSummary").await;
        let resp = match (script.summary_err, script.summary) {
            (0, Some(s)) => GetLastStateSummaryResponse {
                id: s.id.to_vec(),
                height: s.height,
                bytes: s.bytes,
                err: 0,
            },
            (0, None) => GetLastStateSummaryResponse {
                err: WireCode::NotFound.as_u32(),
                ..Default::default()
            },
            (err, _) => GetLastStateSummaryResponse {
                err,
                ..Default::default()
            },
        };
        Ok(Response::new(resp))
    }

    async fn parse_state_summary(
        &self,
        request: Request<ParseStateSummaryRequest>,
    ) -> Result<Response<ParseStateSummaryResponse>, Status> {
        let script = self.record("ParseStateSummary").await;
        let bytes = request.into_inner().bytes;
        let resp = match script.summary {
            Some(s) if script.summary_err == 0 && s.bytes == bytes => ParseStateSummaryResponse {
                id: s.id.to_vec(),
                height: s.height,
                err: 0,
            },
            _ if script.summary_err != 0 => ParseStateSummaryResponse {
                err: script.summary_err,
                ..Default::default()
            },
            _ => return Err(Status::invalid_argument("unparseable summary")),
        };
        Ok(Response::new(resp))
    }

    async fn get_state_summary(
        &self,
        request: Request<GetStateSummaryRequest>,
    ) -> Result<Response<GetStateSummaryResponse>, Status> {
        let script = self.record("GetStateSummary").await;
        let height = request.into_inner().height;
        let resp = match script.summary {
            Some(s) if script.summary_err == 0 && s.height == height => GetStateSummaryResponse {
                id: s.id.to_vec(),
                bytes: s.bytes,
                err: 0,
            },
            _ if script.summary_err != 0 => GetStateSummaryResponse {
                err: script.summary_err,
                ..Default::default()
            },
            _ => GetStateSummaryResponse {
                err: WireCode::NotFound.as_u32(),
                ..Default::default()
            },
        };
        Ok(Response::new(resp))
    }

    async fn state_summary_accept(
        &self,
        _request: Request<StateSummaryAcceptRequest>,
    ) -> Result<Response<StateSummaryAcceptResponse>, Status> {
        let script = self.record("StateSummaryAccept").await;
        Ok(Response::new(StateSummaryAcceptResponse {
            accepted: script.summary_accepted,
            err: script.summary_accept_err,
        }))
    }
}

/// Answers every request with its own body and the handler prefix in `x-handler`.
struct EchoHttp {
    prefix: String,
}

#[tonic::async_trait]
impl Http for EchoHttp {
    async fn handle_simple(
        &self,
        request: Request<HandleSimpleHttpRequest>,
    ) -> Result<Response<HandleSimpleHttpResponse>, Status> {
        let mut req = request.into_inner();
        req.headers.push(plugvm_ipc::ghttp::Element {
            key: "x-handler".to_string(),
            values: vec![self.prefix.clone()],
        });
        Ok(Response::new(HandleSimpleHttpResponse {
            code: 200,
            headers: req.headers,
            body: req.body,
        }))
    }
}
