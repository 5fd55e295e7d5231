// Path: crates/client/src/vm.rs
//! The VM adapter.

use crate::block::BlockClient;
use crate::config::VmClientConfig;
use crate::http::{AuxConnection, HttpHandlerClient};
use crate::metrics::PluginGatherer;
use crate::process::TrackedProcess;
use crate::remote::RemoteVm;
use crate::summary::SummaryClient;
use async_trait::async_trait;
use parking_lot::Mutex;
use plugvm_api::block::{Block, StateSummary};
use plugvm_api::http::{HandlerSet, HttpHandlerEntry};
use plugvm_api::process::{PluginProcess, ProcessTracker};
use plugvm_api::vm::{
    AppHandler, BatchedChainVm, ChainVm, CommonVm, HeightIndexStatus, HeightIndexedChainVm,
    InitializeParams, StateSyncableVm,
};
use plugvm_chain::ChainState;
use plugvm_ipc::grpcutils::{
    dial, duration_to_nanos, timestamp_as_time, timestamp_from_time, ServerCloser,
};
use plugvm_ipc::vm::{
    AppGossipMsg, AppRequestFailedMsg, AppRequestMsg, AppResponseMsg, BatchedParseBlockRequest,
    ConnectedRequest, CreateHandlersResponse, CrossChainAppRequestFailedMsg,
    CrossChainAppRequestMsg, CrossChainAppResponseMsg, DisconnectedRequest, GetAncestorsRequest,
    GetBlockIdAtHeightRequest, GetStateSummaryRequest, InitializeRequest, InitializeResponse,
    ParseStateSummaryRequest, SetPreferenceRequest, SetStateRequest, VersionedDbServer,
};
use plugvm_services::{
    serve_database, serve_vm_services, AliasReaderProxy, AppSenderProxy, KeystoreProxy,
    MessengerProxy, SharedMemoryProxy, SubnetLookupProxy, ValidatorStateProxy, VmServices,
};
use plugvm_telemetry::prometheus::{CacheMetrics, GrpcServerMetrics};
use plugvm_telemetry::{GrpcMetricsLayer, MultiGatherer};
use plugvm_types::error::{error_from_code, ErrorCode};
use plugvm_types::{EngineState, Id, LockOption, NodeId, Status, VmError};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tonic::transport::Channel;

/// The namespace the adapter's own metrics are merged under.
pub const METRICS_NAMESPACE: &str = "rpcchainvm";

fn metrics_error(e: prometheus::Error) -> VmError {
    VmError::Metrics(e.to_string())
}

/// Presents a VM running in a plugin process as an in-process [`ChainVm`].
///
/// Created on an already connected channel. [`CommonVm::initialize`] must
/// complete before any block operation, and [`CommonVm::shutdown`] must be
/// called at most once.
pub struct VmClient {
    rpc: RemoteVm,
    config: VmClientConfig,
    process: Mutex<Option<TrackedProcess>>,
    closer: Arc<ServerCloser>,
    services: Option<VmServices>,
    conns: Mutex<Vec<AuxConnection>>,
    state: Option<ChainState>,
}

impl std::fmt::Debug for VmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmClient")
            .field("config", &self.config)
            .field("process", &*self.process.lock())
            .field("servers", &self.closer.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// A last-accepted block as reported by `Initialize` or `SetState`.
struct LastAccepted<'a> {
    id: &'a [u8],
    parent: &'a [u8],
    bytes: Vec<u8>,
    height: u64,
    timestamp: Option<prost_types::Timestamp>,
}

impl VmClient {
    pub fn new(channel: Channel, config: VmClientConfig) -> Self {
        Self {
            rpc: RemoteVm::new(channel, config.request_timeout()),
            config,
            process: Mutex::new(None),
            closer: Arc::new(ServerCloser::new()),
            services: None,
            conns: Mutex::new(Vec::new()),
            state: None,
        }
    }

    /// Takes ownership of the plugin process and registers it with `tracker`.
    ///
    /// Attaching a second process releases the first.
    pub fn set_process(&self, process: Box<dyn PluginProcess>, tracker: Arc<dyn ProcessTracker>) {
        let previous = self
            .process
            .lock()
            .replace(TrackedProcess::new(process, tracker));
        drop(previous);
    }

    /// The raw `vm.VM` connection.
    pub fn remote(&self) -> &RemoteVm {
        &self.rpc
    }

    /// The proxies hosted for the plugin, once initialized.
    pub fn services(&self) -> Option<&VmServices> {
        self.services.as_ref()
    }

    /// Number of locally hosted gRPC servers still running.
    pub fn running_servers(&self) -> usize {
        self.closer.len()
    }

    /// Number of handler connections still open.
    pub fn open_connections(&self) -> usize {
        self.conns.lock().len()
    }

    /// The caching layer, once initialized.
    pub fn chain_state(&self) -> Result<&ChainState, VmError> {
        self.state.as_ref().ok_or(VmError::NotInitialized)
    }

    fn accepted_block(&self, last: LastAccepted<'_>) -> Result<BlockClient, VmError> {
        Ok(BlockClient::new(
            self.rpc.clone(),
            Id::from_slice(last.id)?,
            Id::from_slice(last.parent)?,
            last.bytes,
            last.height,
            Status::Accepted,
            timestamp_as_time(last.timestamp)?,
        ))
    }

    /// Initialization after the metrics are set up. On error the caller stops
    /// every server started here.
    async fn bootstrap(
        &self,
        params: &InitializeParams,
        layer: GrpcMetricsLayer,
        cache_metrics: CacheMetrics,
        gatherer: Arc<MultiGatherer>,
    ) -> Result<(VmServices, ChainState), VmError> {
        let ctx = &params.context;

        let mut db_servers = Vec::new();
        for versioned in params.db_manager.databases() {
            let addr = serve_database(&self.closer, versioned.db.clone(), layer.clone()).await?;
            tracing::info!(
                target: "vm_client",
                version = %versioned.version,
                %addr,
                "serving database"
            );
            db_servers.push(VersionedDbServer {
                server_addr: addr.to_string(),
                version: versioned.version.clone(),
            });
        }

        let services = VmServices {
            messenger: Arc::new(MessengerProxy::new(params.to_engine.clone())),
            keystore: Arc::new(KeystoreProxy::new(
                ctx.keystore.clone(),
                self.closer.clone(),
                layer.clone(),
            )),
            shared_memory: Arc::new(SharedMemoryProxy::new(ctx.shared_memory.clone())),
            bc_lookup: Arc::new(AliasReaderProxy::new(ctx.bc_lookup.clone())),
            sn_lookup: Arc::new(SubnetLookupProxy::new(ctx.sn_lookup.clone())),
            app_sender: Arc::new(AppSenderProxy::new(params.app_sender.clone())),
            validator_state: Arc::new(ValidatorStateProxy::new(ctx.validator_state.clone())),
        };
        let server_addr = serve_vm_services(&self.closer, services.clone(), layer).await?;
        tracing::info!(target: "vm_client", addr = %server_addr, "serving vm services");

        let request = InitializeRequest {
            network_id: ctx.network_id,
            subnet_id: ctx.subnet_id.to_vec(),
            chain_id: ctx.chain_id.to_vec(),
            node_id: ctx.node_id.to_vec(),
            x_chain_id: ctx.x_chain_id.to_vec(),
            primary_asset_id: ctx.primary_asset_id.to_vec(),
            genesis_bytes: params.genesis_bytes.clone(),
            upgrade_bytes: params.upgrade_bytes.clone(),
            config_bytes: params.config_bytes.clone(),
            db_servers,
            server_addr: server_addr.to_string(),
        };
        let resp: InitializeResponse = self
            .rpc
            .call("Initialize", request, |mut c, req| async move {
                c.initialize(req).await
            })
            .await?;

        let last_accepted = self.accepted_block(LastAccepted {
            id: &resp.last_accepted_id,
            parent: &resp.last_accepted_parent_id,
            bytes: resp.bytes,
            height: resp.height,
            timestamp: resp.timestamp,
        })?;
        tracing::info!(
            target: "vm_client",
            last_accepted = %last_accepted.id(),
            height = last_accepted.height(),
            "plugin initialized"
        );

        let state = ChainState::new(
            &self.config.chain,
            Arc::new(self.rpc.clone()),
            Arc::new(last_accepted),
            Arc::new(cache_metrics),
        )?;
        ctx.metrics.register(gatherer)?;
        Ok((services, state))
    }

    async fn handlers(&self, resp: CreateHandlersResponse) -> Result<HandlerSet, VmError> {
        let mut set = HandlerSet::with_capacity(resp.handlers.len());
        for handler in resp.handlers {
            let lock_option = LockOption::try_from(handler.lock_options)?;
            let conn = AuxConnection::new(handler.server_addr.as_str(), dial(&handler.server_addr)?);
            self.conns.lock().push(conn.clone());
            set.insert(
                handler.prefix,
                HttpHandlerEntry {
                    lock_option,
                    handler: Arc::new(HttpHandlerClient::new(conn)),
                },
            );
        }
        Ok(set)
    }
}

#[async_trait]
impl AppHandler for VmClient {
    async fn app_request(
        &self,
        node_id: NodeId,
        request_id: u32,
        deadline: SystemTime,
        request: Vec<u8>,
    ) -> Result<(), VmError> {
        let msg = AppRequestMsg {
            node_id: node_id.to_vec(),
            request_id,
            deadline: Some(timestamp_from_time(deadline)),
            request,
        };
        self.rpc
            .call("AppRequest", msg, |mut c, req| async move { c.app_request(req).await })
            .await
    }

    async fn app_request_failed(&self, node_id: NodeId, request_id: u32) -> Result<(), VmError> {
        let msg = AppRequestFailedMsg {
            node_id: node_id.to_vec(),
            request_id,
        };
        self.rpc
            .call("AppRequestFailed", msg, |mut c, req| async move {
                c.app_request_failed(req).await
            })
            .await
    }

    async fn app_response(
        &self,
        node_id: NodeId,
        request_id: u32,
        response: Vec<u8>,
    ) -> Result<(), VmError> {
        let msg = AppResponseMsg {
            node_id: node_id.to_vec(),
            request_id,
            response,
        };
        self.rpc
            .call("AppResponse", msg, |mut c, req| async move { c.app_response(req).await })
            .await
    }

    async fn app_gossip(&self, node_id: NodeId, msg: Vec<u8>) -> Result<(), VmError> {
        let msg = AppGossipMsg {
            node_id: node_id.to_vec(),
            msg,
        };
        self.rpc
            .call("AppGossip", msg, |mut c, req| async move { c.app_gossip(req).await })
            .await
    }

    async fn cross_chain_app_request(
        &self,
        chain_id: Id,
        request_id: u32,
        deadline: SystemTime,
        request: Vec<u8>,
    ) -> Result<(), VmError> {
        let msg = CrossChainAppRequestMsg {
            chain_id: chain_id.to_vec(),
            request_id,
            deadline: Some(timestamp_from_time(deadline)),
            request,
        };
        self.rpc
            .call("CrossChainAppRequest", msg, |mut c, req| async move {
                c.cross_chain_app_request(req).await
            })
            .await
    }

    async fn cross_chain_app_request_failed(
        &self,
        chain_id: Id,
        request_id: u32,
    ) -> Result<(), VmError> {
        let msg = CrossChainAppRequestFailedMsg {
            chain_id: chain_id.to_vec(),
            request_id,
        };
        self.rpc
            .call("CrossChainAppRequestFailed", msg, |mut c, req| async move {
                c.cross_chain_app_request_failed(req).await
            })
            .await
    }

    async fn cross_chain_app_response(
        &self,
        chain_id: Id,
        request_id: u32,
        response: Vec<u8>,
    ) -> Result<(), VmError> {
        let msg = CrossChainAppResponseMsg {
            chain_id: chain_id.to_vec(),
            request_id,
            response,
        };
        self.rpc
            .call("CrossChainAppResponse", msg, |mut c, req| async move {
                c.cross_chain_app_response(req).await
            })
            .await
    }
}

#[async_trait]
impl CommonVm for VmClient {
    async fn initialize(&mut self, params: InitializeParams) -> Result<(), VmError> {
        if !params.fxs.is_empty() {
            return Err(VmError::UnsupportedFeatureExtensions);
        }

        let registry = prometheus::Registry::new();
        let grpc_metrics = GrpcServerMetrics::register(&registry).map_err(metrics_error)?;
        let cache_metrics = CacheMetrics::register(&registry).map_err(metrics_error)?;
        let gatherer = Arc::new(MultiGatherer::new());
        gatherer.register(METRICS_NAMESPACE, Arc::new(registry))?;
        gatherer.register("", Arc::new(PluginGatherer::new(self.rpc.clone())))?;
        let layer = GrpcMetricsLayer::new(Arc::new(grpc_metrics));

        match self.bootstrap(&params, layer, cache_metrics, gatherer).await {
            Ok((services, state)) => {
                self.services = Some(services);
                self.state = Some(state);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    target: "vm_client",
                    error = %e,
                    code = e.code(),
                    "initialize failed, stopping local servers"
                );
                self.closer.stop().await;
                Err(e)
            }
        }
    }

    async fn set_state(&self, state: EngineState) -> Result<(), VmError> {
        let chain = self.chain_state()?;
        let resp = self
            .rpc
            .call(
                "SetState",
                SetStateRequest {
                    state: u32::from(state),
                },
                |mut c, req| async move { c.set_state(req).await },
            )
            .await?;
        let blk = self.accepted_block(LastAccepted {
            id: &resp.last_accepted_id,
            parent: &resp.last_accepted_parent_id,
            bytes: resp.bytes,
            height: resp.height,
            timestamp: resp.timestamp,
        })?;
        chain.set_last_accepted(Arc::new(blk))
    }

    /// Every teardown step runs even if an earlier one fails; the first error is returned.
    async fn shutdown(&self) -> Result<(), VmError> {
        let mut errs = Vec::new();

        if let Err(e) = self
            .rpc
            .call("Shutdown", (), |mut c, req| async move { c.shutdown(req).await })
            .await
        {
            errs.push(e);
        }

        self.closer.stop().await;

        let conns = std::mem::take(&mut *self.conns.lock());
        for conn in conns {
            conn.close();
        }

        let process = self.process.lock().take();
        if let Some(mut process) = process {
            if let Err(e) = process.release() {
                errs.push(e);
            }
        }

        let mut errs = errs.into_iter();
        match errs.next() {
            None => Ok(()),
            Some(first) => {
                for e in errs {
                    tracing::warn!(target: "vm_client", error = %e, code = e.code(), "additional shutdown failure");
                }
                tracing::warn!(target: "vm_client", error = %first, code = first.code(), "shutdown failed");
                Err(first)
            }
        }
    }

    async fn version(&self) -> Result<String, VmError> {
        let resp = self
            .rpc
            .call("Version", (), |mut c, req| async move { c.version(req).await })
            .await?;
        Ok(resp.version)
    }

    async fn create_static_handlers(&self) -> Result<HandlerSet, VmError> {
        let resp = self
            .rpc
            .call("CreateStaticHandlers", (), |mut c, req| async move {
                c.create_static_handlers(req).await
            })
            .await?;
        self.handlers(resp).await
    }

    async fn create_handlers(&self) -> Result<HandlerSet, VmError> {
        let resp = self
            .rpc
            .call("CreateHandlers", (), |mut c, req| async move {
                c.create_handlers(req).await
            })
            .await?;
        self.handlers(resp).await
    }

    async fn connected(&self, node_id: NodeId, version: &str) -> Result<(), VmError> {
        let msg = ConnectedRequest {
            node_id: node_id.to_vec(),
            version: version.to_string(),
        };
        self.rpc
            .call("Connected", msg, |mut c, req| async move { c.connected(req).await })
            .await
    }

    async fn disconnected(&self, node_id: NodeId) -> Result<(), VmError> {
        let msg = DisconnectedRequest {
            node_id: node_id.to_vec(),
        };
        self.rpc
            .call("Disconnected", msg, |mut c, req| async move {
                c.disconnected(req).await
            })
            .await
    }

    /// The plugin's health details as JSON; an empty report is `null`.
    async fn health_check(&self) -> Result<serde_json::Value, VmError> {
        let resp = self
            .rpc
            .call("Health", (), |mut c, req| async move { c.health(req).await })
            .await
            .map_err(|e| VmError::HealthCheck(e.to_string()))?;
        if resp.details.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(&resp.details)
            .map_err(|e| VmError::HealthCheck(format!("invalid health details: {}", e)))
    }
}

#[async_trait]
impl ChainVm for VmClient {
    async fn build_block(&self) -> Result<Arc<dyn Block>, VmError> {
        self.chain_state()?.build_block().await
    }

    async fn parse_block(&self, bytes: &[u8]) -> Result<Arc<dyn Block>, VmError> {
        self.chain_state()?.parse_block(bytes).await
    }

    async fn get_block(&self, id: Id) -> Result<Arc<dyn Block>, VmError> {
        self.chain_state()?.get_block(id).await
    }

    async fn set_preference(&self, id: Id) -> Result<(), VmError> {
        self.rpc
            .call(
                "SetPreference",
                SetPreferenceRequest { id: id.to_vec() },
                |mut c, req| async move { c.set_preference(req).await },
            )
            .await
    }

    async fn last_accepted(&self) -> Result<Id, VmError> {
        Ok(self.chain_state()?.last_accepted())
    }
}

#[async_trait]
impl BatchedChainVm for VmClient {
    /// Blocks come back in whatever order the plugin chose.
    async fn get_ancestors(
        &self,
        blk_id: Id,
        max_blocks_num: usize,
        max_blocks_size: usize,
        max_retrieval_time: Duration,
    ) -> Result<Vec<Vec<u8>>, VmError> {
        let msg = GetAncestorsRequest {
            blk_id: blk_id.to_vec(),
            max_blocks_num: i32::try_from(max_blocks_num).unwrap_or(i32::MAX),
            max_blocks_size: i32::try_from(max_blocks_size).unwrap_or(i32::MAX),
            max_blocks_retrieval_time: duration_to_nanos(max_retrieval_time),
        };
        let resp = self
            .rpc
            .call("GetAncestors", msg, |mut c, req| async move {
                c.get_ancestors(req).await
            })
            .await?;
        Ok(resp.blks_bytes)
    }

    /// Parses in one round trip. The returned blocks bypass the cache.
    async fn batched_parse_block(&self, blks: &[Vec<u8>]) -> Result<Vec<Arc<dyn Block>>, VmError> {
        let msg = BatchedParseBlockRequest {
            request: blks.to_vec(),
        };
        let resp = self
            .rpc
            .call("BatchedParseBlock", msg, |mut c, req| async move {
                c.batched_parse_block(req).await
            })
            .await?;
        if resp.response.len() != blks.len() {
            return Err(VmError::BatchCountMismatch {
                expected: blks.len(),
                got: resp.response.len(),
            });
        }
        resp.response
            .into_iter()
            .zip(blks)
            .map(|(meta, bytes)| {
                let blk = BlockClient::from_parse(self.rpc.clone(), bytes.clone(), meta)?;
                Ok(Arc::new(blk) as Arc<dyn Block>)
            })
            .collect()
    }
}

#[async_trait]
impl HeightIndexedChainVm for VmClient {
    async fn verify_height_index(&self) -> Result<HeightIndexStatus, VmError> {
        let resp = self
            .rpc
            .call("VerifyHeightIndex", (), |mut c, req| async move {
                c.verify_height_index(req).await
            })
            .await?;
        match error_from_code(resp.err) {
            Ok(()) => Ok(HeightIndexStatus::Ready),
            Err(VmError::HeightIndexNotImplemented) => Ok(HeightIndexStatus::NotImplemented),
            Err(e) => Err(e),
        }
    }

    async fn get_block_id_at_height(&self, height: u64) -> Result<Id, VmError> {
        let resp = self
            .rpc
            .call(
                "GetBlockIdAtHeight",
                GetBlockIdAtHeightRequest { height },
                |mut c, req| async move { c.get_block_id_at_height(req).await },
            )
            .await?;
        error_from_code(resp.err)?;
        Id::from_slice(&resp.blk_id)
    }
}

#[async_trait]
impl StateSyncableVm for VmClient {
    async fn state_sync_enabled(&self) -> Result<bool, VmError> {
        let resp = self
            .rpc
            .call("StateSyncEnabled", (), |mut c, req| async move {
                c.state_sync_enabled(req).await
            })
            .await?;
        match error_from_code(resp.err) {
            Ok(()) => Ok(resp.enabled),
            Err(VmError::StateSyncNotImplemented) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_ongoing_sync_state_summary(&self) -> Result<Arc<dyn StateSummary>, VmError> {
        let resp = self
            .rpc
            .call("GetOngoingSyncStateSummary", (), |mut c, req| async move {
                c.get_ongoing_sync_state_summary(req).await
            })
            .await?;
        error_from_code(resp.err)?;
        let id = Id::from_slice(&resp.id)?;
        Ok(Arc::new(SummaryClient::new(
            self.rpc.clone(),
            id,
            resp.height,
            resp.bytes,
        )))
    }

    async fn get_last_state_summary(&self) -> Result<Arc<dyn StateSummary>, VmError> {
        let resp = self
            .rpc
            .call("GetLastStateSummary", (), |mut c, req| async move {
                c.get_last_state_summary(req).await
            })
            .await?;
        error_from_code(resp.err)?;
        let id = Id::from_slice(&resp.id)?;
        Ok(Arc::new(SummaryClient::new(
            self.rpc.clone(),
            id,
            resp.height,
            resp.bytes,
        )))
    }

    async fn parse_state_summary(&self, bytes: &[u8]) -> Result<Arc<dyn StateSummary>, VmError> {
        let resp = self
            .rpc
            .call(
                "ParseStateSummary",
                ParseStateSummaryRequest {
                    bytes: bytes.to_vec(),
                },
                |mut c, req| async move { c.parse_state_summary(req).await },
            )
            .await?;
        error_from_code(resp.err)?;
        let id = Id::from_slice(&resp.id)?;
        Ok(Arc::new(SummaryClient::new(
            self.rpc.clone(),
            id,
            resp.height,
            bytes.to_vec(),
        )))
    }

    async fn get_state_summary(&self, height: u64) -> Result<Arc<dyn StateSummary>, VmError> {
        let resp = self
            .rpc
            .call(
                "GetStateSummary",
                GetStateSummaryRequest { height },
                |mut c, req| async move { c.get_state_summary(req).await },
            )
            .await?;
        error_from_code(resp.err)?;
        let id = Id::from_slice(&resp.id)?;
        Ok(Arc::new(SummaryClient::new(
            self.rpc.clone(),
            id,
            height,
            resp.bytes,
        )))
    }
}
