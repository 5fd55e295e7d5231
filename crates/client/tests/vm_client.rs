// Path: crates/client/tests/vm_client.rs
//! End-to-end tests of the adapter against the mock plugin over real gRPC.

use bytes::Bytes;
use plugvm_api::database::{MemDb, StaticDatabaseManager, VersionedDatabase};
use plugvm_api::prelude::*;
use plugvm_api::vm::Fx;
use plugvm_client::{VmClient, VmClientConfig};
use plugvm_ipc::grpcutils::dial;
use plugvm_ipc::vm::{Counter, Metric, MetricFamily, MetricType};
use plugvm_telemetry::Gatherer;
use plugvm_test_utils::fixtures::{id, node_id, test_context, ContextMocks};
use plugvm_test_utils::mocks::{MockProcess, RecordingTracker};
use plugvm_test_utils::plugin::{BlockFixture, MockPlugin, PluginScript, SummaryFixture};
use plugvm_test_utils::{assert_ok, assert_vm_err};
use plugvm_types::{EngineMessage, EngineState, Id, LockOption, Status, VmError};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tokio::sync::mpsc;

struct Harness {
    plugin: Arc<MockPlugin>,
    client: VmClient,
    mocks: ContextMocks,
    db: Arc<MemDb>,
    outbox: mpsc::Receiver<EngineMessage>,
}

impl Harness {
    async fn stop(self) {
        let _ = self.client.shutdown().await;
        self.plugin.stop().await;
    }
}

fn params(
    mocks: &ContextMocks,
    ctx: ChainContext,
    db: Arc<MemDb>,
) -> (InitializeParams, mpsc::Receiver<EngineMessage>) {
    let (tx, rx) = mpsc::channel(8);
    let params = InitializeParams {
        context: ctx,
        db_manager: Arc::new(StaticDatabaseManager::new(vec![VersionedDatabase {
            version: "v1.0.0".to_string(),
            db,
        }])),
        genesis_bytes: b"genesis".to_vec(),
        upgrade_bytes: Vec::new(),
        config_bytes: b"{}".to_vec(),
        to_engine: tx,
        fxs: Vec::new(),
        app_sender: mocks.app_sender.clone(),
    };
    (params, rx)
}

async fn connect(script: PluginScript, config: VmClientConfig) -> (Arc<MockPlugin>, VmClient) {
    let plugin = MockPlugin::new(script);
    let addr = plugin.serve().await.unwrap();
    let client = VmClient::new(dial(&addr.to_string()).unwrap(), config);
    (plugin, client)
}

async fn start_with(script: PluginScript, config: VmClientConfig) -> Harness {
    let (plugin, mut client) = connect(script, config).await;
    let (ctx, mocks) = test_context();
    let db = Arc::new(MemDb::new());
    let (params, outbox) = params(&mocks, ctx, db.clone());
    assert_ok!(client.initialize(params).await);
    Harness {
        plugin,
        client,
        mocks,
        db,
        outbox,
    }
}

async fn start(script: PluginScript) -> Harness {
    start_with(script, VmClientConfig::default()).await
}

fn count(plugin: &MockPlugin, method: &str) -> usize {
    plugin.calls.lock().iter().filter(|c| *c == method).count()
}

#[tokio::test]
async fn initialize_echoes_context_and_serves_callbacks() {
    let script = PluginScript {
        metric_families: vec![MetricFamily {
            name: "mock_requests".into(),
            help: "requests seen by the mock".into(),
            metric_type: MetricType::Counter as i32,
            metric: vec![Metric {
                counter: Some(Counter { value: 1.0 }),
                ..Default::default()
            }],
        }],
        ..Default::default()
    };
    let last = script.last_accepted.clone();
    let mut h = start(script).await;

    let req = h.plugin.initialize_requests.lock()[0].clone();
    assert_eq!(req.network_id, 12345);
    assert_eq!(req.subnet_id, id(1).to_vec());
    assert_eq!(req.chain_id, id(2).to_vec());
    assert_eq!(req.node_id, node_id(3).to_vec());
    assert_eq!(req.x_chain_id, id(4).to_vec());
    assert_eq!(req.primary_asset_id, id(5).to_vec());
    assert_eq!(req.genesis_bytes, b"genesis".to_vec());
    assert_eq!(req.db_servers.len(), 1);
    assert_eq!(req.db_servers[0].version, "v1.0.0");

    // The plugin wrote through the database proxy and notified through the messenger.
    assert_eq!(h.db.get(b"initialized").unwrap(), id(2).to_vec());
    let msg = tokio::time::timeout(Duration::from_secs(5), h.outbox.recv())
        .await
        .unwrap();
    assert_eq!(msg, Some(EngineMessage::PendingTxs));

    assert_eq!(h.client.last_accepted().await.unwrap(), last.id);
    let blk = h.client.get_block(last.id).await.unwrap();
    assert_eq!(blk.status(), Status::Accepted);
    assert_eq!(blk.height(), last.height);
    assert_eq!(blk.timestamp(), last.timestamp);
    assert_eq!(count(&h.plugin, "GetBlock"), 0);

    assert_eq!(h.mocks.metrics.count(), 1);
    let families = h.mocks.metrics.first().unwrap().gather().await.unwrap();
    let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
    assert!(names.contains(&"mock_requests"));
    assert!(names.contains(&"rpcchainvm_grpc_server_started_total"));
    assert!(h.client.running_servers() >= 2);

    h.stop().await;
}

#[tokio::test]
async fn feature_extensions_are_refused() {
    let (plugin, mut client) = connect(PluginScript::default(), VmClientConfig::default()).await;
    let (ctx, mocks) = test_context();
    let (mut params, _outbox) = params(&mocks, ctx, Arc::new(MemDb::new()));
    params.fxs.push(Fx { id: id(7) });

    assert_vm_err!(
        client.initialize(params).await,
        VmError::UnsupportedFeatureExtensions
    );
    assert!(!plugin.called("Initialize"));
    assert_eq!(client.running_servers(), 0);
    plugin.stop().await;
}

#[tokio::test]
async fn failed_initialize_stops_local_servers() {
    let script = PluginScript {
        fail_initialize: true,
        ..Default::default()
    };
    let (plugin, mut client) = connect(script, VmClientConfig::default()).await;
    let (ctx, mocks) = test_context();
    let (params, _outbox) = params(&mocks, ctx, Arc::new(MemDb::new()));

    assert_vm_err!(client.initialize(params).await, VmError::Transport(_));
    assert_eq!(client.running_servers(), 0);
    assert_eq!(mocks.metrics.count(), 0);
    assert_eq!(
        client.last_accepted().await.unwrap_err(),
        VmError::NotInitialized
    );
    plugin.stop().await;
}

#[tokio::test]
async fn parse_block_keeps_input_bytes_and_caches() {
    let x = Id([0xaa; 32]);
    let y = Id([0xbb; 32]);
    let b = b"block B".to_vec();
    let fixture = BlockFixture {
        id: x,
        parent: y,
        bytes: b.clone(),
        status: Status::Accepted,
        height: 7,
        timestamp: UNIX_EPOCH + Duration::from_secs(99),
    };
    let h = start(PluginScript {
        blocks: vec![fixture],
        ..Default::default()
    })
    .await;

    let blk = h.client.parse_block(&b).await.unwrap();
    assert_eq!(blk.bytes(), b.as_slice());
    assert_eq!(blk.status(), Status::Accepted);
    assert_eq!(blk.height(), 7);
    assert_eq!(blk.id(), x);
    assert_eq!(blk.parent(), y);

    let again = h.client.parse_block(&b).await.unwrap();
    assert_eq!(again.id(), x);
    assert_eq!(count(&h.plugin, "ParseBlock"), 1);

    h.stop().await;
}

#[tokio::test]
async fn invalid_status_fails_parse() {
    let fixture = BlockFixture::new(3, id(9), 1);
    let bytes = fixture.bytes.clone();
    let h = start(PluginScript {
        blocks: vec![fixture],
        parse_status_override: Some(8),
        ..Default::default()
    })
    .await;

    let err = h.client.parse_block(&bytes).await.unwrap_err();
    assert_eq!(err, VmError::InvalidStatus(8));
    h.stop().await;
}

#[tokio::test]
async fn build_verify_accept() {
    let built = BlockFixture::new(4, id(9), 1);
    let verified_at = UNIX_EPOCH + Duration::from_secs(1_800_000_000);
    let h = start(PluginScript {
        next_built: Some(built.clone()),
        verify_timestamp: Some(verified_at),
        ..Default::default()
    })
    .await;

    let blk = h.client.build_block().await.unwrap();
    assert_eq!(blk.status(), Status::Processing);
    assert_eq!(blk.bytes(), built.bytes.as_slice());
    assert_eq!(blk.timestamp(), built.timestamp);

    blk.verify().await.unwrap();
    assert_eq!(blk.timestamp(), verified_at);
    assert_eq!(blk.status(), Status::Processing);

    blk.accept().await.unwrap();
    assert_eq!(blk.status(), Status::Accepted);
    assert_eq!(*h.plugin.accepted.lock(), vec![built.id]);
    assert_eq!(h.client.last_accepted().await.unwrap(), built.id);

    h.stop().await;
}

#[tokio::test]
async fn reject_is_forwarded() {
    let fixture = BlockFixture::new(5, id(9), 1);
    let h = start(PluginScript {
        blocks: vec![fixture.clone()],
        ..Default::default()
    })
    .await;

    let blk = h.client.get_block(fixture.id).await.unwrap();
    assert_eq!(blk.bytes(), fixture.bytes.as_slice());
    blk.reject().await.unwrap();
    assert_eq!(blk.status(), Status::Rejected);
    assert_eq!(*h.plugin.rejected.lock(), vec![fixture.id]);
    h.stop().await;
}

#[tokio::test]
async fn unknown_block_is_not_found_and_remembered() {
    let h = start(PluginScript::default()).await;

    let missing = Id([0x42; 32]);
    assert_eq!(h.client.get_block(missing).await.unwrap_err(), VmError::NotFound);
    assert_eq!(h.client.get_block(missing).await.unwrap_err(), VmError::NotFound);
    assert_eq!(count(&h.plugin, "GetBlock"), 1);
    h.stop().await;
}

#[tokio::test]
async fn batched_parse_pairs_input_bytes_by_position() {
    let a = BlockFixture::new(6, id(9), 1);
    let b = BlockFixture::new(7, a.id, 2);
    let h = start(PluginScript {
        blocks: vec![a.clone(), b.clone()],
        ..Default::default()
    })
    .await;

    let input = vec![b.bytes.clone(), a.bytes.clone()];
    let blocks = h.client.batched_parse_block(&input).await.unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].id(), b.id);
    assert_eq!(blocks[0].bytes(), b.bytes.as_slice());
    assert_eq!(blocks[1].id(), a.id);
    assert_eq!(blocks[1].height(), 1);

    h.plugin.script.lock().batched_response_len = Some(1);
    let err = h.client.batched_parse_block(&input).await.unwrap_err();
    assert_eq!(err, VmError::BatchCountMismatch { expected: 2, got: 1 });
    h.stop().await;
}

#[tokio::test]
async fn ancestors_pass_through_in_plugin_order() {
    let h = start(PluginScript {
        ancestors: vec![b"c".to_vec(), b"a".to_vec(), b"b".to_vec()],
        ..Default::default()
    })
    .await;
    let out = h
        .client
        .get_ancestors(id(9), 10, 1 << 20, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(out, vec![b"c".to_vec(), b"a".to_vec(), b"b".to_vec()]);
    h.stop().await;
}

#[tokio::test]
async fn state_sync_not_implemented_is_soft_only_for_enabled() {
    let h = start(PluginScript {
        state_sync_err: 5,
        summary_err: 5,
        ..Default::default()
    })
    .await;

    assert!(!h.client.state_sync_enabled().await.unwrap());
    assert_eq!(
        h.client.get_last_state_summary().await.unwrap_err(),
        VmError::StateSyncNotImplemented
    );
    assert_eq!(
        h.client.get_ongoing_sync_state_summary().await.unwrap_err(),
        VmError::StateSyncNotImplemented
    );

    h.plugin.script.lock().state_sync_err = 1;
    assert_eq!(
        h.client.state_sync_enabled().await.unwrap_err(),
        VmError::Closed
    );

    {
        let mut script = h.plugin.script.lock();
        script.state_sync_err = 0;
        script.state_sync_enabled = true;
    }
    assert!(h.client.state_sync_enabled().await.unwrap());
    h.stop().await;
}

#[tokio::test]
async fn unknown_codes_are_hard_failures() {
    let h = start(PluginScript {
        state_sync_err: 77,
        ..Default::default()
    })
    .await;
    assert_eq!(
        h.client.state_sync_enabled().await.unwrap_err(),
        VmError::UnknownCode(77)
    );
    h.stop().await;
}

#[tokio::test]
async fn summaries_round_trip() {
    let summary = SummaryFixture {
        id: Id([0x33; 32]),
        height: 100,
        bytes: b"summary".to_vec(),
    };
    let h = start(PluginScript {
        summary: Some(summary.clone()),
        summary_accepted: true,
        ..Default::default()
    })
    .await;

    let s = h.client.get_state_summary(100).await.unwrap();
    assert_eq!(s.id(), summary.id);
    assert_eq!(s.height(), 100);
    assert_eq!(s.bytes(), summary.bytes.as_slice());
    assert!(s.accept().await.unwrap());

    let parsed = h.client.parse_state_summary(&summary.bytes).await.unwrap();
    assert_eq!(parsed.bytes(), summary.bytes.as_slice());
    assert_eq!(parsed.height(), 100);

    assert_eq!(
        h.client.get_state_summary(5).await.unwrap_err(),
        VmError::NotFound
    );

    // An error code wins over a populated acceptance flag.
    h.plugin.script.lock().summary_accept_err = 2;
    assert_eq!(s.accept().await.unwrap_err(), VmError::NotFound);
    h.stop().await;
}

#[tokio::test]
async fn height_index_not_implemented_is_a_status() {
    let h = start(PluginScript {
        height_index_err: 3,
        ..Default::default()
    })
    .await;
    assert_eq!(
        h.client.verify_height_index().await.unwrap(),
        HeightIndexStatus::NotImplemented
    );
    assert_eq!(
        h.client.get_block_id_at_height(1).await.unwrap_err(),
        VmError::HeightIndexNotImplemented
    );

    {
        let mut script = h.plugin.script.lock();
        script.height_index_err = 0;
        script.block_ids_by_height.insert(1, id(6));
    }
    assert_eq!(
        h.client.verify_height_index().await.unwrap(),
        HeightIndexStatus::Ready
    );
    assert_eq!(h.client.get_block_id_at_height(1).await.unwrap(), id(6));
    assert_eq!(
        h.client.get_block_id_at_height(2).await.unwrap_err(),
        VmError::NotFound
    );

    h.plugin.script.lock().height_index_err = 4;
    assert_eq!(
        h.client.verify_height_index().await.unwrap_err(),
        VmError::HeightIndexIncomplete
    );
    h.stop().await;
}

#[tokio::test]
async fn set_state_replaces_last_accepted() {
    let h = start(PluginScript::default()).await;
    let next = BlockFixture::new(0x20, id(9), 5).with_status(Status::Accepted);
    h.plugin.script.lock().last_accepted = next.clone();

    h.client.set_state(EngineState::NormalOp).await.unwrap();
    assert_eq!(h.client.last_accepted().await.unwrap(), next.id);
    let blk = h.client.get_block(next.id).await.unwrap();
    assert_eq!(blk.height(), 5);
    assert_eq!(count(&h.plugin, "GetBlock"), 0);
    h.stop().await;
}

#[tokio::test]
async fn health_and_version() {
    let h = start(PluginScript {
        health_details: br#"{"database":"ok"}"#.to_vec(),
        ..Default::default()
    })
    .await;

    let health = h.client.health_check().await.unwrap();
    assert_eq!(health["database"], "ok");
    assert_eq!(h.client.version().await.unwrap(), "mockvm/1.0.0");

    h.plugin.script.lock().health_details = Vec::new();
    assert_eq!(h.client.health_check().await.unwrap(), serde_json::Value::Null);

    h.plugin.script.lock().health_details = b"not json".to_vec();
    assert!(matches!(
        h.client.health_check().await,
        Err(VmError::HealthCheck(_))
    ));
    h.stop().await;
}

#[tokio::test]
async fn notifications_pass_through() {
    let h = start(PluginScript::default()).await;
    let deadline = UNIX_EPOCH + Duration::from_secs(2_000_000_000);

    h.client.connected(node_id(8), "mock/1.0").await.unwrap();
    h.client.disconnected(node_id(8)).await.unwrap();
    h.client.set_preference(id(9)).await.unwrap();
    h.client
        .app_request(node_id(8), 1, deadline, b"req".to_vec())
        .await
        .unwrap();
    h.client.app_request_failed(node_id(8), 1).await.unwrap();
    h.client
        .app_response(node_id(8), 1, b"resp".to_vec())
        .await
        .unwrap();
    h.client.app_gossip(node_id(8), b"gossip".to_vec()).await.unwrap();
    h.client
        .cross_chain_app_request(id(4), 2, deadline, b"req".to_vec())
        .await
        .unwrap();
    h.client.cross_chain_app_request_failed(id(4), 2).await.unwrap();
    h.client
        .cross_chain_app_response(id(4), 2, b"resp".to_vec())
        .await
        .unwrap();

    for method in [
        "Connected",
        "Disconnected",
        "SetPreference",
        "AppRequest",
        "AppRequestFailed",
        "AppResponse",
        "AppGossip",
        "CrossChainAppRequest",
        "CrossChainAppRequestFailed",
        "CrossChainAppResponse",
    ] {
        assert!(h.plugin.called(method), "{} not forwarded", method);
    }
    h.stop().await;
}

#[tokio::test]
async fn handlers_forward_until_shutdown() {
    let h = start(PluginScript {
        handlers: vec![("/rpc".to_string(), LockOption::Read)],
        ..Default::default()
    })
    .await;

    let handlers = h.client.create_handlers().await.unwrap();
    let entry = handlers.get("/rpc").unwrap();
    assert_eq!(entry.lock_option, LockOption::Read);
    assert_eq!(h.client.open_connections(), 1);

    let req = http::Request::builder()
        .method("POST")
        .uri("/rpc")
        .header("content-type", "application/json")
        .body(Bytes::from_static(b"ping"))
        .unwrap();
    let resp = entry.handler.serve(req).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.body().as_ref(), b"ping");
    assert_eq!(resp.headers()["x-handler"], "/rpc");

    let statics = h.client.create_static_handlers().await.unwrap();
    assert!(statics.contains_key("/rpc"));
    assert_eq!(h.client.open_connections(), 2);

    h.client.shutdown().await.unwrap();
    assert_eq!(h.client.open_connections(), 0);
    let req = http::Request::builder()
        .uri("/rpc")
        .body(Bytes::new())
        .unwrap();
    assert!(matches!(
        entry.handler.serve(req).await,
        Err(VmError::Transport(_))
    ));
    h.plugin.stop().await;
}

#[tokio::test]
async fn shutdown_runs_every_step_and_reports_the_first_failure() {
    let h = start(PluginScript {
        fail_shutdown: true,
        ..Default::default()
    })
    .await;
    let tracker = Arc::new(RecordingTracker::default());
    h.client.set_process(Box::new(MockProcess::failing(77)), tracker.clone());
    assert!(tracker.tracked.lock().contains(&77));

    let err = h.client.shutdown().await.unwrap_err();
    assert!(matches!(err, VmError::Transport(_)));
    assert!(h.plugin.called("Shutdown"));
    assert_eq!(h.client.running_servers(), 0);
    assert_eq!(*tracker.untracked.lock(), vec![77]);
    h.plugin.stop().await;
}

#[tokio::test]
async fn clean_shutdown_kills_the_process() {
    let h = start(PluginScript::default()).await;
    let tracker = Arc::new(RecordingTracker::default());
    let process = MockProcess::new(12);
    let killed = process.killed.clone();
    h.client.set_process(Box::new(process), tracker.clone());

    h.client.shutdown().await.unwrap();
    assert!(killed.load(std::sync::atomic::Ordering::SeqCst));
    assert_eq!(*tracker.untracked.lock(), vec![12]);
    h.plugin.stop().await;
}

#[tokio::test]
async fn slow_calls_fail_with_a_transport_error() {
    let config = VmClientConfig::from_toml_str("request_timeout_ms = 200").unwrap();
    let h = start_with(PluginScript::default(), config).await;

    h.plugin.script.lock().delay = Duration::from_secs(2);
    let err = h.client.version().await.unwrap_err();
    assert!(matches!(err, VmError::Transport(_)), "{:?}", err);

    h.plugin.script.lock().delay = Duration::ZERO;
    h.stop().await;
}
