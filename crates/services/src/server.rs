// Path: crates/services/src/server.rs
//! Hosting the proxies on loopback listeners for the plugin to dial.
//!
//! Every server carries the standard gRPC health service (overall status
//! `SERVING`) and the metrics layer, and is tracked by the caller's
//! [`ServerCloser`].

use crate::{
    AliasReaderProxy, AppSenderProxy, DatabaseProxy, KeystoreProxy, MessengerProxy,
    SharedMemoryProxy, SubnetLookupProxy, ValidatorStateProxy,
};
use plugvm_api::database::Database;
use plugvm_ipc::aliasreader::alias_reader_server::AliasReaderServer;
use plugvm_ipc::appsender::app_sender_server::AppSenderServer;
use plugvm_ipc::grpcutils::{incoming, new_listener, ServerCloser};
use plugvm_ipc::keystore::keystore_server::KeystoreServer;
use plugvm_ipc::messenger::messenger_server::MessengerServer;
use plugvm_ipc::rpcdb::database_server::DatabaseServer;
use plugvm_ipc::sharedmemory::shared_memory_server::SharedMemoryServer;
use plugvm_ipc::subnetlookup::subnet_lookup_server::SubnetLookupServer;
use plugvm_ipc::validatorstate::validator_state_server::ValidatorStateServer;
use plugvm_telemetry::GrpcMetricsLayer;
use plugvm_types::VmError;
use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tonic_health::ServingStatus;

/// The seven callback proxies served together to one plugin.
#[derive(Clone)]
pub struct VmServices {
    pub messenger: Arc<MessengerProxy>,
    pub keystore: Arc<KeystoreProxy>,
    pub shared_memory: Arc<SharedMemoryProxy>,
    pub bc_lookup: Arc<AliasReaderProxy>,
    pub sn_lookup: Arc<SubnetLookupProxy>,
    pub app_sender: Arc<AppSenderProxy>,
    pub validator_state: Arc<ValidatorStateProxy>,
}

/// Serves `db` on a fresh loopback listener and returns its address.
pub async fn serve_database(
    closer: &ServerCloser,
    db: Arc<dyn Database>,
    metrics: GrpcMetricsLayer,
) -> Result<SocketAddr, VmError> {
    let listener = new_listener().await?;
    let addr = listener.local_addr()?;
    let (mut health, health_service) = tonic_health::server::health_reporter();
    // The empty service name is the server's overall status.
    health.set_service_status("", ServingStatus::Serving).await;
    let router = Server::builder()
        .layer(metrics)
        .add_service(health_service)
        .add_service(DatabaseServer::new(DatabaseProxy::new(db)));
    closer.spawn("database", move |stop| {
        router.serve_with_incoming_shutdown(incoming(listener), async move {
            let _ = stop.await;
        })
    });
    Ok(addr)
}

/// Serves all callback proxies on one fresh loopback listener and returns its address.
pub async fn serve_vm_services(
    closer: &ServerCloser,
    services: VmServices,
    metrics: GrpcMetricsLayer,
) -> Result<SocketAddr, VmError> {
    let listener = new_listener().await?;
    let addr = listener.local_addr()?;
    let (mut health, health_service) = tonic_health::server::health_reporter();
    health.set_service_status("", ServingStatus::Serving).await;
    let router = Server::builder()
        .layer(metrics)
        .add_service(health_service)
        .add_service(MessengerServer::from_arc(services.messenger))
        .add_service(KeystoreServer::from_arc(services.keystore))
        .add_service(SharedMemoryServer::from_arc(services.shared_memory))
        .add_service(AliasReaderServer::from_arc(services.bc_lookup))
        .add_service(SubnetLookupServer::from_arc(services.sn_lookup))
        .add_service(AppSenderServer::from_arc(services.app_sender))
        .add_service(ValidatorStateServer::from_arc(services.validator_state));
    closer.spawn("vm services", move |stop| {
        router.serve_with_incoming_shutdown(incoming(listener), async move {
            let _ = stop.await;
        })
    });
    Ok(addr)
}
