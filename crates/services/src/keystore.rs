// Path: crates/services/src/keystore.rs
//! `keystore.Keystore`: per-user databases served on demand.

use crate::server::serve_database;
use crate::to_status;
use plugvm_api::subsystems::Keystore;
use plugvm_ipc::grpcutils::ServerCloser;
use plugvm_ipc::keystore::{
    keystore_server::Keystore as KeystoreService, GetDatabaseRequest, GetDatabaseResponse,
};
use plugvm_telemetry::GrpcMetricsLayer;
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// `keystore.Keystore`. Each unlocked user database is served on its own
/// listener, stopped together with the adapter's other servers.
pub struct KeystoreProxy {
    keystore: Arc<dyn Keystore>,
    closer: Arc<ServerCloser>,
    metrics: GrpcMetricsLayer,
}

impl KeystoreProxy {
    pub fn new(
        keystore: Arc<dyn Keystore>,
        closer: Arc<ServerCloser>,
        metrics: GrpcMetricsLayer,
    ) -> Self {
        Self {
            keystore,
            closer,
            metrics,
        }
    }
}

#[tonic::async_trait]
impl KeystoreService for KeystoreProxy {
    async fn get_database(
        &self,
        request: Request<GetDatabaseRequest>,
    ) -> Result<Response<GetDatabaseResponse>, Status> {
        let req = request.into_inner();
        let db = self
            .keystore
            .get_database(&req.username, &req.password)
            .map_err(to_status)?;
        let addr = serve_database(&self.closer, db, self.metrics.clone())
            .await
            .map_err(to_status)?;
        log::debug!("serving keystore database for {} at {}", req.username, addr);
        Ok(Response::new(GetDatabaseResponse {
            server_addr: addr.to_string(),
        }))
    }
}
