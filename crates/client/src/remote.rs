// Path: crates/client/src/remote.rs
//! The raw connection to the plugin's `vm.VM` service.

use crate::block::BlockClient;
use async_trait::async_trait;
use plugvm_api::block::Block;
use plugvm_chain::BlockSource;
use plugvm_ipc::vm::{vm_client::VmClient as VmGrpcClient, GetBlockRequest, ParseBlockRequest};
use plugvm_types::error::error_from_code;
use plugvm_types::{Id, VmError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Channel;
use tonic::{Request, Response, Status};

/// Every failed RPC is a transport error; protocol errors travel as embedded codes.
pub(crate) fn map_grpc_error(method: &str, status: Status) -> VmError {
    VmError::Transport(format!("{} failed: {}", method, status))
}

/// A cheap, cloneable handle on the plugin's `vm.VM` service.
///
/// Clones share the underlying channel. Handles hold one of these rather than
/// the adapter itself, so they never keep the adapter's servers or process alive.
#[derive(Debug, Clone)]
pub struct RemoteVm {
    client: VmGrpcClient<Channel>,
    timeout: Option<Duration>,
}

impl RemoteVm {
    pub fn new(channel: Channel, timeout: Option<Duration>) -> Self {
        Self {
            client: VmGrpcClient::new(channel),
            timeout,
        }
    }

    /// Issues one RPC.
    ///
    /// The configured timeout is sent to the plugin as the call's deadline and
    /// also enforced locally; expiry is reported as a transport error.
    pub async fn call<M, T, F, Fut>(&self, method: &'static str, msg: M, f: F) -> Result<T, VmError>
    where
        M: Send,
        T: Send,
        F: FnOnce(VmGrpcClient<Channel>, Request<M>) -> Fut + Send,
        Fut: Future<Output = Result<Response<T>, Status>> + Send,
    {
        let mut request = Request::new(msg);
        if let Some(timeout) = self.timeout {
            request.set_timeout(timeout);
        }
        let fut = f(self.client.clone(), request);
        let result = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| VmError::Transport(format!("{} failed: deadline exceeded", method)))?,
            None => fut.await,
        };
        result
            .map(Response::into_inner)
            .map_err(|status| map_grpc_error(method, status))
    }
}

#[async_trait]
impl BlockSource for RemoteVm {
    async fn get_block(&self, id: Id) -> Result<Arc<dyn Block>, VmError> {
        let resp = self
            .call("GetBlock", GetBlockRequest { id: id.to_vec() }, |mut c, req| async move {
                c.get_block(req).await
            })
            .await?;
        error_from_code(resp.err)?;
        let blk = BlockClient::from_get(self.clone(), id, resp)?;
        Ok(Arc::new(blk))
    }

    async fn parse_block(&self, bytes: &[u8]) -> Result<Arc<dyn Block>, VmError> {
        let resp = self
            .call(
                "ParseBlock",
                ParseBlockRequest {
                    bytes: bytes.to_vec(),
                },
                |mut c, req| async move { c.parse_block(req).await },
            )
            .await?;
        let blk = BlockClient::from_parse(self.clone(), bytes.to_vec(), resp)?;
        Ok(Arc::new(blk))
    }

    async fn build_block(&self) -> Result<Arc<dyn Block>, VmError> {
        let resp = self
            .call("BuildBlock", (), |mut c, req| async move {
                c.build_block(req).await
            })
            .await?;
        let blk = BlockClient::from_build(self.clone(), resp)?;
        Ok(Arc::new(blk))
    }
}
