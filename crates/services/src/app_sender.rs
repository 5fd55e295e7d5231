// Path: crates/services/src/app_sender.rs
//! `appsender.AppSender`: outbound application messages from the plugin.

use crate::{parse_id, parse_node_id, to_status};
use plugvm_api::subsystems::AppSender;
use plugvm_ipc::appsender::{
    app_sender_server::AppSender as AppSenderService, SendAppGossipMsg, SendAppGossipSpecificMsg,
    SendAppRequestMsg, SendAppResponseMsg, SendCrossChainAppRequestMsg,
    SendCrossChainAppResponseMsg,
};
use plugvm_types::NodeId;
use std::collections::BTreeSet;
use std::sync::Arc;
use tonic::{Request, Response, Status};

fn parse_node_ids(raw: &[Vec<u8>]) -> Result<BTreeSet<NodeId>, Status> {
    raw.iter().map(|b| parse_node_id(b)).collect()
}

/// `appsender.AppSender`, letting the plugin put messages on the network.
pub struct AppSenderProxy {
    sender: Arc<dyn AppSender>,
}

impl AppSenderProxy {
    pub fn new(sender: Arc<dyn AppSender>) -> Self {
        Self { sender }
    }
}

#[tonic::async_trait]
impl AppSenderService for AppSenderProxy {
    async fn send_app_request(
        &self,
        request: Request<SendAppRequestMsg>,
    ) -> Result<Response<()>, Status> {
        let req = request.into_inner();
        let node_ids = parse_node_ids(&req.node_ids)?;
        self.sender
            .send_app_request(node_ids, req.request_id, req.request)
            .await
            .map_err(to_status)?;
        Ok(Response::new(()))
    }

    async fn send_app_response(
        &self,
        request: Request<SendAppResponseMsg>,
    ) -> Result<Response<()>, Status> {
        let req = request.into_inner();
        let node_id = parse_node_id(&req.node_id)?;
        self.sender
            .send_app_response(node_id, req.request_id, req.response)
            .await
            .map_err(to_status)?;
        Ok(Response::new(()))
    }

    async fn send_app_gossip(
        &self,
        request: Request<SendAppGossipMsg>,
    ) -> Result<Response<()>, Status> {
        self.sender
            .send_app_gossip(request.into_inner().msg)
            .await
            .map_err(to_status)?;
        Ok(Response::new(()))
    }

    async fn send_app_gossip_specific(
        &self,
        request: Request<SendAppGossipSpecificMsg>,
    ) -> Result<Response<()>, Status> {
        let req = request.into_inner();
        let node_ids = parse_node_ids(&req.node_ids)?;
        self.sender
            .send_app_gossip_specific(node_ids, req.msg)
            .await
            .map_err(to_status)?;
        Ok(Response::new(()))
    }

    async fn send_cross_chain_app_request(
        &self,
        request: Request<SendCrossChainAppRequestMsg>,
    ) -> Result<Response<()>, Status> {
        let req = request.into_inner();
        let chain_id = parse_id(&req.chain_id)?;
        self.sender
            .send_cross_chain_app_request(chain_id, req.request_id, req.request)
            .await
            .map_err(to_status)?;
        Ok(Response::new(()))
    }

    async fn send_cross_chain_app_response(
        &self,
        request: Request<SendCrossChainAppResponseMsg>,
    ) -> Result<Response<()>, Status> {
        let req = request.into_inner();
        let chain_id = parse_id(&req.chain_id)?;
        self.sender
            .send_cross_chain_app_response(chain_id, req.request_id, req.response)
            .await
            .map_err(to_status)?;
        Ok(Response::new(()))
    }
}
