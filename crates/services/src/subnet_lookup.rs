// Path: crates/services/src/subnet_lookup.rs
//! `subnetlookup.SubnetLookup`.

use crate::{parse_id, to_status};
use plugvm_api::subsystems::SubnetLookup;
use plugvm_ipc::subnetlookup::{
    subnet_lookup_server::SubnetLookup as SubnetLookupService, SubnetIdRequest, SubnetIdResponse,
};
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// `subnetlookup.SubnetLookup`.
pub struct SubnetLookupProxy {
    lookup: Arc<dyn SubnetLookup>,
}

impl SubnetLookupProxy {
    pub fn new(lookup: Arc<dyn SubnetLookup>) -> Self {
        Self { lookup }
    }
}

#[tonic::async_trait]
impl SubnetLookupService for SubnetLookupProxy {
    async fn subnet_id(
        &self,
        request: Request<SubnetIdRequest>,
    ) -> Result<Response<SubnetIdResponse>, Status> {
        let chain_id = parse_id(&request.into_inner().chain_id)?;
        let id = self.lookup.subnet_id(chain_id).map_err(to_status)?;
        Ok(Response::new(SubnetIdResponse { id: id.to_vec() }))
    }
}
