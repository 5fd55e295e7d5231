// Path: crates/services/src/validator_state.rs
//! `validatorstate.ValidatorState`: validator sets by height.

use crate::{parse_id, to_status};
use plugvm_api::subsystems::ValidatorState;
use plugvm_ipc::validatorstate::{
    validator_state_server::ValidatorState as ValidatorStateService, GetCurrentHeightResponse,
    GetMinimumHeightResponse, GetSubnetIdRequest, GetSubnetIdResponse, GetValidatorSetRequest,
    GetValidatorSetResponse, Validator,
};
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// `validatorstate.ValidatorState`.
pub struct ValidatorStateProxy {
    state: Arc<dyn ValidatorState>,
}

impl ValidatorStateProxy {
    pub fn new(state: Arc<dyn ValidatorState>) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl ValidatorStateService for ValidatorStateProxy {
    async fn get_minimum_height(
        &self,
        _request: Request<()>,
    ) -> Result<Response<GetMinimumHeightResponse>, Status> {
        let height = self.state.get_minimum_height().await.map_err(to_status)?;
        Ok(Response::new(GetMinimumHeightResponse { height }))
    }

    async fn get_current_height(
        &self,
        _request: Request<()>,
    ) -> Result<Response<GetCurrentHeightResponse>, Status> {
        let height = self.state.get_current_height().await.map_err(to_status)?;
        Ok(Response::new(GetCurrentHeightResponse { height }))
    }

    async fn get_subnet_id(
        &self,
        request: Request<GetSubnetIdRequest>,
    ) -> Result<Response<GetSubnetIdResponse>, Status> {
        let chain_id = parse_id(&request.into_inner().chain_id)?;
        let subnet_id = self
            .state
            .get_subnet_id(chain_id)
            .await
            .map_err(to_status)?;
        Ok(Response::new(GetSubnetIdResponse {
            subnet_id: subnet_id.to_vec(),
        }))
    }

    async fn get_validator_set(
        &self,
        request: Request<GetValidatorSetRequest>,
    ) -> Result<Response<GetValidatorSetResponse>, Status> {
        let req = request.into_inner();
        let subnet_id = parse_id(&req.subnet_id)?;
        let set = self
            .state
            .get_validator_set(req.height, subnet_id)
            .await
            .map_err(to_status)?;
        let validators = set
            .into_values()
            .map(|v| Validator {
                node_id: v.node_id.to_vec(),
                weight: v.weight,
                public_key: v.public_key.unwrap_or_default(),
            })
            .collect();
        Ok(Response::new(GetValidatorSetResponse { validators }))
    }
}
