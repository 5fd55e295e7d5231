// Path: crates/services/src/alias_reader.rs
//! `aliasreader.AliasReader`: chain alias resolution.

use crate::{parse_id, to_status};
use plugvm_api::subsystems::AliasReader;
use plugvm_ipc::aliasreader::{
    alias_reader_server::AliasReader as AliasReaderService, Alias, AliasList, Id as WireId,
};
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// `aliasreader.AliasReader`, fronting the node's chain-alias registry.
pub struct AliasReaderProxy {
    aliases: Arc<dyn AliasReader>,
}

impl AliasReaderProxy {
    pub fn new(aliases: Arc<dyn AliasReader>) -> Self {
        Self { aliases }
    }
}

#[tonic::async_trait]
impl AliasReaderService for AliasReaderProxy {
    async fn lookup(&self, request: Request<Alias>) -> Result<Response<WireId>, Status> {
        let alias = request.into_inner().alias;
        let id = self.aliases.lookup(&alias).map_err(to_status)?;
        Ok(Response::new(WireId { id: id.to_vec() }))
    }

    async fn primary_alias(&self, request: Request<WireId>) -> Result<Response<Alias>, Status> {
        let id = parse_id(&request.into_inner().id)?;
        let alias = self.aliases.primary_alias(id).map_err(to_status)?;
        Ok(Response::new(Alias { alias }))
    }

    async fn aliases(&self, request: Request<WireId>) -> Result<Response<AliasList>, Status> {
        let id = parse_id(&request.into_inner().id)?;
        let aliases = self.aliases.aliases(id).map_err(to_status)?;
        Ok(Response::new(AliasList { aliases }))
    }
}
