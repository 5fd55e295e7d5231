// Path: crates/services/src/messenger.rs
//! `messenger.Messenger`: engine notifications from the plugin.

use plugvm_ipc::messenger::{
    messenger_server::Messenger as MessengerService, NotifyRequest, NotifyResponse,
};
use plugvm_types::EngineMessage;
use tokio::sync::mpsc::{self, error::TrySendError};
use tonic::{Request, Response, Status};

/// `messenger.Messenger`, relaying plugin notifications to the engine outbox.
///
/// Notifications are level-triggered hints, so a full outbox drops the new one
/// instead of blocking the plugin.
#[derive(Debug, Clone)]
pub struct MessengerProxy {
    outbox: mpsc::Sender<EngineMessage>,
}

impl MessengerProxy {
    pub fn new(outbox: mpsc::Sender<EngineMessage>) -> Self {
        Self { outbox }
    }
}

#[tonic::async_trait]
impl MessengerService for MessengerProxy {
    async fn notify(
        &self,
        request: Request<NotifyRequest>,
    ) -> Result<Response<NotifyResponse>, Status> {
        let raw = request.into_inner().message;
        let msg = EngineMessage::try_from(raw)
            .map_err(|m| Status::invalid_argument(format!("unknown engine message {}", m)))?;
        match self.outbox.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::debug!("dropping engine message {:?}: outbox full", msg);
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("dropping engine message {:?}: outbox closed", msg);
            }
        }
        Ok(Response::new(NotifyResponse {}))
    }
}
