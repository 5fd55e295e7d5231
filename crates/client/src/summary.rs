// Path: crates/client/src/summary.rs
//! Local handles on state summaries held by the plugin.

use crate::remote::RemoteVm;
use async_trait::async_trait;
use plugvm_api::block::StateSummary;
use plugvm_ipc::vm::StateSummaryAcceptRequest;
use plugvm_types::error::error_from_code;
use plugvm_types::{Id, VmError};
use std::fmt;

/// A state summary offered by the plugin.
pub struct SummaryClient {
    vm: RemoteVm,
    id: Id,
    height: u64,
    bytes: Vec<u8>,
}

impl fmt::Debug for SummaryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummaryClient")
            .field("id", &self.id)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl SummaryClient {
    pub fn new(vm: RemoteVm, id: Id, height: u64, bytes: Vec<u8>) -> Self {
        Self {
            vm,
            id,
            height,
            bytes,
        }
    }
}

#[async_trait]
impl StateSummary for SummaryClient {
    fn id(&self) -> Id {
        self.id
    }

    fn height(&self) -> u64 {
        self.height
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// A non-zero code fails the call even if the plugin also reported acceptance.
    async fn accept(&self) -> Result<bool, VmError> {
        let resp = self
            .vm
            .call(
                "StateSummaryAccept",
                StateSummaryAcceptRequest {
                    bytes: self.bytes.clone(),
                },
                |mut c, req| async move { c.state_summary_accept(req).await },
            )
            .await?;
        error_from_code(resp.err)?;
        Ok(resp.accepted)
    }
}
