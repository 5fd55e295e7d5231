// Path: crates/client/src/block.rs
//! Local handles on blocks held by the plugin.

use crate::remote::RemoteVm;
use async_trait::async_trait;
use parking_lot::RwLock;
use plugvm_api::block::Block;
use plugvm_ipc::grpcutils::timestamp_as_time;
use plugvm_ipc::vm::{
    BlockAcceptRequest, BlockRejectRequest, BlockVerifyRequest, BuildBlockResponse,
    GetBlockResponse, ParseBlockResponse,
};
use plugvm_types::{Id, Status, VmError};
use std::fmt;
use std::time::SystemTime;

/// A block whose authoritative copy lives in the plugin.
///
/// The handle is rebuilt from every response that yields a block. Status moves
/// only through [`Block::accept`] and [`Block::reject`]; verification may
/// replace the timestamp.
pub struct BlockClient {
    vm: RemoteVm,
    id: Id,
    parent: Id,
    bytes: Vec<u8>,
    height: u64,
    status: RwLock<Status>,
    time: RwLock<SystemTime>,
}

impl fmt::Debug for BlockClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockClient")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("height", &self.height)
            .field("status", &*self.status.read())
            .finish_non_exhaustive()
    }
}

impl BlockClient {
    pub fn new(
        vm: RemoteVm,
        id: Id,
        parent: Id,
        bytes: Vec<u8>,
        height: u64,
        status: Status,
        time: SystemTime,
    ) -> Self {
        Self {
            vm,
            id,
            parent,
            bytes,
            height,
            status: RwLock::new(status),
            time: RwLock::new(time),
        }
    }

    /// A freshly built block. Built blocks are always processing.
    pub(crate) fn from_build(vm: RemoteVm, resp: BuildBlockResponse) -> Result<Self, VmError> {
        Ok(Self::new(
            vm,
            Id::from_slice(&resp.id)?,
            Id::from_slice(&resp.parent_id)?,
            resp.bytes,
            resp.height,
            Status::Processing,
            timestamp_as_time(resp.timestamp)?,
        ))
    }

    /// A parsed block. Keeps the caller's bytes rather than anything echoed back.
    pub(crate) fn from_parse(
        vm: RemoteVm,
        bytes: Vec<u8>,
        resp: ParseBlockResponse,
    ) -> Result<Self, VmError> {
        Ok(Self::new(
            vm,
            Id::from_slice(&resp.id)?,
            Id::from_slice(&resp.parent_id)?,
            bytes,
            resp.height,
            Status::try_from(resp.status)?,
            timestamp_as_time(resp.timestamp)?,
        ))
    }

    /// A fetched block. The response does not carry the id; the requested one is used.
    pub(crate) fn from_get(vm: RemoteVm, id: Id, resp: GetBlockResponse) -> Result<Self, VmError> {
        Ok(Self::new(
            vm,
            id,
            Id::from_slice(&resp.parent_id)?,
            resp.bytes,
            resp.height,
            Status::try_from(resp.status)?,
            timestamp_as_time(resp.timestamp)?,
        ))
    }
}

#[async_trait]
impl Block for BlockClient {
    fn id(&self) -> Id {
        self.id
    }

    fn parent(&self) -> Id {
        self.parent
    }

    fn status(&self) -> Status {
        *self.status.read()
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn height(&self) -> u64 {
        self.height
    }

    fn timestamp(&self) -> SystemTime {
        *self.time.read()
    }

    async fn verify(&self) -> Result<(), VmError> {
        let resp = self
            .vm
            .call(
                "BlockVerify",
                BlockVerifyRequest {
                    bytes: self.bytes.clone(),
                },
                |mut c, req| async move { c.block_verify(req).await },
            )
            .await?;
        *self.time.write() = timestamp_as_time(resp.timestamp)?;
        Ok(())
    }

    async fn accept(&self) -> Result<(), VmError> {
        *self.status.write() = Status::Accepted;
        self.vm
            .call(
                "BlockAccept",
                BlockAcceptRequest {
                    id: self.id.to_vec(),
                },
                |mut c, req| async move { c.block_accept(req).await },
            )
            .await
    }

    async fn reject(&self) -> Result<(), VmError> {
        *self.status.write() = Status::Rejected;
        self.vm
            .call(
                "BlockReject",
                BlockRejectRequest {
                    id: self.id.to_vec(),
                },
                |mut c, req| async move { c.block_reject(req).await },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugvm_ipc::grpcutils::{dial, timestamp_from_time};
    use std::time::{Duration, UNIX_EPOCH};

    fn offline_vm() -> RemoteVm {
        RemoteVm::new(dial("127.0.0.1:1").unwrap(), None)
    }

    #[tokio::test]
    async fn parse_keeps_the_input_bytes() {
        let when = UNIX_EPOCH + Duration::from_secs(42);
        let blk = BlockClient::from_parse(
            offline_vm(),
            b"payload".to_vec(),
            ParseBlockResponse {
                id: vec![1; 32],
                parent_id: vec![2; 32],
                status: 3,
                height: 7,
                timestamp: Some(timestamp_from_time(when)),
            },
        )
        .unwrap();
        assert_eq!(blk.bytes(), b"payload");
        assert_eq!(blk.id(), Id([1; 32]));
        assert_eq!(blk.parent(), Id([2; 32]));
        assert_eq!(blk.status(), Status::Accepted);
        assert_eq!(blk.height(), 7);
        assert_eq!(blk.timestamp(), when);
        // Reading back is repeatable.
        assert_eq!(blk.status(), Status::Accepted);
    }

    #[tokio::test]
    async fn invalid_status_is_rejected() {
        let err = BlockClient::from_parse(
            offline_vm(),
            vec![],
            ParseBlockResponse {
                id: vec![1; 32],
                parent_id: vec![2; 32],
                status: 9,
                height: 0,
                timestamp: Some(timestamp_from_time(UNIX_EPOCH)),
            },
        )
        .unwrap_err();
        assert_eq!(err, VmError::InvalidStatus(9));
    }

    #[tokio::test]
    async fn short_ids_are_rejected() {
        let err = BlockClient::from_build(
            offline_vm(),
            BuildBlockResponse {
                id: vec![1; 31],
                parent_id: vec![2; 32],
                bytes: vec![],
                height: 1,
                timestamp: Some(timestamp_from_time(UNIX_EPOCH)),
            },
        )
        .unwrap_err();
        assert!(matches!(err, VmError::InvalidId { got: 31, .. }));
    }

    #[tokio::test]
    async fn accept_sets_status_even_when_the_call_fails() {
        let blk = BlockClient::new(
            offline_vm(),
            Id([1; 32]),
            Id([0; 32]),
            vec![1],
            1,
            Status::Processing,
            UNIX_EPOCH,
        );
        let err = blk.accept().await.unwrap_err();
        assert!(matches!(err, VmError::Transport(_)));
        assert_eq!(blk.status(), Status::Accepted);
    }
}
