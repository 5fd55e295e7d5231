// Path: crates/services/src/database.rs
//! `rpcdb.Database`: one instance per versioned database.

use parking_lot::Mutex;
use plugvm_api::database::{BatchOp, Database, DbIterator};
use plugvm_ipc::rpcdb::{
    database_server::Database as DatabaseService, CloseRequest, CloseResponse, CompactRequest,
    CompactResponse, DeleteRequest, DeleteResponse, GetRequest, GetResponse, HasRequest,
    HasResponse, HealthCheckResponse, IteratorErrorRequest, IteratorErrorResponse,
    IteratorNextRequest, IteratorNextResponse, IteratorReleaseRequest, IteratorReleaseResponse,
    NewIteratorWithStartAndPrefixRequest, NewIteratorWithStartAndPrefixResponse, PutRequest,
    PutRequestOp, PutResponse, WriteBatchRequest, WriteBatchResponse,
};
use plugvm_types::error::codes::{code_from_db_error, NO_ERROR};
use plugvm_types::error::ErrorCode;
use plugvm_types::DatabaseError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// Upper bound on the key and value bytes returned by one `IteratorNext`.
pub const ITERATION_BATCH_SIZE: usize = 128 * 1024;
/// Upper bound on the pairs returned by one `IteratorNext`.
pub const ITERATION_BATCH_COUNT: usize = 1024;

/// Closed and not-found travel as embedded codes; anything else fails the call.
fn db_code(result: Result<(), DatabaseError>) -> Result<u32, Status> {
    match result {
        Ok(()) => Ok(NO_ERROR),
        Err(e) => code_from_db_error(&e)
            .ok_or_else(|| Status::internal(format!("{}: {}", e.code(), e))),
    }
}

pub struct DatabaseProxy {
    db: Arc<dyn Database>,
    next_iterator_id: AtomicU64,
    iterators: Mutex<HashMap<u64, Box<dyn DbIterator>>>,
}

impl std::fmt::Debug for DatabaseProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseProxy")
            .field("open_iterators", &self.iterators.lock().len())
            .finish_non_exhaustive()
    }
}

impl DatabaseProxy {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            next_iterator_id: AtomicU64::new(0),
            iterators: Mutex::new(HashMap::new()),
        }
    }
}

#[tonic::async_trait]
impl DatabaseService for DatabaseProxy {
    async fn has(&self, request: Request<HasRequest>) -> Result<Response<HasResponse>, Status> {
        let req = request.into_inner();
        let (has, result) = match self.db.has(&req.key) {
            Ok(has) => (has, Ok(())),
            Err(e) => (false, Err(e)),
        };
        Ok(Response::new(HasResponse {
            has,
            err: db_code(result)?,
        }))
    }

    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let req = request.into_inner();
        let (value, result) = match self.db.get(&req.key) {
            Ok(value) => (value, Ok(())),
            Err(e) => (Vec::new(), Err(e)),
        };
        Ok(Response::new(GetResponse {
            value,
            err: db_code(result)?,
        }))
    }

    async fn put(&self, request: Request<PutRequest>) -> Result<Response<PutResponse>, Status> {
        let req = request.into_inner();
        let err = db_code(self.db.put(&req.key, &req.value))?;
        Ok(Response::new(PutResponse { err }))
    }

    async fn delete(
        &self,
        request: Request<DeleteRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let req = request.into_inner();
        let err = db_code(self.db.delete(&req.key))?;
        Ok(Response::new(DeleteResponse { err }))
    }

    async fn compact(
        &self,
        request: Request<CompactRequest>,
    ) -> Result<Response<CompactResponse>, Status> {
        let req = request.into_inner();
        let err = db_code(self.db.compact(&req.start, &req.limit))?;
        Ok(Response::new(CompactResponse { err }))
    }

    async fn close(&self, _request: Request<CloseRequest>) -> Result<Response<CloseResponse>, Status> {
        let err = db_code(self.db.close())?;
        Ok(Response::new(CloseResponse { err }))
    }

    async fn health_check(
        &self,
        _request: Request<()>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let report = self
            .db
            .health_check()
            .map_err(|e| Status::unavailable(e.to_string()))?;
        let details =
            serde_json::to_vec(&report).map_err(|e| Status::internal(e.to_string()))?;
        Ok(Response::new(HealthCheckResponse { details }))
    }

    async fn write_batch(
        &self,
        request: Request<WriteBatchRequest>,
    ) -> Result<Response<WriteBatchResponse>, Status> {
        let req = request.into_inner();
        let mut ops = Vec::with_capacity(req.puts.len() + req.deletes.len());
        ops.extend(req.puts.into_iter().map(|p| BatchOp::Put {
            key: p.key,
            value: p.value,
        }));
        ops.extend(
            req.deletes
                .into_iter()
                .map(|d| BatchOp::Delete { key: d.key }),
        );
        let err = db_code(self.db.write_batch(ops))?;
        Ok(Response::new(WriteBatchResponse { err }))
    }

    async fn new_iterator_with_start_and_prefix(
        &self,
        request: Request<NewIteratorWithStartAndPrefixRequest>,
    ) -> Result<Response<NewIteratorWithStartAndPrefixResponse>, Status> {
        let req = request.into_inner();
        let iterator = self
            .db
            .iterator(&req.start, &req.prefix)
            .map_err(|e| match e {
                DatabaseError::Closed => Status::unavailable(e.to_string()),
                other => Status::internal(other.to_string()),
            })?;
        let id = self.next_iterator_id.fetch_add(1, Ordering::Relaxed);
        self.iterators.lock().insert(id, iterator);
        Ok(Response::new(NewIteratorWithStartAndPrefixResponse { id }))
    }

    async fn iterator_next(
        &self,
        request: Request<IteratorNextRequest>,
    ) -> Result<Response<IteratorNextResponse>, Status> {
        let id = request.into_inner().id;
        let mut iterators = self.iterators.lock();
        let iterator = iterators
            .get_mut(&id)
            .ok_or_else(|| Status::not_found(format!("unknown iterator {}", id)))?;

        let mut data = Vec::new();
        let mut size = 0usize;
        while data.len() < ITERATION_BATCH_COUNT && size < ITERATION_BATCH_SIZE {
            let Some((key, value)) = iterator.next() else {
                break;
            };
            size += key.len() + value.len();
            data.push(PutRequestOp { key, value });
        }
        Ok(Response::new(IteratorNextResponse { data }))
    }

    async fn iterator_error(
        &self,
        request: Request<IteratorErrorRequest>,
    ) -> Result<Response<IteratorErrorResponse>, Status> {
        let id = request.into_inner().id;
        let iterators = self.iterators.lock();
        let iterator = iterators
            .get(&id)
            .ok_or_else(|| Status::not_found(format!("unknown iterator {}", id)))?;
        let err = db_code(iterator.error())?;
        Ok(Response::new(IteratorErrorResponse { err }))
    }

    async fn iterator_release(
        &self,
        request: Request<IteratorReleaseRequest>,
    ) -> Result<Response<IteratorReleaseResponse>, Status> {
        let id = request.into_inner().id;
        let Some(mut iterator) = self.iterators.lock().remove(&id) else {
            return Ok(Response::new(IteratorReleaseResponse { err: NO_ERROR }));
        };
        let err = db_code(iterator.error())?;
        iterator.release();
        Ok(Response::new(IteratorReleaseResponse { err }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugvm_api::database::MemDb;
    use plugvm_types::error::WireCode;

    fn proxy() -> DatabaseProxy {
        DatabaseProxy::new(Arc::new(MemDb::new()))
    }

    #[tokio::test]
    async fn missing_key_is_an_embedded_code() {
        let proxy = proxy();
        let resp = proxy
            .get(Request::new(GetRequest { key: b"k".to_vec() }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(resp.err, WireCode::NotFound.as_u32());
        assert!(resp.value.is_empty());
    }

    #[tokio::test]
    async fn iterator_pages_until_exhausted() {
        let proxy = proxy();
        let puts = (0..3u8)
            .map(|i| PutRequestOp {
                key: vec![b'k', i],
                value: vec![i],
            })
            .collect();
        proxy
            .write_batch(Request::new(WriteBatchRequest {
                puts,
                deletes: vec![],
            }))
            .await
            .unwrap();

        let id = proxy
            .new_iterator_with_start_and_prefix(Request::new(
                NewIteratorWithStartAndPrefixRequest {
                    start: vec![],
                    prefix: b"k".to_vec(),
                },
            ))
            .await
            .unwrap()
            .into_inner()
            .id;

        let first = proxy
            .iterator_next(Request::new(IteratorNextRequest { id }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(first.data.len(), 3);
        let second = proxy
            .iterator_next(Request::new(IteratorNextRequest { id }))
            .await
            .unwrap()
            .into_inner();
        assert!(second.data.is_empty());

        proxy
            .iterator_release(Request::new(IteratorReleaseRequest { id }))
            .await
            .unwrap();
        let status = proxy
            .iterator_next(Request::new(IteratorNextRequest { id }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn closed_database_reports_closed_code() {
        let proxy = proxy();
        let resp = proxy.close(Request::new(CloseRequest {})).await.unwrap();
        assert_eq!(resp.into_inner().err, NO_ERROR);
        let resp = proxy
            .put(Request::new(PutRequest {
                key: b"k".to_vec(),
                value: b"v".to_vec(),
            }))
            .await
            .unwrap();
        assert_eq!(resp.into_inner().err, WireCode::Closed.as_u32());
    }
}
