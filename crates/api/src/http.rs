// Path: crates/api/src/http.rs
//! A VM exposes HTTP endpoints as a set of handlers keyed by URL suffix. The
//! router that mounts them applies the declared lock discipline; this crate
//! only describes the mapping.

use async_trait::async_trait;
use bytes::Bytes;
use plugvm_types::{LockOption, VmError};
use std::collections::HashMap;
use std::sync::Arc;

pub type HttpRequest = http::Request<Bytes>;
pub type HttpResponse = http::Response<Bytes>;

/// Serves one HTTP endpoint.
#[async_trait]
pub trait HttpHandler: Send + Sync {
    async fn serve(&self, request: HttpRequest) -> Result<HttpResponse, VmError>;
}

/// A handler together with the engine lock it must run under.
#[derive(Clone)]
pub struct HttpHandlerEntry {
    pub lock_option: LockOption,
    pub handler: Arc<dyn HttpHandler>,
}

impl std::fmt::Debug for HttpHandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpHandlerEntry")
            .field("lock_option", &self.lock_option)
            .finish_non_exhaustive()
    }
}

/// URL suffix to handler.
pub type HandlerSet = HashMap<String, HttpHandlerEntry>;
