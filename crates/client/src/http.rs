// Path: crates/client/src/http.rs
//! HTTP handlers served by the plugin, reached over `ghttp.Http`.

use async_trait::async_trait;
use bytes::Bytes;
use plugvm_api::http::{HttpHandler, HttpRequest, HttpResponse};
use plugvm_ipc::ghttp::{http_client::HttpClient, Element, HandleSimpleHttpRequest};
use plugvm_types::VmError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tonic::transport::Channel;

/// A connection the adapter opened to one of the plugin's handler servers.
///
/// Clones share the closed flag, so closing the adapter's copy cuts off every
/// handler built on it.
#[derive(Debug, Clone)]
pub struct AuxConnection {
    addr: String,
    channel: Channel,
    closed: Arc<AtomicBool>,
}

impl AuxConnection {
    pub fn new(addr: impl Into<String>, channel: Channel) -> Self {
        Self {
            addr: addr.into(),
            channel,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Forwards requests for one URL prefix to the plugin.
#[derive(Debug, Clone)]
pub struct HttpHandlerClient {
    conn: AuxConnection,
}

impl HttpHandlerClient {
    pub fn new(conn: AuxConnection) -> Self {
        Self { conn }
    }
}

fn to_elements(headers: &http::HeaderMap) -> Vec<Element> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        // Non-visible-ASCII values cannot cross the wire as strings.
        if let Ok(v) = value.to_str() {
            grouped
                .entry(name.as_str().to_string())
                .or_default()
                .push(v.to_string());
        }
    }
    grouped
        .into_iter()
        .map(|(key, values)| Element { key, values })
        .collect()
}

#[async_trait]
impl HttpHandler for HttpHandlerClient {
    async fn serve(&self, request: HttpRequest) -> Result<HttpResponse, VmError> {
        if self.conn.is_closed() {
            return Err(VmError::Transport(format!(
                "handler connection to {} is closed",
                self.conn.addr
            )));
        }
        let (parts, body) = request.into_parts();
        let req = HandleSimpleHttpRequest {
            method: parts.method.as_str().to_string(),
            url: parts.uri.to_string(),
            headers: to_elements(&parts.headers),
            body: body.to_vec(),
        };
        let mut client = HttpClient::new(self.conn.channel.clone());
        let resp = client
            .handle_simple(req)
            .await
            .map_err(|status| VmError::Transport(format!("HandleSimple failed: {}", status)))?
            .into_inner();

        let code = u16::try_from(resp.code)
            .map_err(|_| VmError::InvalidArgument(format!("invalid HTTP status {}", resp.code)))?;
        let mut builder = http::Response::builder().status(code);
        for element in resp.headers {
            for value in element.values {
                builder = builder.header(element.key.as_str(), value);
            }
        }
        builder
            .body(Bytes::from(resp.body))
            .map_err(|e| VmError::InvalidArgument(format!("invalid HTTP response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugvm_ipc::grpcutils::dial;

    #[test]
    fn headers_are_grouped_by_name() {
        let mut headers = http::HeaderMap::new();
        headers.append("accept", "a".parse().unwrap());
        headers.append("accept", "b".parse().unwrap());
        headers.insert("x-one", "1".parse().unwrap());
        let elements = to_elements(&headers);
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].key, "accept");
        assert_eq!(elements[0].values, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn closed_connection_fails_fast() {
        let conn = AuxConnection::new("127.0.0.1:1", dial("127.0.0.1:1").unwrap());
        let handler = HttpHandlerClient::new(conn.clone());
        conn.close();
        let req = http::Request::builder()
            .uri("/ping")
            .body(Bytes::new())
            .unwrap();
        let err = handler.serve(req).await.unwrap_err();
        assert!(matches!(err, VmError::Transport(_)));
    }
}
