// Path: crates/telemetry/src/grpc.rs
//! Server-side gRPC instrumentation as a `tower` layer.

use crate::sinks::GrpcMetricsSink;
use crate::time::Timer;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Wraps every service of a `tonic` server with started/handled/latency metrics.
#[derive(Debug, Clone)]
pub struct GrpcMetricsLayer {
    sink: Arc<dyn GrpcMetricsSink>,
}

impl GrpcMetricsLayer {
    pub fn new(sink: Arc<dyn GrpcMetricsSink>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for GrpcMetricsLayer {
    type Service = GrpcMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcMetricsService {
            inner,
            sink: self.sink.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GrpcMetricsService<S> {
    inner: S,
    sink: Arc<dyn GrpcMetricsSink>,
}

/// Splits `/package.Service/Method` into its service and method parts.
pub fn split_path(path: &str) -> (String, String) {
    let trimmed = path.trim_start_matches('/');
    match trimmed.split_once('/') {
        Some((service, method)) => (service.to_string(), method.to_string()),
        None => ("unknown".to_string(), trimmed.to_string()),
    }
}

/// Reads the status code from response headers.
///
/// Successful unary responses carry `grpc-status` in trailers, so an absent header means `Ok`.
fn response_code(headers: &http::HeaderMap) -> String {
    let code = headers
        .get("grpc-status")
        .map(|v| tonic::Code::from_bytes(v.as_bytes()))
        .unwrap_or(tonic::Code::Ok);
    format!("{:?}", code)
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for GrpcMetricsService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let (service, method) = split_path(req.uri().path());
        self.sink.inc_started(&service, &method);
        let timer = Timer::new(self.sink.clone(), service.clone(), method.clone());
        let sink = self.sink.clone();

        // The ready service must be the one called; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move {
            let result = inner.call(req).await;
            let code = match &result {
                Ok(resp) => response_code(resp.headers()),
                Err(_) => format!("{:?}", tonic::Code::Unknown),
            };
            sink.inc_handled(&service, &method, &code);
            drop(timer);
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::convert::Infallible;
    use tower::ServiceExt;

    #[derive(Debug, Default)]
    struct Recording {
        handled: Mutex<Vec<(String, String, String)>>,
        observed: Mutex<usize>,
    }

    impl GrpcMetricsSink for Recording {
        fn inc_started(&self, _service: &str, _method: &str) {}
        fn inc_handled(&self, service: &str, method: &str, code: &str) {
            self.handled
                .lock()
                .push((service.into(), method.into(), code.into()));
        }
        fn observe_handling(&self, _service: &str, _method: &str, _duration_secs: f64) {
            *self.observed.lock() += 1;
        }
    }

    #[test]
    fn splits_grpc_paths() {
        assert_eq!(
            split_path("/vm.Vm/ParseBlock"),
            ("vm.Vm".to_string(), "ParseBlock".to_string())
        );
        assert_eq!(split_path("/odd"), ("unknown".to_string(), "odd".to_string()));
    }

    #[tokio::test]
    async fn records_status_from_headers() {
        let sink = Arc::new(Recording::default());
        let layer = GrpcMetricsLayer::new(sink.clone());
        let svc = layer.layer(tower::service_fn(|req: http::Request<()>| async move {
            let mut resp = http::Response::new(());
            if req.uri().path().ends_with("Missing") {
                resp.headers_mut()
                    .insert("grpc-status", http::HeaderValue::from_static("5"));
            }
            Ok::<_, Infallible>(resp)
        }));

        let req = http::Request::builder()
            .uri("/rpcdb.Database/Missing")
            .body(())
            .unwrap();
        svc.clone().oneshot(req).await.unwrap();
        let req = http::Request::builder()
            .uri("/rpcdb.Database/Get")
            .body(())
            .unwrap();
        svc.oneshot(req).await.unwrap();

        let handled = sink.handled.lock().clone();
        assert_eq!(handled[0].2, "NotFound");
        assert_eq!(handled[1].2, "Ok");
        assert_eq!(*sink.observed.lock(), 2);
    }
}
