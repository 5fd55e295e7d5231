// Path: crates/ipc/src/grpcutils.rs
//! Helpers shared by every gRPC endpoint on both sides of the plugin boundary.

use parking_lot::Mutex;
use plugvm_types::VmError;
use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Endpoint};

/// Binds a fresh listener on an ephemeral loopback port.
pub async fn new_listener() -> std::io::Result<TcpListener> {
    TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await
}

/// Wraps a bound listener as the connection stream `tonic` serves from.
pub fn incoming(listener: TcpListener) -> TcpListenerStream {
    TcpListenerStream::new(listener)
}

/// Creates a channel to `addr` without waiting for the connection.
///
/// Connection errors surface on the first RPC issued over the channel.
pub fn dial(addr: &str) -> Result<Channel, VmError> {
    let endpoint = if addr.starts_with("http") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    };
    let channel = Endpoint::from_shared(endpoint)
        .map_err(|e| VmError::Transport(format!("invalid address {}: {}", addr, e)))?
        .connect_lazy();
    Ok(channel)
}

struct ServerHandle {
    name: String,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<(), tonic::transport::Error>>,
}

/// Tracks every gRPC server the node hosts for a plugin so they can be
/// stopped together.
#[derive(Default)]
pub struct ServerCloser {
    servers: Mutex<Vec<ServerHandle>>,
}

impl std::fmt::Debug for ServerCloser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCloser")
            .field("servers", &self.servers.lock().len())
            .finish()
    }
}

impl ServerCloser {
    /// Creates an empty closer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a server onto the runtime and tracks it.
    ///
    /// `serve` receives the shutdown signal and must return the server future,
    /// typically `router.serve_with_incoming_shutdown(..)`.
    pub fn spawn<F, Fut>(&self, name: &str, serve: F)
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = Result<(), tonic::transport::Error>> + Send + 'static,
    {
        let (shutdown, signal) = oneshot::channel();
        let task = tokio::spawn(serve(signal));
        self.servers.lock().push(ServerHandle {
            name: name.to_string(),
            shutdown,
            task,
        });
    }

    /// Returns the number of servers currently tracked.
    pub fn len(&self) -> usize {
        self.servers.lock().len()
    }

    /// Returns true if no server is tracked.
    pub fn is_empty(&self) -> bool {
        self.servers.lock().is_empty()
    }

    /// Signals every tracked server to stop and waits for them to drain.
    pub async fn stop(&self) {
        let servers = std::mem::take(&mut *self.servers.lock());
        let mut tasks = Vec::with_capacity(servers.len());
        for server in servers {
            // The server may already have exited; nothing to signal then.
            let _ = server.shutdown.send(());
            tasks.push((server.name, server.task));
        }
        for (name, task) in tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(target: "grpc", "server {} exited with error: {}", name, e),
                Err(e) => tracing::warn!(target: "grpc", "server {} task failed: {}", name, e),
            }
        }
    }
}

/// Converts a wire timestamp into a local time value. A missing timestamp is an error.
pub fn timestamp_as_time(ts: Option<prost_types::Timestamp>) -> Result<SystemTime, VmError> {
    let ts = ts.ok_or_else(|| VmError::InvalidTimestamp("missing timestamp".into()))?;
    SystemTime::try_from(ts).map_err(|e| VmError::InvalidTimestamp(e.to_string()))
}

/// Converts a local time value into a wire timestamp.
pub fn timestamp_from_time(time: SystemTime) -> prost_types::Timestamp {
    prost_types::Timestamp::from(time)
}

/// Converts a duration into the wire's signed nanosecond count, saturating at `i64::MAX`.
pub fn duration_to_nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

/// Converts a wire nanosecond count into a duration; negative values become zero.
pub fn duration_from_nanos(nanos: i64) -> Duration {
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(0))
}
