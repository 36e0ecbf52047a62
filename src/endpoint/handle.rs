//! Endpoint handle
//!
//! [`Endpoint`] is a cheap, cloneable handle to one remote target. Cloning
//! shares the queue and the scheduling task; the task stops on
//! [`Endpoint::shutdown`] or once the last handle is dropped.

use super::call::{CallHandle, Callbacks, PendingCall};
use super::config::EndpointConfig;
use super::connection::{ConnectionHooks, ConnectionState, ConnectionTracker};
use super::cycle::{CycleOutcome, EndpointEvent};
use super::queue::PendingQueue;
use super::scheduler::{Scheduler, SchedulerCommand};
use crate::metrics;
use crate::transport::{BatchTransport, HttpTransport, DEFAULT_CONTENT_TYPE};
use crate::BatchlineError;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// State shared between handles and the scheduling task
pub(crate) struct Shared {
    pub(crate) address: String,
    pub(crate) queue: PendingQueue,
    pub(crate) connection: ConnectionTracker,
    events: broadcast::Sender<EndpointEvent>,
}

impl Shared {
    pub(crate) fn new(address: String, hooks: ConnectionHooks, config: &EndpointConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            address,
            queue: PendingQueue::new(),
            connection: ConnectionTracker::new(hooks, config.hook_policy),
            events,
        }
    }

    /// Send an event; nobody listening is normal
    pub(crate) fn emit(&self, event: EndpointEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!(endpoint = %self.address, "Event sent but no receivers subscribed");
        }
    }
}

/// Handle to one remote endpoint
///
/// Must be spawned inside a tokio runtime.
///
/// ```no_run
/// use batchline::endpoint::Endpoint;
/// use batchline::transport::HttpTransport;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let endpoint = Endpoint::builder("http://localhost:8080/queue")
///     .transport(Arc::new(HttpTransport::new()?))
///     .spawn();
///
/// let queued = endpoint.defer_query(json!({"cmd": "queue"}));
/// let modules = endpoint.force_query(json!({"cmd": "modules_available"}));
/// println!("{:?} {:?}", queued.await, modules.await);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Endpoint {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<SchedulerCommand>,
    cancel: CancellationToken,
}

impl Endpoint {
    /// Start building an endpoint for `address`
    pub fn builder(address: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder::new(address)
    }

    /// Spawn an endpoint and its scheduling task
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime. Use
    /// [`EndpointBuilder::try_spawn`] to get an error instead.
    pub fn spawn(
        address: impl Into<String>,
        transport: Arc<dyn BatchTransport>,
        config: EndpointConfig,
        hooks: ConnectionHooks,
    ) -> Self {
        Self::spawn_on(&Handle::current(), address, transport, config, hooks)
    }

    fn spawn_on(
        runtime: &Handle,
        address: impl Into<String>,
        transport: Arc<dyn BatchTransport>,
        config: EndpointConfig,
        hooks: ConnectionHooks,
    ) -> Self {
        let shared = Arc::new(Shared::new(address.into(), hooks, &config));
        let (commands, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let scheduler = Scheduler::new(
            shared.clone(),
            transport,
            config,
            command_rx,
            cancel.clone(),
        );
        runtime.spawn(scheduler.run());

        Self {
            shared,
            commands,
            cancel,
        }
    }

    /// Destination address
    pub fn address(&self) -> &str {
        &self.shared.address
    }

    /// Queue a call for the next batch
    pub fn defer_query(&self, payload: impl Into<Value>) -> CallHandle {
        let (call, handle) = PendingCall::with_channel(payload.into());
        self.enqueue(call);
        handle
    }

    /// Queue a call whose outcome goes to callbacks
    pub fn defer_query_with(&self, payload: impl Into<Value>, callbacks: Callbacks) {
        self.enqueue(PendingCall::with_callbacks(payload.into(), callbacks));
    }

    /// Queue a call and flush right away
    pub fn force_query(&self, payload: impl Into<Value>) -> CallHandle {
        let handle = self.defer_query(payload);
        self.request_flush(None);
        handle
    }

    /// Callback form of [`force_query`](Self::force_query)
    pub fn force_query_with(&self, payload: impl Into<Value>, callbacks: Callbacks) {
        self.defer_query_with(payload, callbacks);
        self.request_flush(None);
    }

    /// Flush now, cancelling the scheduled wait.
    ///
    /// If a batch is in flight the flush runs as soon as it completes. The
    /// handle resolves with the outcome of the cycle that served the request.
    pub fn flush(&self) -> FlushHandle {
        let (tx, rx) = oneshot::channel();
        self.request_flush(Some(tx));
        FlushHandle { rx }
    }

    /// Calls waiting for the next flush
    pub fn pending_len(&self) -> usize {
        self.shared.queue.len()
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.connection.current()
    }

    /// Whether the last batch reached the server
    pub fn is_alive(&self) -> bool {
        self.connection_state().is_alive()
    }

    /// Watch connection state changes
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.shared.connection.subscribe()
    }

    /// Subscribe to cycle and connection events
    pub fn subscribe(&self) -> broadcast::Receiver<EndpointEvent> {
        self.shared.events.subscribe()
    }

    /// Stop the scheduling loop. An in-flight batch still completes; calls
    /// queued after it resolve with `CallError::Dropped`.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether the scheduling loop has stopped accepting calls
    pub fn is_stopped(&self) -> bool {
        self.shared.queue.is_closed()
    }

    fn enqueue(&self, call: PendingCall) {
        match self.shared.queue.push(call) {
            Ok(depth) => metrics::set_queue_depth(&self.shared.address, depth),
            Err(call) => {
                tracing::debug!(endpoint = %self.shared.address, "Endpoint stopped; dropping call");
                call.into_parts().1.discard();
            }
        }
    }

    fn request_flush(&self, done: Option<oneshot::Sender<CycleOutcome>>) {
        if let Err(mpsc::error::SendError(SchedulerCommand::Flush(Some(done)))) =
            self.commands.send(SchedulerCommand::Flush(done))
        {
            let _ = done.send(CycleOutcome::Stopped);
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("address", &self.shared.address)
            .field("pending", &self.pending_len())
            .field("connection", &self.connection_state())
            .finish()
    }
}

/// Future resolving to the outcome of a requested flush
#[derive(Debug)]
pub struct FlushHandle {
    rx: oneshot::Receiver<CycleOutcome>,
}

impl Future for FlushHandle {
    type Output = CycleOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(CycleOutcome::Stopped),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Builder for [`Endpoint`]
pub struct EndpointBuilder {
    address: String,
    transport: Option<Arc<dyn BatchTransport>>,
    config: EndpointConfig,
    hooks: ConnectionHooks,
}

impl EndpointBuilder {
    /// Create a new builder
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            transport: None,
            config: EndpointConfig::default(),
            hooks: ConnectionHooks::default(),
        }
    }

    /// Set the transport
    pub fn transport(mut self, transport: Arc<dyn BatchTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the scheduling configuration
    pub fn config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the connection hooks
    pub fn hooks(mut self, hooks: ConnectionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Spawn the endpoint, reporting a missing runtime or an HTTP client
    /// that cannot be built as errors
    pub fn try_spawn(self) -> crate::Result<Endpoint> {
        let runtime = Handle::try_current().map_err(|e| {
            BatchlineError::Other(format!("Endpoint requires a tokio runtime: {}", e))
        })?;
        let transport: Arc<dyn BatchTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };
        Ok(Endpoint::spawn_on(
            &runtime,
            self.address,
            transport,
            self.config,
            self.hooks,
        ))
    }

    /// Spawn the endpoint. Without an explicit transport, uses
    /// [`HttpTransport`] defaults.
    ///
    /// # Panics
    ///
    /// Panics outside a tokio runtime, or when no transport was set and the
    /// default HTTP client cannot initialise its TLS backend.
    pub fn spawn(self) -> Endpoint {
        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(HttpTransport::from_client(
                reqwest::Client::new(),
                DEFAULT_CONTENT_TYPE,
            ))
        });
        Endpoint::spawn(self.address, transport, self.config, self.hooks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_spawn_outside_runtime() {
        let err = Endpoint::builder("http://localhost:9000/queue")
            .try_spawn()
            .unwrap_err();

        assert!(matches!(err, BatchlineError::Other(_)));
        assert!(err.to_string().contains("tokio runtime"));
    }

    #[tokio::test]
    async fn test_try_spawn_with_default_transport() {
        let endpoint = Endpoint::builder("http://localhost:9000/queue")
            .try_spawn()
            .unwrap();

        assert_eq!(endpoint.address(), "http://localhost:9000/queue");
        assert_eq!(endpoint.connection_state(), ConnectionState::Unknown);
        endpoint.shutdown();
    }
}
