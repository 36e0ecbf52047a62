//! Queued calls and their resolution
//!
//! Every deferred call carries exactly one [`Responder`]. It is consumed when
//! the batch containing the call completes, so each call resolves at most
//! once.

use serde_json::Value;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::oneshot;

/// Outcome of a single call
pub type CallResult = std::result::Result<Value, CallError>;

/// Why a call did not produce a result
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The server processed the batch but marked this call as failed
    #[error("server rejected call: {}", .error.as_deref().unwrap_or("unknown error"))]
    Rejected { error: Option<String> },

    /// The batch never got a response
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response array did not line up with the request array
    #[error("protocol violation: sent {sent} calls, received {received} replies")]
    Protocol { sent: usize, received: usize },

    /// The call was discarded without an outcome
    #[error("call dropped without an outcome")]
    Dropped,
}

/// Callback invoked with the server's result
pub type SuccessCallback = Box<dyn FnOnce(Value) + Send + 'static>;

/// Callback invoked, without arguments, when the call fails
pub type FailureCallback = Box<dyn FnOnce() + Send + 'static>;

/// Optional success/failure callbacks for the callback-style API
///
/// ```
/// use batchline::endpoint::Callbacks;
///
/// let callbacks = Callbacks::new()
///     .on_success(|result| println!("queued: {result}"))
///     .on_failure(|| eprintln!("queue request failed"));
/// # drop(callbacks);
/// ```
#[derive(Default)]
pub struct Callbacks {
    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureCallback>,
}

impl Callbacks {
    /// No callbacks; the call's outcome is ignored
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the success callback
    pub fn on_success(mut self, f: impl FnOnce(Value) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Set the failure callback
    pub fn on_failure(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// Where a call's outcome goes
pub(crate) enum Responder {
    Channel(oneshot::Sender<CallResult>),
    Callbacks(Callbacks),
}

impl Responder {
    pub(crate) fn succeed(self, result: Value) {
        match self {
            Responder::Channel(tx) => {
                let _ = tx.send(Ok(result));
            }
            Responder::Callbacks(callbacks) => {
                if let Some(on_success) = callbacks.on_success {
                    guard_callback(move || on_success(result));
                }
            }
        }
    }

    pub(crate) fn fail(self, error: CallError) {
        match self {
            Responder::Channel(tx) => {
                let _ = tx.send(Err(error));
            }
            Responder::Callbacks(callbacks) => {
                if let Some(on_failure) = callbacks.on_failure {
                    guard_callback(on_failure);
                }
            }
        }
    }

    /// Drop without notifying. Channel handles observe [`CallError::Dropped`].
    pub(crate) fn discard(self) {}
}

/// Run caller-supplied code without letting a panic take down the scheduler
pub(crate) fn guard_callback(f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!("Callback panicked; continuing with the next call");
    }
}

/// One queued logical request
pub(crate) struct PendingCall {
    payload: Value,
    responder: Responder,
}

impl PendingCall {
    pub(crate) fn with_channel(payload: Value) -> (Self, CallHandle) {
        let (tx, rx) = oneshot::channel();
        let call = Self {
            payload,
            responder: Responder::Channel(tx),
        };
        (call, CallHandle { rx })
    }

    pub(crate) fn with_callbacks(payload: Value, callbacks: Callbacks) -> Self {
        Self {
            payload,
            responder: Responder::Callbacks(callbacks),
        }
    }

    pub(crate) fn into_parts(self) -> (Value, Responder) {
        (self.payload, self.responder)
    }
}

/// Future resolving to the outcome of one deferred call
#[derive(Debug)]
pub struct CallHandle {
    rx: oneshot::Receiver<CallResult>,
}

impl CallHandle {
    /// Non-blocking check; `None` while the call is still pending
    pub fn try_result(&mut self) -> Option<CallResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(CallError::Dropped)),
        }
    }
}

impl Future for CallHandle {
    type Output = CallResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(CallError::Dropped)),
            Poll::Pending => Poll::Pending,
        }
    }
}
