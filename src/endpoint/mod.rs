//! Batching endpoint
//!
//! An [`Endpoint`] coalesces independent calls into batched round-trips
//! against one remote address.
//!
//! # Scheduling Loop
//!
//! Each endpoint owns a background task that repeats one cycle forever:
//!
//! 1. **Idle-wait**: the queue is empty; check again after the idle delay.
//! 2. **Flush**: take the whole queue, send it as one batch, and resolve each
//!    call from the reply at the same position.
//! 3. **Reschedule**: pick the next delay from the cycle's [`Cadence`]:
//!    immediate after a delivered batch, the fixed backoff after a transport
//!    failure, the idle delay when nothing was sent.
//!
//! A forced flush ([`Endpoint::force_query`], [`Endpoint::flush`]) replaces
//! the scheduled wait; there is never more than one pending schedule and never
//! more than one batch in flight.
//!
//! # Outcomes
//!
//! Calls resolve through a [`CallHandle`] future, or through [`Callbacks`] for
//! callers that prefer the callback style:
//!
//! - server reply marked `success`: `Ok(result)` / `on_success(result)`
//! - server reply marked failed: [`CallError::Rejected`] / `on_failure()`
//! - no response at all: [`CallError::Transport`] for every call in the batch
//! - wrong number of replies: see [`ProtocolViolationPolicy`]
//!
//! Failed calls are never retried; only later calls benefit from the loop
//! carrying on.

mod call;
mod config;
mod connection;
mod cycle;
mod handle;
mod queue;
mod scheduler;

pub use call::{CallError, CallHandle, CallResult, Callbacks, FailureCallback, SuccessCallback};
pub use config::{
    EndpointConfig, HookPolicy, ProtocolViolationPolicy, DEFAULT_BACKOFF_DELAY,
    DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_IDLE_DELAY, DEFAULT_SUCCESS_DELAY,
};
pub use connection::{ConnectionHook, ConnectionHooks, ConnectionState};
pub use cycle::{Cadence, CycleOutcome, EndpointEvent};
pub use handle::{Endpoint, EndpointBuilder, FlushHandle};
