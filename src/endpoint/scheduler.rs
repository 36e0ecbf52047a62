//! Scheduling loop
//!
//! One task per endpoint. Each iteration waits on a single sleep (the only
//! outstanding schedule), an out-of-band flush request, or cancellation; then
//! runs one cycle and picks the next delay from the cycle's [`Cadence`].
//! The transport call is awaited inline, so cycles never overlap.

use super::call::{CallError, Responder};
use super::config::{EndpointConfig, ProtocolViolationPolicy};
use super::connection::ConnectionState;
use super::cycle::{CycleOutcome, EndpointEvent};
use super::handle::Shared;
use crate::metrics;
use crate::transport::{BatchTransport, CallReply};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Commands sent from endpoint handles to the scheduler
pub(crate) enum SchedulerCommand {
    /// Run a cycle now; report its outcome if a sender is attached
    Flush(Option<oneshot::Sender<CycleOutcome>>),
}

pub(crate) struct Scheduler {
    shared: Arc<Shared>,
    transport: Arc<dyn BatchTransport>,
    config: EndpointConfig,
    commands: mpsc::UnboundedReceiver<SchedulerCommand>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub(crate) fn new(
        shared: Arc<Shared>,
        transport: Arc<dyn BatchTransport>,
        config: EndpointConfig,
        commands: mpsc::UnboundedReceiver<SchedulerCommand>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared,
            transport,
            config,
            commands,
            cancel,
        }
    }

    /// Run until cancelled or until every endpoint handle is dropped
    pub(crate) async fn run(mut self) {
        tracing::debug!(endpoint = %self.shared.address, "Scheduling loop started");

        // The first cycle fires immediately.
        let mut next_delay = Duration::ZERO;

        loop {
            let sleep = tokio::time::sleep(next_delay);
            tokio::pin!(sleep);

            let waiters = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.collect_flush_waiters(command),
                    None => break,
                },
                _ = &mut sleep => Vec::new(),
            };

            let outcome = self.run_cycle().await;
            next_delay = self.config.delay_for(outcome.cadence());

            for waiter in waiters {
                let _ = waiter.send(outcome.clone());
            }

            self.shared.emit(EndpointEvent::CycleCompleted {
                outcome,
                next_delay,
            });
        }

        self.stop();
    }

    /// Gather every flush request already queued; one cycle serves them all.
    fn collect_flush_waiters(
        &mut self,
        first: SchedulerCommand,
    ) -> Vec<oneshot::Sender<CycleOutcome>> {
        let mut waiters = Vec::new();
        let mut next = Some(first);
        while let Some(SchedulerCommand::Flush(done)) = next {
            waiters.extend(done);
            next = self.commands.try_recv().ok();
        }
        waiters
    }

    /// One cycle: take the queue, send it, fan out the replies.
    pub(crate) async fn run_cycle(&self) -> CycleOutcome {
        let address = self.shared.address.as_str();
        let calls = self.shared.queue.take();
        if calls.is_empty() {
            tracing::trace!(endpoint = address, "Idle cycle");
            return CycleOutcome::Idle;
        }
        metrics::set_queue_depth(address, self.shared.queue.len());

        let (payloads, responders): (Vec<Value>, Vec<Responder>) =
            calls.into_iter().map(|call| call.into_parts()).unzip();
        let sent = payloads.len();

        tracing::debug!(endpoint = address, calls = sent, "Flushing batch");

        let start = Instant::now();
        let result = self.transport.send_batch(address, &payloads).await;
        let elapsed = start.elapsed().as_secs_f64();

        let outcome = match result {
            Ok(replies) => {
                self.record_connection(ConnectionState::Alive);
                if replies.len() == sent {
                    self.deliver(responders, replies)
                } else {
                    self.protocol_violation(responders, sent, replies.len())
                }
            }
            Err(e) => {
                self.record_connection(ConnectionState::Dead);
                let error = e.to_string();
                tracing::warn!(
                    endpoint = address,
                    calls = sent,
                    error = %error,
                    "Batch failed; backing off"
                );
                for responder in responders {
                    responder.fail(CallError::Transport(error.clone()));
                }
                metrics::record_calls(address, "transport_failure", sent);
                CycleOutcome::TransportFailure { calls: sent, error }
            }
        };

        metrics::record_batch(address, outcome.label(), elapsed);
        outcome
    }

    fn deliver(&self, responders: Vec<Responder>, replies: Vec<CallReply>) -> CycleOutcome {
        let address = self.shared.address.as_str();
        let calls = responders.len();
        let mut failed = 0;

        for (responder, reply) in responders.into_iter().zip(replies) {
            if reply.success {
                responder.succeed(reply.result);
            } else {
                failed += 1;
                tracing::error!(
                    endpoint = address,
                    error = reply.error.as_deref().unwrap_or("unknown error"),
                    "Server error"
                );
                responder.fail(CallError::Rejected { error: reply.error });
            }
        }

        metrics::record_calls(address, "success", calls - failed);
        metrics::record_calls(address, "rejected", failed);
        tracing::debug!(endpoint = address, calls, failed, "Batch delivered");

        CycleOutcome::Delivered { calls, failed }
    }

    fn protocol_violation(
        &self,
        responders: Vec<Responder>,
        sent: usize,
        received: usize,
    ) -> CycleOutcome {
        let address = self.shared.address.as_str();
        tracing::error!(
            endpoint = address,
            sent,
            received,
            "Did not receive the correct number of responses from server"
        );

        match self.config.protocol_violation {
            ProtocolViolationPolicy::Report => {
                for responder in responders {
                    responder.fail(CallError::Protocol { sent, received });
                }
                metrics::record_calls(address, "protocol_violation", sent);
            }
            ProtocolViolationPolicy::Silent => {
                for responder in responders {
                    responder.discard();
                }
                metrics::record_calls(address, "dropped", sent);
            }
        }

        CycleOutcome::ProtocolViolation { sent, received }
    }

    fn record_connection(&self, state: ConnectionState) {
        let address = self.shared.address.as_str();
        if self.shared.connection.record(state) {
            match state {
                ConnectionState::Alive => tracing::info!(endpoint = address, "Connection alive"),
                _ => tracing::warn!(endpoint = address, "Lost connection"),
            }
            metrics::set_connection_alive(address, state.is_alive());
            self.shared.emit(EndpointEvent::ConnectionChanged(state));
        }
    }

    /// Close the queue and discard whatever never got sent
    fn stop(&mut self) {
        let leftover = self.shared.queue.close();
        let dropped = leftover.len();
        for call in leftover {
            call.into_parts().1.discard();
        }
        self.commands.close();
        while let Ok(SchedulerCommand::Flush(done)) = self.commands.try_recv() {
            if let Some(done) = done {
                let _ = done.send(CycleOutcome::Stopped);
            }
        }

        metrics::set_queue_depth(&self.shared.address, 0);
        tracing::debug!(
            endpoint = %self.shared.address,
            dropped,
            "Scheduling loop stopped"
        );
        self.shared.emit(EndpointEvent::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::connection::ConnectionHooks;
    use crate::endpoint::call::PendingCall;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replies with whatever the test queued, one entry per batch
    struct Canned {
        replies: Mutex<Vec<Result<Vec<CallReply>, TransportError>>>,
    }

    #[async_trait]
    impl BatchTransport for Canned {
        async fn send_batch(
            &self,
            _address: &str,
            _payloads: &[Value],
        ) -> Result<Vec<CallReply>, TransportError> {
            self.replies.lock().unwrap().remove(0)
        }
    }

    fn scheduler(
        replies: Vec<Result<Vec<CallReply>, TransportError>>,
        config: EndpointConfig,
    ) -> Scheduler {
        let shared = Arc::new(Shared::new(
            "http://test/scheduler".to_string(),
            ConnectionHooks::new(),
            &config,
        ));
        let (_tx, rx) = mpsc::unbounded_channel();
        Scheduler::new(
            shared,
            Arc::new(Canned {
                replies: Mutex::new(replies),
            }),
            config,
            rx,
            CancellationToken::new(),
        )
    }

    fn enqueue(scheduler: &Scheduler, payload: Value) -> crate::endpoint::CallHandle {
        let (call, handle) = PendingCall::with_channel(payload);
        let _ = scheduler.shared.queue.push(call);
        handle
    }

    #[tokio::test]
    async fn test_empty_queue_is_idle() {
        let scheduler = scheduler(vec![], EndpointConfig::default());
        assert_eq!(scheduler.run_cycle().await, CycleOutcome::Idle);
    }

    #[tokio::test]
    async fn test_partial_failure() {
        let scheduler = scheduler(
            vec![Ok(vec![
                CallReply::ok(json!("a")),
                CallReply::err("bad"),
                CallReply::ok(json!("c")),
            ])],
            EndpointConfig::default(),
        );
        let first = enqueue(&scheduler, json!(0));
        let second = enqueue(&scheduler, json!(1));
        let third = enqueue(&scheduler, json!(2));

        let outcome = scheduler.run_cycle().await;

        assert_eq!(outcome, CycleOutcome::Delivered { calls: 3, failed: 1 });
        assert_eq!(first.await, Ok(json!("a")));
        assert_eq!(
            second.await,
            Err(CallError::Rejected {
                error: Some("bad".to_string())
            })
        );
        assert_eq!(third.await, Ok(json!("c")));
        assert!(scheduler.shared.connection.current().is_alive());
    }

    #[tokio::test]
    async fn test_transport_failure_marks_dead() {
        let scheduler = scheduler(
            vec![Err(TransportError::Unavailable("down".to_string()))],
            EndpointConfig::default(),
        );
        let handle = enqueue(&scheduler, json!(0));

        let outcome = scheduler.run_cycle().await;

        assert!(matches!(
            outcome,
            CycleOutcome::TransportFailure { calls: 1, .. }
        ));
        assert!(matches!(handle.await, Err(CallError::Transport(_))));
        assert_eq!(scheduler.shared.connection.current(), ConnectionState::Dead);
    }

    #[tokio::test]
    async fn test_silent_violation_drops_calls() {
        let scheduler = scheduler(
            vec![Ok(vec![])],
            EndpointConfig::default().with_protocol_violation(ProtocolViolationPolicy::Silent),
        );
        let handle = enqueue(&scheduler, json!(0));

        let outcome = scheduler.run_cycle().await;

        assert_eq!(
            outcome,
            CycleOutcome::ProtocolViolation {
                sent: 1,
                received: 0
            }
        );
        assert_eq!(handle.await, Err(CallError::Dropped));
    }
}
