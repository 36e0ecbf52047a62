//! Cycle outcomes and the events an endpoint emits

use super::connection::ConnectionState;
use std::time::Duration;

/// Which delay the scheduler waits before the next cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cadence {
    /// Nothing was queued
    Idle,
    /// The server answered; look for more work right away
    Success,
    /// No response; back off before trying again
    TransportFailure,
}

/// Result of one scheduling cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The queue was empty
    Idle,

    /// The server answered with one reply per call
    Delivered {
        /// Calls in the batch
        calls: usize,
        /// Calls the server marked as failed
        failed: usize,
    },

    /// The batch never got a response
    TransportFailure {
        /// Calls in the batch, all failed
        calls: usize,
        /// Transport error message
        error: String,
    },

    /// The server answered with the wrong number of replies
    ProtocolViolation {
        /// Calls sent
        sent: usize,
        /// Replies received
        received: usize,
    },

    /// The endpoint shut down before serving the request
    Stopped,
}

impl CycleOutcome {
    /// Cadence selected by this outcome
    pub fn cadence(&self) -> Cadence {
        match self {
            CycleOutcome::Idle | CycleOutcome::Stopped => Cadence::Idle,
            CycleOutcome::Delivered { .. } | CycleOutcome::ProtocolViolation { .. } => {
                Cadence::Success
            }
            CycleOutcome::TransportFailure { .. } => Cadence::TransportFailure,
        }
    }

    /// Number of calls carried by the cycle's batch
    pub fn calls(&self) -> usize {
        match self {
            CycleOutcome::Idle | CycleOutcome::Stopped => 0,
            CycleOutcome::Delivered { calls, .. } => *calls,
            CycleOutcome::TransportFailure { calls, .. } => *calls,
            CycleOutcome::ProtocolViolation { sent, .. } => *sent,
        }
    }

    /// Label used for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Idle => "idle",
            CycleOutcome::Delivered { .. } => "delivered",
            CycleOutcome::TransportFailure { .. } => "transport_failure",
            CycleOutcome::ProtocolViolation { .. } => "protocol_violation",
            CycleOutcome::Stopped => "stopped",
        }
    }
}

/// Events emitted by an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointEvent {
    /// A cycle finished and the next one is scheduled
    CycleCompleted {
        /// What the cycle did
        outcome: CycleOutcome,
        /// Delay until the next cycle
        next_delay: Duration,
    },

    /// The connection state changed
    ConnectionChanged(ConnectionState),

    /// The scheduling loop exited
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence_selection() {
        assert_eq!(CycleOutcome::Idle.cadence(), Cadence::Idle);
        assert_eq!(
            CycleOutcome::Delivered {
                calls: 2,
                failed: 1
            }
            .cadence(),
            Cadence::Success
        );
        assert_eq!(
            CycleOutcome::TransportFailure {
                calls: 2,
                error: "refused".to_string()
            }
            .cadence(),
            Cadence::TransportFailure
        );
        assert_eq!(
            CycleOutcome::ProtocolViolation {
                sent: 2,
                received: 1
            }
            .cadence(),
            Cadence::Success
        );
    }

    #[test]
    fn test_calls_and_labels() {
        let outcome = CycleOutcome::ProtocolViolation {
            sent: 4,
            received: 3,
        };
        assert_eq!(outcome.calls(), 4);
        assert_eq!(outcome.label(), "protocol_violation");
        assert_eq!(CycleOutcome::Idle.calls(), 0);
    }
}
