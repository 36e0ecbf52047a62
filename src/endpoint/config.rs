//! Endpoint scheduling configuration

use super::cycle::Cadence;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay before re-checking an empty queue (50 ms)
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(50);

/// Delay after a delivered batch (immediate)
pub const DEFAULT_SUCCESS_DELAY: Duration = Duration::ZERO;

/// Fixed backoff after a transport failure (500 ms)
pub const DEFAULT_BACKOFF_DELAY: Duration = Duration::from_millis(500);

/// Default event channel capacity
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// When the connection hooks fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPolicy {
    /// Only when the connection state changes.
    ///
    /// The first outcome counts as a change, so a server that is down from
    /// the start fires `on_dead` once even though it was never up. Hooks
    /// must tolerate that redundant call.
    #[default]
    OnTransition,
    /// After every transport attempt
    EveryCycle,
}

/// What happens to a batch whose reply count does not match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolViolationPolicy {
    /// Fail every call of the batch with `CallError::Protocol`
    #[default]
    Report,
    /// Resolve nothing; callbacks stay silent and handles see `CallError::Dropped`
    Silent,
}

/// Endpoint configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    /// Delay used when a cycle found nothing to send
    pub idle_delay: Duration,

    /// Delay used after the server answered
    pub success_delay: Duration,

    /// Delay used after a transport failure
    pub backoff_delay: Duration,

    /// Connection hook triggering
    pub hook_policy: HookPolicy,

    /// Handling of mismatched reply arrays
    pub protocol_violation: ProtocolViolationPolicy,

    /// Event broadcast channel capacity
    pub event_channel_capacity: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            idle_delay: DEFAULT_IDLE_DELAY,
            success_delay: DEFAULT_SUCCESS_DELAY,
            backoff_delay: DEFAULT_BACKOFF_DELAY,
            hook_policy: HookPolicy::default(),
            protocol_violation: ProtocolViolationPolicy::default(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl EndpointConfig {
    /// Delay before the next cycle for a given cadence
    pub fn delay_for(&self, cadence: Cadence) -> Duration {
        match cadence {
            Cadence::Idle => self.idle_delay,
            Cadence::Success => self.success_delay,
            Cadence::TransportFailure => self.backoff_delay,
        }
    }

    /// Set the idle delay
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    /// Set the success delay
    pub fn with_success_delay(mut self, delay: Duration) -> Self {
        self.success_delay = delay;
        self
    }

    /// Set the backoff delay
    pub fn with_backoff_delay(mut self, delay: Duration) -> Self {
        self.backoff_delay = delay;
        self
    }

    /// Set the hook policy
    pub fn with_hook_policy(mut self, policy: HookPolicy) -> Self {
        self.hook_policy = policy;
        self
    }

    /// Set the protocol violation policy
    pub fn with_protocol_violation(mut self, policy: ProtocolViolationPolicy) -> Self {
        self.protocol_violation = policy;
        self
    }

    /// Set the event channel capacity
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays_are_distinct() {
        let config = EndpointConfig::default();
        let idle = config.delay_for(Cadence::Idle);
        let success = config.delay_for(Cadence::Success);
        let backoff = config.delay_for(Cadence::TransportFailure);

        assert_eq!(idle, Duration::from_millis(50));
        assert_eq!(success, Duration::ZERO);
        assert_eq!(backoff, Duration::from_millis(500));
        assert!(success < idle && idle < backoff);
    }

    #[test]
    fn test_builder() {
        let config = EndpointConfig::default()
            .with_idle_delay(Duration::from_millis(10))
            .with_backoff_delay(Duration::from_secs(2))
            .with_hook_policy(HookPolicy::EveryCycle)
            .with_protocol_violation(ProtocolViolationPolicy::Silent);

        assert_eq!(config.delay_for(Cadence::Idle), Duration::from_millis(10));
        assert_eq!(
            config.delay_for(Cadence::TransportFailure),
            Duration::from_secs(2)
        );
        assert_eq!(config.hook_policy, HookPolicy::EveryCycle);
        assert_eq!(config.protocol_violation, ProtocolViolationPolicy::Silent);
    }

    #[test]
    fn test_policy_serde_names() {
        let policy: HookPolicy = serde_yaml::from_str("every_cycle").unwrap();
        assert_eq!(policy, HookPolicy::EveryCycle);

        let policy: ProtocolViolationPolicy = serde_yaml::from_str("silent").unwrap();
        assert_eq!(policy, ProtocolViolationPolicy::Silent);
    }
}
