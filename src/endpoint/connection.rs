//! Connection state tracking and the alive/dead hooks

use super::call::guard_callback;
use super::config::HookPolicy;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Connection state derived from the most recent transport attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No batch has been attempted yet
    #[default]
    Unknown,
    /// The last batch got a response
    Alive,
    /// The last batch got no response
    Dead,
}

impl ConnectionState {
    pub fn is_alive(self) -> bool {
        self == ConnectionState::Alive
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Unknown => write!(f, "unknown"),
            ConnectionState::Alive => write!(f, "alive"),
            ConnectionState::Dead => write!(f, "dead"),
        }
    }
}

/// A no-argument connection hook. Hooks may be called redundantly.
pub type ConnectionHook = Arc<dyn Fn() + Send + Sync + 'static>;

/// Optional hooks fired when a batch reaches or misses the server
#[derive(Clone, Default)]
pub struct ConnectionHooks {
    on_alive: Option<ConnectionHook>,
    on_dead: Option<ConnectionHook>,
}

impl ConnectionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hook fired when the server responds
    pub fn on_alive(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_alive = Some(Arc::new(hook));
        self
    }

    /// Set the hook fired when a batch gets no response
    pub fn on_dead(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_dead = Some(Arc::new(hook));
        self
    }

    fn fire(&self, state: ConnectionState) {
        let hook = match state {
            ConnectionState::Alive => self.on_alive.as_ref(),
            ConnectionState::Dead => self.on_dead.as_ref(),
            ConnectionState::Unknown => None,
        };
        if let Some(hook) = hook {
            guard_callback(|| hook());
        }
    }
}

impl fmt::Debug for ConnectionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHooks")
            .field("on_alive", &self.on_alive.is_some())
            .field("on_dead", &self.on_dead.is_some())
            .finish()
    }
}

/// Owns the connection state and decides when hooks fire
pub(crate) struct ConnectionTracker {
    state: watch::Sender<ConnectionState>,
    hooks: ConnectionHooks,
    policy: HookPolicy,
}

impl ConnectionTracker {
    pub(crate) fn new(hooks: ConnectionHooks, policy: HookPolicy) -> Self {
        let (state, _) = watch::channel(ConnectionState::Unknown);
        Self {
            state,
            hooks,
            policy,
        }
    }

    pub(crate) fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Record a transport outcome. Returns true when the state changed.
    pub(crate) fn record(&self, next: ConnectionState) -> bool {
        let previous = self.state.send_replace(next);
        let changed = previous != next;
        if changed || self.policy == HookPolicy::EveryCycle {
            self.hooks.fire(next);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_hooks() -> (ConnectionHooks, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let alive = Arc::new(AtomicUsize::new(0));
        let dead = Arc::new(AtomicUsize::new(0));
        let a = alive.clone();
        let d = dead.clone();
        let hooks = ConnectionHooks::new()
            .on_alive(move || {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .on_dead(move || {
                d.fetch_add(1, Ordering::SeqCst);
            });
        (hooks, alive, dead)
    }

    #[test]
    fn test_transition_policy_fires_on_change_only() {
        let (hooks, alive, dead) = counting_hooks();
        let tracker = ConnectionTracker::new(hooks, HookPolicy::OnTransition);

        assert!(tracker.record(ConnectionState::Alive));
        assert!(!tracker.record(ConnectionState::Alive));
        assert!(tracker.record(ConnectionState::Dead));
        assert!(!tracker.record(ConnectionState::Dead));
        assert!(tracker.record(ConnectionState::Alive));

        assert_eq!(alive.load(Ordering::SeqCst), 2);
        assert_eq!(dead.load(Ordering::SeqCst), 1);
        assert!(tracker.current().is_alive());
    }

    #[test]
    fn test_first_failure_fires_dead_hook() {
        let (hooks, alive, dead) = counting_hooks();
        let tracker = ConnectionTracker::new(hooks, HookPolicy::OnTransition);

        tracker.record(ConnectionState::Dead);

        assert_eq!(alive.load(Ordering::SeqCst), 0);
        assert_eq!(dead.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_every_cycle_policy() {
        let (hooks, alive, _) = counting_hooks();
        let tracker = ConnectionTracker::new(hooks, HookPolicy::EveryCycle);

        tracker.record(ConnectionState::Alive);
        tracker.record(ConnectionState::Alive);
        tracker.record(ConnectionState::Alive);

        assert_eq!(alive.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_watch_receiver_sees_changes() {
        let tracker = ConnectionTracker::new(ConnectionHooks::new(), HookPolicy::OnTransition);
        let rx = tracker.subscribe();
        assert_eq!(*rx.borrow(), ConnectionState::Unknown);

        tracker.record(ConnectionState::Dead);
        assert_eq!(*rx.borrow(), ConnectionState::Dead);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Alive.to_string(), "alive");
        assert_eq!(ConnectionState::Dead.to_string(), "dead");
        assert_eq!(ConnectionState::Unknown.to_string(), "unknown");
    }
}
