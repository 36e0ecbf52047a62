//! Pending call queue
//!
//! Insertion order is the contract for matching replies to callers. The
//! scheduler takes the whole queue in one step, so a call pushed while a batch
//! is in flight always lands in the next batch.

use super::call::PendingCall;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    calls: Vec<PendingCall>,
    closed: bool,
}

#[derive(Default)]
pub(crate) struct PendingQueue {
    inner: Mutex<Inner>,
}

impl PendingQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Poisoning only means a panic elsewhere; the Vec itself is intact.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a call. A closed queue hands the call back.
    pub(crate) fn push(&self, call: PendingCall) -> Result<usize, PendingCall> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(call);
        }
        inner.calls.push(call);
        Ok(inner.calls.len())
    }

    /// Take every queued call, leaving a fresh empty queue
    pub(crate) fn take(&self) -> Vec<PendingCall> {
        std::mem::take(&mut self.lock().calls)
    }

    /// Refuse further pushes and return what was still queued
    pub(crate) fn close(&self) -> Vec<PendingCall> {
        let mut inner = self.lock();
        inner.closed = true;
        std::mem::take(&mut inner.calls)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().calls.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn payloads(calls: Vec<PendingCall>) -> Vec<Value> {
        calls.into_iter().map(|c| c.into_parts().0).collect()
    }

    #[test]
    fn test_take_preserves_order_and_resets() {
        let queue = PendingQueue::new();
        for i in 0..3 {
            let (call, _handle) = PendingCall::with_channel(json!(i));
            assert_eq!(queue.push(call).ok(), Some(i + 1));
        }

        assert_eq!(payloads(queue.take()), vec![json!(0), json!(1), json!(2)]);
        assert_eq!(queue.len(), 0);

        let (call, _handle) = PendingCall::with_channel(json!("next"));
        let _ = queue.push(call);
        assert_eq!(payloads(queue.take()), vec![json!("next")]);
    }

    #[test]
    fn test_closed_queue_rejects_push() {
        let queue = PendingQueue::new();
        let (call, _handle) = PendingCall::with_channel(json!(1));
        let _ = queue.push(call);

        let leftover = queue.close();
        assert_eq!(leftover.len(), 1);
        assert!(queue.is_closed());

        let (call, _handle) = PendingCall::with_channel(json!(2));
        assert!(queue.push(call).is_err());
        assert_eq!(queue.len(), 0);
    }
}
