//! Correlation of inbound responses with outstanding requests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::protocol::{Outcome, RequestId};

/// Caps the memory of timed-out ids kept for late-response diagnostics.
const MAX_ABANDONED: usize = 256;

#[derive(Default)]
struct Inner {
    waiters: HashMap<RequestId, oneshot::Sender<Outcome>>,
    abandoned: HashSet<RequestId>,
    closed: bool,
}

/// What happened to a response handed to [`PendingTable::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A waiter received it.
    Delivered,
    /// It answers a request whose caller already gave up.
    Late,
    /// Nobody ever asked for it.
    Unmatched,
}

/// Result slots for in-flight requests, shared by callers and the listener.
#[derive(Default)]
pub struct PendingTable {
    inner: Mutex<Inner>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the result slot for `id`. Must happen before the request is sent.
    pub fn register(&self, id: RequestId) -> Result<oneshot::Receiver<Outcome>> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(Error::ChannelClosed);
        }
        let (tx, rx) = oneshot::channel();
        inner.waiters.insert(id, tx);
        Ok(rx)
    }

    pub fn resolve(&self, id: &RequestId, outcome: Outcome) -> Delivery {
        let mut inner = self.lock();
        match inner.waiters.remove(id) {
            // A waiter that dropped its receiver lost interest; same as late.
            Some(tx) => match tx.send(outcome) {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Late,
            },
            None if inner.abandoned.remove(id) => Delivery::Late,
            None => Delivery::Unmatched,
        }
    }

    /// Drop the slot for `id` after its caller stopped waiting.
    pub fn abandon(&self, id: &RequestId) {
        let mut inner = self.lock();
        if inner.waiters.remove(id).is_some() {
            if inner.abandoned.len() >= MAX_ABANDONED {
                inner.abandoned.clear();
            }
            inner.abandoned.insert(id.clone());
        }
    }

    /// Drop the slot for a request that never reached the host.
    pub fn forget(&self, id: &RequestId) {
        self.lock().waiters.remove(id);
    }

    /// Fail every waiter and refuse new registrations.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.waiters.clear();
        inner.abandoned.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Every critical section leaves the maps consistent, so a poisoned
        // lock is still safe to use.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
