//! Result delivery guarded by the lifetime of the view that asked for it
//!
//! Requests are never aborted mid-flight: once a protocol step is sent it
//! runs to completion. What changes is whether its result is still wanted.
//! A [`LiveSlot`] only stores a result when its [`ViewLifetime`] is still
//! open and no newer request was started on the same slot.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lifetime of one view (a screen, a modal, a CLI invocation)
#[derive(Debug, Clone, Default)]
pub struct ViewLifetime {
    token: CancellationToken,
}

impl ViewLifetime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the view as gone; pending results will be dropped on arrival
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_open(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Resolves once the view is closed
    pub async fn closed(&self) {
        self.token.cancelled().await
    }

    /// A result slot tied to this lifetime
    pub fn slot<T>(&self) -> LiveSlot<T> {
        LiveSlot {
            token: self.token.clone(),
            generation: Arc::new(AtomicU64::new(0)),
            value: Arc::new(Mutex::new(None)),
        }
    }
}

/// Handle of one request started on a [`LiveSlot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Latest-wins holder for the result of an asynchronous request
#[derive(Debug)]
pub struct LiveSlot<T> {
    token: CancellationToken,
    generation: Arc<AtomicU64>,
    value: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for LiveSlot<T> {
    fn clone(&self) -> Self {
        Self {
            token: self.token.clone(),
            generation: Arc::clone(&self.generation),
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> LiveSlot<T> {
    /// Start a request; any earlier ticket becomes stale
    pub fn begin(&self) -> Ticket {
        Ticket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Store `value` if the view is open and `ticket` is the latest request.
    ///
    /// Returns whether the value was kept.
    pub fn deliver(&self, ticket: Ticket, value: T) -> bool {
        if self.token.is_cancelled() {
            debug!("View closed, dropping result");
            return false;
        }
        if self.generation.load(Ordering::SeqCst) != ticket.0 {
            debug!("Superseded request, dropping result");
            return false;
        }
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
        true
    }

    /// Run `request` to completion, then deliver its output
    pub async fn run<F>(&self, request: F) -> bool
    where
        F: Future<Output = T>,
    {
        let ticket = self.begin();
        let value = request.await;
        self.deliver(ticket, value)
    }

    /// Take the delivered value, if any
    pub fn take(&self) -> Option<T> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
