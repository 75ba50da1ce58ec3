//! Processing flag - true while any network call of a flow is outstanding
//!
//! Read calls hold a shared guard. Mutating calls (appointment creation,
//! payment intent, provider confirmation) take an exclusive guard, which
//! fails with [`ClientError::Busy`] while anything else is in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

use crate::{ClientError, ClientResult};

struct Inner {
    outstanding: AtomicUsize,
    tx: watch::Sender<bool>,
}

/// Shared processing flag
#[derive(Clone)]
pub struct ProcessingFlag {
    inner: Arc<Inner>,
}

impl Default for ProcessingFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessingFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingFlag")
            .field("outstanding", &self.inner.outstanding.load(Ordering::SeqCst))
            .finish()
    }
}

impl ProcessingFlag {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                outstanding: AtomicUsize::new(0),
                tx,
            }),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.inner.outstanding.load(Ordering::SeqCst) > 0
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.tx.subscribe()
    }

    /// Mark a read call as outstanding
    pub fn begin(&self) -> ProcessingGuard {
        if self.inner.outstanding.fetch_add(1, Ordering::SeqCst) == 0 {
            self.inner.tx.send_replace(true);
        }
        ProcessingGuard {
            inner: self.inner.clone(),
        }
    }

    /// Mark a mutating call as outstanding, refusing if anything else is
    pub fn try_begin_exclusive(&self) -> ClientResult<ProcessingGuard> {
        self.inner
            .outstanding
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ClientError::Busy)?;
        self.inner.tx.send_replace(true);
        Ok(ProcessingGuard {
            inner: self.inner.clone(),
        })
    }
}

/// Clears the flag on drop when it was the last outstanding call
#[must_use = "the flag is cleared when the guard is dropped"]
pub struct ProcessingGuard {
    inner: Arc<Inner>,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        if self.inner.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.tx.send_replace(false);
        }
    }
}
