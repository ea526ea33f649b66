use std::sync::{Condvar, Mutex};

use crate::error::BlobPipeError;

/// Set-once, read-many cell for the decoded stream header.
///
/// The first publish wins; later publishes are ignored, which lets the
/// producer's fallback path install a default value without clobbering a
/// header that was already decoded.
pub(crate) struct HeaderCell<H> {
    slot: Mutex<Option<H>>,
    ready: Condvar,
}

impl<H: Clone> HeaderCell<H> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    pub(crate) fn publish(&self, header: H) {
        let mut slot = self.slot.lock().expect("header cell mutex poisoned");
        if slot.is_none() {
            *slot = Some(header);
            self.ready.notify_all();
        }
    }

    /// Blocks until a header has been published and returns a clone of it.
    pub(crate) fn wait(&self) -> H {
        let mut slot = self.slot.lock().expect("header cell mutex poisoned");
        loop {
            if let Some(header) = slot.as_ref() {
                return header.clone();
            }
            slot = self.ready.wait(slot).expect("header cell mutex poisoned");
        }
    }
}

/// Holds the first failure recorded by the producer until a façade call
/// claims it.
pub(crate) struct FailureSlot {
    slot: Mutex<Option<BlobPipeError>>,
}

impl FailureSlot {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Records `error` unless an earlier failure is already stored.
    pub(crate) fn record(&self, error: BlobPipeError) {
        let mut slot = self.slot.lock().expect("failure slot mutex poisoned");
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    pub(crate) fn take(&self) -> Option<BlobPipeError> {
        self.slot
            .lock()
            .expect("failure slot mutex poisoned")
            .take()
    }
}
