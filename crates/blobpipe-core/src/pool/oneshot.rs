use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::BlobPipeError;
use crate::types::Result;

type TaskOutcome<T> = std::result::Result<T, String>;

/// Fulfilment side of a one-shot task cell. Write exactly once, then gone.
pub(crate) struct Promise<T> {
    tx: Sender<TaskOutcome<T>>,
}

/// Waiting side of a one-shot task cell. Read exactly once.
pub struct TaskHandle<T> {
    rx: Receiver<TaskOutcome<T>>,
}

pub(crate) fn pair<T>() -> (Promise<T>, TaskHandle<T>) {
    let (tx, rx) = bounded(1);
    (Promise { tx }, TaskHandle { rx })
}

impl<T> Promise<T> {
    pub(crate) fn complete(self, value: T) {
        let _ = self.tx.send(Ok(value));
    }

    /// Resolves the handle with a contained panic message.
    pub(crate) fn fail(self, panic: String) {
        let _ = self.tx.send(Err(panic));
    }
}

impl<T> TaskHandle<T> {
    /// Creates a handle that already holds `value`.
    pub fn ready(value: T) -> Self {
        let (promise, handle) = pair();
        promise.complete(value);
        handle
    }

    /// Blocks until the task resolves and returns its value.
    ///
    /// A contained panic and a task that was dropped unrun both come back as
    /// errors; a handle never hangs on a task that cannot complete.
    pub fn wait(self) -> Result<T> {
        match self.rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(panic)) => Err(BlobPipeError::TaskPanicked(panic)),
            Err(_) => Err(BlobPipeError::TaskDropped),
        }
    }
}
