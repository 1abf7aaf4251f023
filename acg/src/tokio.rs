//! Async utilities around Tokio runtime, the public API of this crate is blocking and
//! every async operation is driven to completion from here.

use std::future::Future;
use std::time::Duration;
use std::sync::Arc;
use std::io;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;


/// Build a current-thread Tokio runtime with time and I/O enabled.
pub fn runtime() -> io::Result<Runtime> {
    Builder::new_current_thread()
        .enable_time()
        .enable_io()
        .build()
}

/// Block on the given future with a new Tokio runtime.
pub fn sync<F: Future>(future: F) -> io::Result<F::Output> {
    Ok(runtime()?.block_on(future))
}

/// Sleep for the given duration, unless the cancel handle is triggered before, in which
/// case this returns false as soon as possible.
pub async fn sleep(duration: Duration, cancel: &Cancel) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// A cloneable cancellation handle, it can be triggered from any thread (a Ctrl-C 
/// handler for example) and is observed by blocking operations that support it.
/// Once cancelled, a handle can't be reset.
#[derive(Debug, Clone)]
pub struct Cancel {
    inner: Arc<watch::Sender<bool>>,
}

impl Cancel {

    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { inner: Arc::new(tx) }
    }

    /// Trigger cancellation, waking any task currently waiting on this handle.
    pub fn cancel(&self) {
        self.inner.send_replace(true);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        *self.inner.borrow()
    }

    /// Return a future that completes when this handle is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.subscribe();
        // The sender is owned by self, the channel can't be closed while waiting.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

}

impl Default for Cancel {
    fn default() -> Self {
        Self::new()
    }
}
