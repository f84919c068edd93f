//! Single in-flight send with skip-if-busy backpressure.
//!
//! Only the latest scene state matters to a receiver, so a new send is
//! dropped rather than queued while the previous one is still running.
//!
//! ```ignore
//! let mut slot = SendSlot::new();
//! // once per frame
//! let bytes = scene.to_bytes(&Deflate::default())?;
//! if !slot.try_begin(move || transport.post(bytes)) {
//!     // previous frame still uploading; this one is skipped
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::mpsc;
use std::task::{Context, Poll};

/// Result of a send running on a worker thread.
///
/// Polls a channel, so it can be checked from a frame loop or awaited with
/// a no-op waker.
pub struct SendHandle<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> SendHandle<T> {
    pub fn new(receiver: mpsc::Receiver<T>) -> Self {
        Self { receiver }
    }

    /// `Ok(Some)` once finished, `Ok(None)` while running, `Err` if the
    /// worker went away without a result.
    fn poll_result(&self) -> Result<Option<T>, mpsc::RecvError> {
        match self.receiver.try_recv() {
            Ok(v) => Ok(Some(v)),
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => Err(mpsc::RecvError),
        }
    }

    /// Blocks until the send completes.
    pub fn wait(self) -> Option<T> {
        self.receiver.recv().ok()
    }
}

impl<T> Future for SendHandle<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<T>> {
        match self.poll_result() {
            Ok(Some(v)) => Poll::Ready(Some(v)),
            Ok(None) => Poll::Pending,
            Err(_) => Poll::Ready(None),
        }
    }
}

/// Holds at most one running send.
pub struct SendSlot<T> {
    in_flight: Option<SendHandle<T>>,
    last: Option<T>,
    skipped: u64,
}

impl<T: Send + 'static> Default for SendSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> SendSlot<T> {
    pub fn new() -> Self {
        Self {
            in_flight: None,
            last: None,
            skipped: 0,
        }
    }

    /// Collects a finished send. Returns `true` while one is still running.
    pub fn is_busy(&mut self) -> bool {
        let Some(handle) = &self.in_flight else {
            return false;
        };
        match handle.poll_result() {
            Ok(None) => true,
            Ok(Some(v)) => {
                self.last = Some(v);
                self.in_flight = None;
                false
            }
            Err(_) => {
                log::warn!("send worker exited without a result");
                self.in_flight = None;
                false
            }
        }
    }

    /// Starts `send` on a worker thread unless a send is already running.
    ///
    /// Returns `false` if the call was skipped.
    pub fn try_begin<F>(&mut self, send: F) -> bool
    where
        F: FnOnce() -> T + Send + 'static,
    {
        if self.is_busy() {
            self.skipped += 1;
            log::debug!("send in flight, skipping ({} skipped so far)", self.skipped);
            return false;
        }
        let (tx, rx) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("meshlink-send".into())
            .spawn(move || {
                // The slot may have been dropped; nobody is waiting then.
                let _ = tx.send(send());
            });
        match spawned {
            Ok(_) => {
                self.in_flight = Some(SendHandle::new(rx));
                true
            }
            Err(e) => {
                log::warn!("failed to start send worker: {e}");
                false
            }
        }
    }

    /// Blocks until the running send, if any, completes.
    pub fn wait(&mut self) -> Option<&T> {
        if let Some(handle) = self.in_flight.take() {
            self.last = handle.wait();
        }
        self.last.as_ref()
    }

    /// Result of the most recently completed send.
    pub fn take_result(&mut self) -> Option<T> {
        self.is_busy();
        self.last.take()
    }

    /// Number of sends dropped because another was running.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
