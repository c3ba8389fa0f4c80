//! Mock input source for unit testing.
//!
//! Allows tests to inject synthetic [`RawInputEvent`]s without requiring
//! a running Windows message loop or OS hooks.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use tokio::sync::mpsc::UnboundedSender;

use super::{CaptureError, InputSource, RawInputEvent};

/// A mock implementation of [`InputSource`] that allows tests to inject events.
#[derive(Default)]
pub struct MockInputSource {
    sender: Mutex<Option<UnboundedSender<RawInputEvent>>>,
    suppressing: AtomicBool,
}

impl MockInputSource {
    /// Creates a new mock input source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Injects a synthetic event, as if captured from hardware.
    ///
    /// Panics if `start()` has not been called or if `stop()` has been called.
    pub fn inject_event(&self, event: RawInputEvent) {
        let guard = self.sender.lock().expect("lock poisoned");
        match *guard {
            Some(ref sender) => sender
                .send(event)
                .expect("receiver has been dropped"),
            None => panic!("MockInputSource::inject_event called before start()"),
        }
    }

    /// Whether the last [`InputSource::set_suppressing`] call turned suppression on.
    pub fn is_suppressing(&self) -> bool {
        self.suppressing.load(Ordering::SeqCst)
    }
}

impl InputSource for MockInputSource {
    fn start(&self, events: UnboundedSender<RawInputEvent>) -> Result<(), CaptureError> {
        let mut guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }
        *guard = Some(events);
        Ok(())
    }

    fn stop(&self) {
        *self.sender.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn set_suppressing(&self, suppress: bool) {
        self.suppressing.store(suppress, Ordering::SeqCst);
    }
}
