//! Input capture infrastructure for the server application.
//!
//! On Windows, this installs low-level keyboard and mouse hooks (WH_KEYBOARD_LL,
//! WH_MOUSE_LL) on a dedicated Win32 message loop thread.  Raw events are
//! pushed into the event channel handed to [`InputSource::start`] and consumed
//! by the Tokio runtime.
//!
//! The same channel carries [`RawInputEvent::Marker`]s posted by the event
//! order guard, so a marker is always dequeued after every event captured
//! before it was posted.
//!
//! # Windows-Specific Implementation
//!
//! The hook callbacks must complete within ~300ms or Windows will remove the hook.
//! All processing is deferred out of the callback via the channel.
//!
//! # Testability
//!
//! The `InputSource` trait allows unit tests to inject synthetic events without
//! requiring Windows hooks.

use keyrelay_core::protocol::{BUTTON_LEFT, BUTTON_MIDDLE, BUTTON_RIGHT};
use keyrelay_core::{Mark, NativeKey};
use tokio::sync::mpsc::UnboundedSender;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// A raw input event produced by the input capture infrastructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInputEvent {
    /// A key was pressed down.  Auto-repeat arrives as further downs.
    KeyDown {
        key: NativeKey,
        /// Milliseconds since system start (from the hook struct).
        time_ms: u32,
    },
    /// A key was released.
    KeyUp { key: NativeKey, time_ms: u32 },
    /// The mouse cursor moved to an absolute screen position.
    MouseMove {
        /// Absolute X in virtual screen coordinates (multi-monitor aware).
        x: i32,
        /// Absolute Y in virtual screen coordinates.
        y: i32,
        time_ms: u32,
    },
    /// A mouse button was pressed.
    MouseButtonDown { button: MouseButton, time_ms: u32 },
    /// A mouse button was released.
    MouseButtonUp { button: MouseButton, time_ms: u32 },
    /// The vertical mouse wheel was scrolled.
    MouseWheel {
        /// Scroll delta; positive = away from user, negative = toward user.
        delta: i16,
        time_ms: u32,
    },
    /// The horizontal mouse wheel was scrolled.
    MouseWheelH {
        /// Scroll delta; positive = right, negative = left.
        delta: i16,
        time_ms: u32,
    },
    /// A focus-transition marker coming back through the queue.
    Marker(Mark),
}

/// Mouse button identifier used in [`RawInputEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Protocol button id.
    pub fn id(self) -> u8 {
        match self {
            MouseButton::Left => BUTTON_LEFT,
            MouseButton::Middle => BUTTON_MIDDLE,
            MouseButton::Right => BUTTON_RIGHT,
        }
    }
}

/// Error type for input capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to install keyboard hook: {0}")]
    KeyboardHookInstallFailed(String),
    #[error("failed to install mouse hook: {0}")]
    MouseHookInstallFailed(String),
    #[error("capture service has already been started")]
    AlreadyStarted,
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

/// Trait abstracting input event production.
///
/// The production implementation uses Windows hooks; tests use [`mock::MockInputSource`].
pub trait InputSource: Send + Sync {
    /// Starts capturing; every event is sent on `events`.
    fn start(&self, events: UnboundedSender<RawInputEvent>) -> Result<(), CaptureError>;
    /// Stops the input source and releases all OS resources.
    fn stop(&self);
    /// While set, captured events are withheld from the local system.
    fn set_suppressing(&self, suppress: bool);
}
