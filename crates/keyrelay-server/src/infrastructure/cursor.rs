//! Cursor control adapters for [`CursorController`].

use std::sync::Mutex;

use crate::application::forward_input::CursorController;

/// A cursor that lives only in memory, for platforms without a backend.
///
/// Teleports are remembered so the reported position stays consistent.
#[derive(Debug)]
pub struct VirtualCursor {
    size: (i32, i32),
    pos: Mutex<(i32, i32)>,
}

impl VirtualCursor {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            size: (width, height),
            pos: Mutex::new((width / 2, height / 2)),
        }
    }
}

impl CursorController for VirtualCursor {
    fn teleport_cursor(&self, x: i32, y: i32) {
        *self.pos.lock().unwrap_or_else(|e| e.into_inner()) = (x, y);
    }

    fn get_cursor_pos(&self) -> (i32, i32) {
        *self.pos.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn screen_size(&self) -> (i32, i32) {
        self.size
    }
}

#[cfg(target_os = "windows")]
pub use self::windows::WindowsCursorController;

#[cfg(target_os = "windows")]
mod windows {
    use tracing::warn;
    use windows::Win32::Foundation::POINT;
    use windows::Win32::UI::WindowsAndMessaging::{
        GetCursorPos, GetSystemMetrics, SetCursorPos, SM_CXSCREEN, SM_CYSCREEN,
    };

    use crate::application::forward_input::CursorController;

    /// Moves the real cursor with `SetCursorPos`.
    #[derive(Debug, Default)]
    pub struct WindowsCursorController;

    impl WindowsCursorController {
        pub fn new() -> Self {
            Self
        }
    }

    impl CursorController for WindowsCursorController {
        fn teleport_cursor(&self, x: i32, y: i32) {
            // SAFETY: SetCursorPos takes plain integers and has no memory effects.
            if let Err(e) = unsafe { SetCursorPos(x, y) } {
                warn!(x, y, "SetCursorPos failed: {e}");
            }
        }

        fn get_cursor_pos(&self) -> (i32, i32) {
            let mut pt = POINT::default();
            // SAFETY: pt is a valid, writable POINT for the duration of the call.
            match unsafe { GetCursorPos(&mut pt) } {
                Ok(()) => (pt.x, pt.y),
                Err(e) => {
                    warn!("GetCursorPos failed: {e}");
                    (0, 0)
                }
            }
        }

        fn screen_size(&self) -> (i32, i32) {
            // SAFETY: GetSystemMetrics only reads system state.
            unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_cursor_starts_centred_and_remembers_teleports() {
        // Arrange
        let cursor = VirtualCursor::new(1920, 1080);

        // Act
        let start = cursor.get_cursor_pos();
        cursor.teleport_cursor(5, 7);

        // Assert
        assert_eq!(start, (960, 540));
        assert_eq!(cursor.get_cursor_pos(), (5, 7));
        assert_eq!(cursor.screen_size(), (1920, 1080));
    }
}
