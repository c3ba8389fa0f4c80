//! Windows input emulation via the SendInput API.
//!
//! Native keys are already Windows virtual-key codes, so keystrokes are
//! injected as-is with `KEYEVENTF_EXTENDEDKEY` set from the key's extended
//! flag.  Absolute mouse coordinates are normalized to the Windows virtual
//! screen space [0, 65535].

#![cfg(target_os = "windows")]

use keyrelay_core::protocol::{BUTTON_LEFT, BUTTON_MIDDLE, BUTTON_RIGHT};
use keyrelay_core::Keystroke;
use tracing::warn;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_HWHEEL,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP,
    MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_VIRTUALDESK,
    MOUSEEVENTF_WHEEL, MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN,
};

use crate::application::emulate_input::PlatformInputEmulator;

/// Windows implementation of [`PlatformInputEmulator`] using SendInput.
#[derive(Debug, Default)]
pub struct WindowsInputEmulator;

impl WindowsInputEmulator {
    pub fn new() -> Self {
        Self
    }
}

impl PlatformInputEmulator for WindowsInputEmulator {
    fn emit_keystroke(&self, stroke: Keystroke) {
        let mut flags = KEYBD_EVENT_FLAGS(0);
        if !stroke.press {
            flags |= KEYEVENTF_KEYUP;
        }
        if stroke.key.extended {
            flags |= KEYEVENTF_EXTENDEDKEY;
        }
        send(INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(stroke.key.code),
                    wScan: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        });
    }

    fn emit_mouse_move(&self, x: i32, y: i32) {
        let (norm_x, norm_y) = normalize_coords(x, y, virtual_screen_size());
        send(mouse_input(
            norm_x,
            norm_y,
            0,
            MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_VIRTUALDESK | MOUSEEVENTF_MOVE,
        ));
    }

    fn emit_mouse_relative_move(&self, dx: i32, dy: i32) {
        send(mouse_input(dx, dy, 0, MOUSEEVENTF_MOVE));
    }

    fn emit_mouse_button(&self, button: u8, pressed: bool) {
        let flags = match (button, pressed) {
            (BUTTON_LEFT, true) => MOUSEEVENTF_LEFTDOWN,
            (BUTTON_LEFT, false) => MOUSEEVENTF_LEFTUP,
            (BUTTON_MIDDLE, true) => MOUSEEVENTF_MIDDLEDOWN,
            (BUTTON_MIDDLE, false) => MOUSEEVENTF_MIDDLEUP,
            (BUTTON_RIGHT, true) => MOUSEEVENTF_RIGHTDOWN,
            (BUTTON_RIGHT, false) => MOUSEEVENTF_RIGHTUP,
            _ => {
                warn!(button, "unsupported mouse button ignored");
                return;
            }
        };
        send(mouse_input(0, 0, 0, flags));
    }

    fn emit_mouse_wheel(&self, x_delta: i16, y_delta: i16) {
        if y_delta != 0 {
            send(mouse_input(0, 0, i32::from(y_delta), MOUSEEVENTF_WHEEL));
        }
        if x_delta != 0 {
            send(mouse_input(0, 0, i32::from(x_delta), MOUSEEVENTF_HWHEEL));
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn mouse_input(dx: i32, dy: i32, data: i32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                // Wheel deltas are signed but travel in a DWORD.
                mouseData: data as u32,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send(input: INPUT) {
    // SAFETY: `input` is a fully initialized INPUT structure on the stack
    // and the size argument matches its type.
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent != 1 {
        warn!("SendInput rejected an event (blocked by UIPI or another desktop)");
    }
}

fn virtual_screen_size() -> (i32, i32) {
    // SAFETY: GetSystemMetrics has no preconditions.
    unsafe {
        (
            GetSystemMetrics(SM_CXVIRTUALSCREEN),
            GetSystemMetrics(SM_CYVIRTUALSCREEN),
        )
    }
}

/// Normalizes pixel coordinates to Windows' [0, 65535] virtual screen range.
fn normalize_coords(x: i32, y: i32, (width, height): (i32, i32)) -> (i32, i32) {
    let scale = |v: i32, extent: i32| {
        if extent > 0 {
            (v * 65535 / extent).clamp(0, 65535)
        } else {
            0
        }
    };
    (scale(x, width), scale(y, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_coords_full_width_gives_max() {
        assert_eq!(normalize_coords(1920, 1080, (1920, 1080)), (65535, 65535));
    }

    #[test]
    fn test_normalize_coords_clamps_negative_to_zero() {
        assert_eq!(normalize_coords(-10, 0, (1920, 1080)), (0, 0));
    }

    #[test]
    fn test_normalize_coords_zero_extent_gives_zero() {
        assert_eq!(normalize_coords(500, 500, (0, 0)), (0, 0));
    }
}
