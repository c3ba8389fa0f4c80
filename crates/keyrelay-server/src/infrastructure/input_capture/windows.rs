//! Windows low-level keyboard and mouse hook implementation.
//!
//! This module installs WH_KEYBOARD_LL and WH_MOUSE_LL hooks using the
//! Windows API. Both hooks share a dedicated Win32 message-loop thread.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::OnceLock;
use std::thread;

use keyrelay_core::NativeKey;
use tokio::sync::mpsc::UnboundedSender;
use tracing::error;
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    UnhookWindowsHookEx, HC_ACTION, KBDLLHOOKSTRUCT, KBDLLHOOKSTRUCT_FLAGS, LLKHF_EXTENDED,
    LLKHF_INJECTED, MSG, MSLLHOOKSTRUCT, WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN, WM_KEYUP,
    WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEHWHEEL, WM_MOUSEMOVE,
    WM_MOUSEWHEEL, WM_QUIT, WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

use super::{CaptureError, InputSource, MouseButton, RawInputEvent};

/// While `true`, hooked events are swallowed instead of reaching local apps.
static SUPPRESS_FLAG: AtomicBool = AtomicBool::new(false);

/// Sender used by hook callbacks to deliver events to the async runtime.
/// Initialized once by [`WindowsInputCaptureService::start`].
static EVENT_SENDER: OnceLock<UnboundedSender<RawInputEvent>> = OnceLock::new();

/// Thread id of the hook loop, for posting `WM_QUIT` on stop.
static HOOK_THREAD_ID: AtomicU32 = AtomicU32::new(0);

/// Windows low-level input capture service.
#[derive(Debug, Default)]
pub struct WindowsInputCaptureService;

impl WindowsInputCaptureService {
    pub fn new() -> Self {
        Self
    }
}

impl InputSource for WindowsInputCaptureService {
    fn start(&self, events: UnboundedSender<RawInputEvent>) -> Result<(), CaptureError> {
        EVENT_SENDER
            .set(events)
            .map_err(|_| CaptureError::AlreadyStarted)?;

        thread::Builder::new()
            .name("keyrelay-hook-loop".to_string())
            .spawn(run_hook_message_loop)
            .map_err(|e| CaptureError::KeyboardHookInstallFailed(e.to_string()))?;

        Ok(())
    }

    fn stop(&self) {
        SUPPRESS_FLAG.store(false, Ordering::SeqCst);
        let thread_id = HOOK_THREAD_ID.load(Ordering::SeqCst);
        if thread_id != 0 {
            // SAFETY: posting to a thread id we recorded ourselves; failure is harmless.
            unsafe {
                PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)).ok();
            }
        }
    }

    fn set_suppressing(&self, suppress: bool) {
        SUPPRESS_FLAG.store(suppress, Ordering::SeqCst);
    }
}

/// Entry point for the dedicated Win32 message loop thread.
fn run_hook_message_loop() {
    // SAFETY: hooks are installed on this thread, which then pumps messages.
    let kbd_hook = match unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) } {
        Ok(hook) => hook,
        Err(e) => {
            error!("{}", CaptureError::KeyboardHookInstallFailed(e.to_string()));
            return;
        }
    };
    // SAFETY: as above.
    let mouse_hook = match unsafe { SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), None, 0) } {
        Ok(hook) => hook,
        Err(e) => {
            error!("{}", CaptureError::MouseHookInstallFailed(e.to_string()));
            // SAFETY: the keyboard hook was installed above.
            unsafe {
                UnhookWindowsHookEx(kbd_hook).ok();
            }
            return;
        }
    };

    // SAFETY: trivial query of the calling thread.
    HOOK_THREAD_ID.store(unsafe { GetCurrentThreadId() }, Ordering::SeqCst);

    let mut msg = MSG::default();
    // SAFETY: Standard Win32 GetMessage/DispatchMessage loop pattern.
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            DispatchMessageW(&msg);
        }
        UnhookWindowsHookEx(kbd_hook).ok();
        UnhookWindowsHookEx(mouse_hook).ok();
    }
}

fn deliver(event: RawInputEvent) {
    if let Some(sender) = EVENT_SENDER.get() {
        // Channel closes during shutdown.
        let _ = sender.send(event);
    }
}

/// Low-level keyboard hook callback.
///
/// # Safety
///
/// Called by Windows from the hook message loop thread. It must return
/// quickly (< ~300ms) to avoid hook removal by the OS.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    // SAFETY: l_param points to a KBDLLHOOKSTRUCT when n_code == HC_ACTION.
    let kbs = &*(l_param.0 as *const KBDLLHOOKSTRUCT);

    // Our own synthetic input (the cursor teleport) is not user input.
    if (kbs.flags & LLKHF_INJECTED) != KBDLLHOOKSTRUCT_FLAGS(0) {
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    let key = NativeKey {
        code: (kbs.vkCode & 0xFF) as u16,
        extended: (kbs.flags & LLKHF_EXTENDED) != KBDLLHOOKSTRUCT_FLAGS(0),
    };
    let time_ms = kbs.time;

    let event = match w_param.0 as u32 {
        WM_KEYDOWN | WM_SYSKEYDOWN => RawInputEvent::KeyDown { key, time_ms },
        WM_KEYUP | WM_SYSKEYUP => RawInputEvent::KeyUp { key, time_ms },
        _ => return CallNextHookEx(None, n_code, w_param, l_param),
    };

    deliver(event);

    if SUPPRESS_FLAG.load(Ordering::SeqCst) {
        return LRESULT(1);
    }
    CallNextHookEx(None, n_code, w_param, l_param)
}

/// Low-level mouse hook callback.
///
/// # Safety
///
/// Called by Windows from the hook message loop thread; must return quickly.
unsafe extern "system" fn mouse_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    // SAFETY: l_param points to a MSLLHOOKSTRUCT when n_code == HC_ACTION.
    let mhs = &*(l_param.0 as *const MSLLHOOKSTRUCT);
    let time_ms = mhs.time;
    let wheel_delta = (mhs.mouseData >> 16) as i16;

    let event = match w_param.0 as u32 {
        WM_MOUSEMOVE => RawInputEvent::MouseMove {
            x: mhs.pt.x,
            y: mhs.pt.y,
            time_ms,
        },
        WM_LBUTTONDOWN => RawInputEvent::MouseButtonDown {
            button: MouseButton::Left,
            time_ms,
        },
        WM_LBUTTONUP => RawInputEvent::MouseButtonUp {
            button: MouseButton::Left,
            time_ms,
        },
        WM_RBUTTONDOWN => RawInputEvent::MouseButtonDown {
            button: MouseButton::Right,
            time_ms,
        },
        WM_RBUTTONUP => RawInputEvent::MouseButtonUp {
            button: MouseButton::Right,
            time_ms,
        },
        WM_MBUTTONDOWN => RawInputEvent::MouseButtonDown {
            button: MouseButton::Middle,
            time_ms,
        },
        WM_MBUTTONUP => RawInputEvent::MouseButtonUp {
            button: MouseButton::Middle,
            time_ms,
        },
        WM_MOUSEWHEEL => RawInputEvent::MouseWheel {
            delta: wheel_delta,
            time_ms,
        },
        WM_MOUSEHWHEEL => RawInputEvent::MouseWheelH {
            delta: wheel_delta,
            time_ms,
        },
        _ => return CallNextHookEx(None, n_code, w_param, l_param),
    };

    deliver(event);

    if SUPPRESS_FLAG.load(Ordering::SeqCst) {
        return LRESULT(1);
    }
    CallNextHookEx(None, n_code, w_param, l_param)
}
