//! Mock platform input emulator for unit testing.
//!
//! The real emulator makes OS calls that need a desktop session and
//! actually press keys on the test machine.  `MockInputEmulator` records
//! every call instead, in order, so tests can assert exactly what would
//! have been injected.
//!
//! ```ignore
//! let emulator = Arc::new(MockInputEmulator::new());
//! let mut use_case = EmulateInputUseCase::new(Arc::clone(&emulator), layout, markers);
//!
//! use_case.handle_message(&key_down);
//!
//! assert_eq!(emulator.keystrokes(), vec![Keystroke::press(key)]);
//! ```

use std::sync::Mutex;

use keyrelay_core::Keystroke;

use crate::application::emulate_input::PlatformInputEmulator;

/// One recorded call on the emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmittedInput {
    Key(Keystroke),
    Move(i32, i32),
    RelativeMove(i32, i32),
    Button(u8, bool),
    Wheel(i16, i16),
}

/// A mock emulator that records all calls without performing OS API calls.
#[derive(Default)]
pub struct MockInputEmulator {
    events: Mutex<Vec<EmittedInput>>,
}

impl MockInputEmulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded call, oldest first.
    pub fn events(&self) -> Vec<EmittedInput> {
        self.lock().clone()
    }

    /// Only the keystrokes, oldest first.
    pub fn keystrokes(&self) -> Vec<Keystroke> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                EmittedInput::Key(stroke) => Some(*stroke),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EmittedInput>> {
        // A poisoned log is still a usable log.
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, event: EmittedInput) {
        self.lock().push(event);
    }
}

impl PlatformInputEmulator for MockInputEmulator {
    fn emit_keystroke(&self, stroke: Keystroke) {
        self.record(EmittedInput::Key(stroke));
    }

    fn emit_mouse_move(&self, x: i32, y: i32) {
        self.record(EmittedInput::Move(x, y));
    }

    fn emit_mouse_relative_move(&self, dx: i32, dy: i32) {
        self.record(EmittedInput::RelativeMove(dx, dy));
    }

    fn emit_mouse_button(&self, button: u8, pressed: bool) {
        self.record(EmittedInput::Button(button, pressed));
    }

    fn emit_mouse_wheel(&self, x_delta: i16, y_delta: i16) {
        self.record(EmittedInput::Wheel(x_delta, y_delta));
    }
}
