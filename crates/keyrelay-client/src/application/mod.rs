//! Application layer use cases for the client application.
//!
//! - **`emulate_input`** – Turns received server messages into local
//!   keystrokes and mouse events.  The OS call is made by a
//!   `PlatformInputEmulator` injected at construction time.

pub mod emulate_input;
