//! Application layer use cases for the server.
//!
//! - **`forward_input`** – Receives captured input, decides whether it stays
//!   local or goes to the client, and translates it into protocol messages.
//!   Runs on every keystroke and mouse movement.
//!
//! Use cases depend on traits (`InputTransmitter`, `CursorController`) so the
//! OS and network adapters can be swapped out in tests.

pub mod forward_input;
