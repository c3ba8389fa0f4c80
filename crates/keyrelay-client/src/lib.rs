//! keyrelay-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! The client is the computer being driven.  It:
//!
//! 1. Connects to the server and answers the handshake with its screen name.
//! 2. Reports its screen shape when the server asks for it.
//! 3. Receives key and mouse messages while it has focus.
//! 4. Resolves each key id against the local keyboard layout, plans the
//!    modifier presses needed around it, and injects the result.

/// Application layer: use cases for the client.
pub mod application;

/// Infrastructure layer: OS adapters, network, and configuration.
pub mod infrastructure;
