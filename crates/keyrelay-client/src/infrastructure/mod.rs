//! Infrastructure layer for the client application.
//!
//! Contains OS-facing adapters: input injection, the TCP session, and the
//! config file.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `keyrelay_core`, but MUST NOT be imported by the `application` layer
//! outside of tests.
//!
//! - **`input_emulation`** – implementations of `PlatformInputEmulator`:
//!   SendInput on Windows, and a recording mock.
//! - **`network`** – TCP client with reconnect loop, handshake and
//!   keep-alive answers.
//! - **`storage`** – TOML configuration.

pub mod input_emulation;
pub mod network;
pub mod storage;
