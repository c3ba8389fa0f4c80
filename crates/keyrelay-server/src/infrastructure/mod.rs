//! Infrastructure layer for the server application.
//!
//! Contains OS-facing adapters: input capture hooks, cursor control,
//! the TCP listener and file-system storage.
//!
//! **Dependency rule**: this layer may depend on `application` and `keyrelay_core`,
//! but MUST NOT be imported by the `application` layer.

pub mod cursor;
pub mod input_capture;
pub mod network;
pub mod storage;
