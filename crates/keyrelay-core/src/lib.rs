//! # keyrelay-core
//!
//! Shared library for KeyRelay containing the wire codec, the key model,
//! and the keyboard synchronization engines.
//!
//! This crate is used by both the server and client applications.
//! It has zero dependencies on OS APIs or network sockets.
//!
//! # Architecture overview
//!
//! KeyRelay lets one keyboard and mouse, attached to the "server", drive
//! other computers (the "clients") over the network.  This crate is the
//! shared foundation:
//!
//! - **`protocol`** – How bytes travel over the network.  Each message is
//!   described by a small format descriptor (`"DKDN%2i%2i%2i"`), encoded
//!   big-endian, and carried in a length-prefixed frame.  Every length read
//!   from the wire is checked against a limit before anything is allocated.
//!
//! - **`keymap`** – The key model: host-independent [`KeyId`]s, modifier
//!   masks, native keys, the named-key table, and the keyboard-layout
//!   abstraction that maps characters to keys.
//!
//! - **`domain`** – The engines that sit between the two.  The
//!   [`ModifierTracker`] shadows the local key state, the [`KeyResolver`]
//!   maps key ids to native keys and back, the [`KeystrokePlanner`] turns a
//!   resolution into the exact key sequence to inject, and the
//!   [`EventOrderGuard`] drops input queued before a focus change.

pub mod domain;
pub mod keymap;
pub mod protocol;

pub use domain::{
    EventOrderGuard, KeyAction, KeyResolver, Keystroke, KeystrokePlanner, Mark, MarkerSink,
    ModifierTracker, Plan, Resolution,
};
pub use keymap::{
    KeyId, KeySymbol, KeyboardLayout, ModifierClass, ModifierMask, NamedKeyTable, NativeKey,
    StaticLayout,
};
pub use protocol::{
    decode_message, encode_frame, encode_message, CodecLimits, FrameDecoder, Message,
    MessageKind, ProtocolError,
};
