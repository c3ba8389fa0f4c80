//! Key model: host-independent key ids, modifier masks, native keys, and
//! the lookup resources that connect them.
//!
//! Named keys (arrows, F-keys, modifiers, ...) go through the fixed
//! [`NamedKeyTable`].  Printable characters depend on the active keyboard
//! layout and go through a [`KeyboardLayout`].

pub mod key_id;
pub mod layout;
pub mod modifiers;
pub mod native;
pub mod static_layout;
pub mod windows_vk;

pub use key_id::KeyId;
pub use layout::{KeySymbol, KeyboardLayout};
pub use modifiers::{ModifierClass, ModifierKind, ModifierMask};
pub use native::{vk, NativeKey, NativeKeyMap};
pub use static_layout::{LayoutKey, StaticLayout};
pub use windows_vk::NamedKeyTable;
