//! Modifier masks and modifier classes.
//!
//! A [`ModifierMask`] is the wire-level bit set of active modifiers.  A
//! [`ModifierClass`] is one logical modifier (Shift, Control, ...) that may
//! be driven by several physical keys; the tracker keeps the per-class set
//! of native variants so press/release/query logic iterates a table instead
//! of switching on raw key codes.

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Bit set of modifiers.  Bit values match the wire format.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ModifierMask: u32 {
        const SHIFT = 0x0001;
        const CONTROL = 0x0002;
        const ALT = 0x0004;
        const SUPER = 0x0010;
        /// AltGr / "alternate graphics" shift level.
        const MODE_SWITCH = 0x0020;
        const CAPS_LOCK = 0x1000;
        const NUM_LOCK = 0x2000;
        const SCROLL_LOCK = 0x4000;
    }
}

impl ModifierMask {
    /// The lock (toggle) modifiers.
    pub const TOGGLES: ModifierMask = ModifierMask::CAPS_LOCK
        .union(ModifierMask::NUM_LOCK)
        .union(ModifierMask::SCROLL_LOCK);

    /// Decodes a wire value, dropping unknown bits.
    pub fn from_wire(bits: u16) -> Self {
        ModifierMask::from_bits_truncate(u32::from(bits))
    }

    /// Encodes for the wire.  All defined bits fit in 16 bits.
    pub fn to_wire(self) -> u16 {
        (self.bits() & 0xFFFF) as u16
    }
}

/// How a modifier class holds its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierKind {
    /// Active while any variant key is held.
    Momentary,
    /// Flips on each press+release pair.
    Toggle,
}

/// One logical modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModifierClass {
    Shift,
    Control,
    Alt,
    ModeSwitch,
    Super,
    CapsLock,
    NumLock,
    ScrollLock,
}

impl ModifierClass {
    pub const COUNT: usize = 8;

    /// Every class, in the fixed order used for planning.
    pub const ALL: [ModifierClass; Self::COUNT] = [
        ModifierClass::Shift,
        ModifierClass::Control,
        ModifierClass::Alt,
        ModifierClass::ModeSwitch,
        ModifierClass::Super,
        ModifierClass::CapsLock,
        ModifierClass::NumLock,
        ModifierClass::ScrollLock,
    ];

    pub const fn mask(self) -> ModifierMask {
        match self {
            ModifierClass::Shift => ModifierMask::SHIFT,
            ModifierClass::Control => ModifierMask::CONTROL,
            ModifierClass::Alt => ModifierMask::ALT,
            ModifierClass::ModeSwitch => ModifierMask::MODE_SWITCH,
            ModifierClass::Super => ModifierMask::SUPER,
            ModifierClass::CapsLock => ModifierMask::CAPS_LOCK,
            ModifierClass::NumLock => ModifierMask::NUM_LOCK,
            ModifierClass::ScrollLock => ModifierMask::SCROLL_LOCK,
        }
    }

    pub const fn kind(self) -> ModifierKind {
        match self {
            ModifierClass::CapsLock | ModifierClass::NumLock | ModifierClass::ScrollLock => {
                ModifierKind::Toggle
            }
            _ => ModifierKind::Momentary,
        }
    }

    /// Dense index, `0..8`.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Classes whose bit is set in `mask`, in planning order.
    pub fn in_mask(mask: ModifierMask) -> impl Iterator<Item = ModifierClass> {
        Self::ALL.into_iter().filter(move |c| mask.contains(c.mask()))
    }
}
