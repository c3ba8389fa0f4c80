//! The keyboard-layout collaborator.
//!
//! Character ↔ key translation depends on the active OS keyboard layout.
//! The engines never query the OS directly; they go through
//! [`KeyboardLayout`], which the platform layer implements and which tests
//! replace with a [`StaticLayout`](super::static_layout::StaticLayout) or a
//! mock.

use super::modifiers::ModifierMask;
use super::native::NativeKey;

/// What a key produces at a given modifier level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySymbol {
    /// An ordinary character.
    Char(char),
    /// A dead key that combines with the next keystroke.  The payload is the
    /// spacing form of the diacritic (`'^'`, `'´'`, ...).
    Dead(char),
}

impl KeySymbol {
    /// The character this symbol is labelled with, dead or not.
    pub fn char(self) -> char {
        match self {
            KeySymbol::Char(ch) | KeySymbol::Dead(ch) => ch,
        }
    }

    pub fn is_dead(self) -> bool {
        matches!(self, KeySymbol::Dead(_))
    }
}

/// Read-only view of the active keyboard layout.
///
/// Implementations are shared between the resolver and the tracker and are
/// swapped wholesale on a layout change, never mutated in place.
pub trait KeyboardLayout: Send + Sync {
    /// Human-readable layout name, used in logs.
    fn name(&self) -> &str;

    /// Finds a key that produces `ch` and the modifiers needed for it.
    ///
    /// The AltGr level is reported as `CONTROL | ALT`, the way the OS
    /// character lookup reports it; the resolver folds that into
    /// `MODE_SWITCH`.
    fn key_for_char(&self, ch: char) -> Option<(NativeKey, ModifierMask)>;

    /// What `key` produces with `mask` in effect.
    ///
    /// Honors `SHIFT`, `CAPS_LOCK`, `MODE_SWITCH` and `CONTROL | ALT` (as
    /// AltGr).  Control or Alt alone produce no character.
    fn translate(&self, key: NativeKey, mask: ModifierMask) -> Option<KeySymbol>;

    /// `true` if `key` is a dead key at the level selected by `mask`.
    fn is_dead_key(&self, key: NativeKey, mask: ModifierMask) -> bool {
        matches!(self.translate(key, mask), Some(KeySymbol::Dead(_)))
    }

    /// `true` if the layout has an AltGr level, in which case the right Alt
    /// key acts as mode switch instead of Alt.
    fn has_mode_switch(&self) -> bool;
}
