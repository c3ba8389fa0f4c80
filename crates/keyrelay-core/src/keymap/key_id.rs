//! Host-independent key identifiers.
//!
//! A [`KeyId`] names either a character (its Unicode scalar value) or a
//! named function/control key.  Named keys live in the reserved
//! `0xE000..=0xEFFF` block so they can never collide with a printable
//! character that a layout might produce.
//!
//! | Range            | Meaning                                   |
//! |------------------|-------------------------------------------|
//! | `0x0000`         | "no key" sentinel ([`KeyId::NONE`])        |
//! | `0x0001..0x0300` | characters (Latin-1 and friends)          |
//! | `0x0300..0x0370` | dead keys (combining diacritical marks)   |
//! | `0xE000..0xF000` | named keys (arrows, F-keys, media, ...)   |
//! | everything else  | characters                                |

use serde::{Deserialize, Serialize};

/// A host-independent key or character identifier.
///
/// Immutable value type; two `KeyId`s are equal iff they name the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct KeyId(pub u32);

impl KeyId {
    /// "No key".  Resolution misses and unmapped inputs use this value.
    pub const NONE: KeyId = KeyId(0);

    // ── Editing and control ──────────────────────────────────────────────────
    pub const BACKSPACE: KeyId = KeyId(0xEF08);
    pub const TAB: KeyId = KeyId(0xEF09);
    pub const LINEFEED: KeyId = KeyId(0xEF0A);
    pub const CLEAR: KeyId = KeyId(0xEF0B);
    pub const RETURN: KeyId = KeyId(0xEF0D);
    pub const PAUSE: KeyId = KeyId(0xEF13);
    pub const SCROLL_LOCK: KeyId = KeyId(0xEF14);
    pub const SYS_REQ: KeyId = KeyId(0xEF15);
    pub const ESCAPE: KeyId = KeyId(0xEF1B);
    pub const DELETE: KeyId = KeyId(0xEFFF);

    // ── Cursor control ───────────────────────────────────────────────────────
    pub const HOME: KeyId = KeyId(0xEF50);
    pub const LEFT: KeyId = KeyId(0xEF51);
    pub const UP: KeyId = KeyId(0xEF52);
    pub const RIGHT: KeyId = KeyId(0xEF53);
    pub const DOWN: KeyId = KeyId(0xEF54);
    pub const PAGE_UP: KeyId = KeyId(0xEF55);
    pub const PAGE_DOWN: KeyId = KeyId(0xEF56);
    pub const END: KeyId = KeyId(0xEF57);
    pub const BEGIN: KeyId = KeyId(0xEF58);

    // ── Misc functions ───────────────────────────────────────────────────────
    pub const PRINT: KeyId = KeyId(0xEF61);
    pub const INSERT: KeyId = KeyId(0xEF63);
    pub const MENU: KeyId = KeyId(0xEF67);
    pub const HELP: KeyId = KeyId(0xEF6A);
    pub const MODE_SWITCH: KeyId = KeyId(0xEF7E);
    pub const NUM_LOCK: KeyId = KeyId(0xEF7F);

    // ── Keypad ───────────────────────────────────────────────────────────────
    pub const KP_ENTER: KeyId = KeyId(0xEF8D);
    pub const KP_HOME: KeyId = KeyId(0xEF95);
    pub const KP_LEFT: KeyId = KeyId(0xEF96);
    pub const KP_UP: KeyId = KeyId(0xEF97);
    pub const KP_RIGHT: KeyId = KeyId(0xEF98);
    pub const KP_DOWN: KeyId = KeyId(0xEF99);
    pub const KP_PAGE_UP: KeyId = KeyId(0xEF9A);
    pub const KP_PAGE_DOWN: KeyId = KeyId(0xEF9B);
    pub const KP_END: KeyId = KeyId(0xEF9C);
    pub const KP_BEGIN: KeyId = KeyId(0xEF9D);
    pub const KP_INSERT: KeyId = KeyId(0xEF9E);
    pub const KP_DELETE: KeyId = KeyId(0xEF9F);
    pub const KP_MULTIPLY: KeyId = KeyId(0xEFAA);
    pub const KP_ADD: KeyId = KeyId(0xEFAB);
    pub const KP_SEPARATOR: KeyId = KeyId(0xEFAC);
    pub const KP_SUBTRACT: KeyId = KeyId(0xEFAD);
    pub const KP_DECIMAL: KeyId = KeyId(0xEFAE);
    pub const KP_DIVIDE: KeyId = KeyId(0xEFAF);
    pub const KP_0: KeyId = KeyId(0xEFB0);
    pub const KP_9: KeyId = KeyId(0xEFB9);

    // ── Function keys (F1..=F35 are contiguous) ──────────────────────────────
    pub const F1: KeyId = KeyId(0xEFBE);
    pub const F12: KeyId = KeyId(0xEFC9);
    pub const F24: KeyId = KeyId(0xEFD5);

    // ── Modifiers ────────────────────────────────────────────────────────────
    pub const SHIFT_L: KeyId = KeyId(0xEFE1);
    pub const SHIFT_R: KeyId = KeyId(0xEFE2);
    pub const CONTROL_L: KeyId = KeyId(0xEFE3);
    pub const CONTROL_R: KeyId = KeyId(0xEFE4);
    pub const CAPS_LOCK: KeyId = KeyId(0xEFE5);
    pub const ALT_L: KeyId = KeyId(0xEFE9);
    pub const ALT_R: KeyId = KeyId(0xEFEA);
    pub const SUPER_L: KeyId = KeyId(0xEFEB);
    pub const SUPER_R: KeyId = KeyId(0xEFEC);

    // ── Extended keys (media, browser, power) ────────────────────────────────
    pub const EJECT: KeyId = KeyId(0xE001);
    pub const SLEEP: KeyId = KeyId(0xE05F);
    pub const WWW_BACK: KeyId = KeyId(0xE0A6);
    pub const WWW_FORWARD: KeyId = KeyId(0xE0A7);
    pub const WWW_REFRESH: KeyId = KeyId(0xE0A8);
    pub const WWW_STOP: KeyId = KeyId(0xE0A9);
    pub const WWW_SEARCH: KeyId = KeyId(0xE0AA);
    pub const WWW_FAVORITES: KeyId = KeyId(0xE0AB);
    pub const WWW_HOME: KeyId = KeyId(0xE0AC);
    pub const AUDIO_MUTE: KeyId = KeyId(0xE0AD);
    pub const AUDIO_DOWN: KeyId = KeyId(0xE0AE);
    pub const AUDIO_UP: KeyId = KeyId(0xE0AF);
    pub const AUDIO_NEXT: KeyId = KeyId(0xE0B0);
    pub const AUDIO_PREV: KeyId = KeyId(0xE0B1);
    pub const AUDIO_STOP: KeyId = KeyId(0xE0B2);
    pub const AUDIO_PLAY: KeyId = KeyId(0xE0B3);
    pub const APP_MAIL: KeyId = KeyId(0xE0B4);
    pub const APP_MEDIA: KeyId = KeyId(0xE0B5);
    pub const APP_USER1: KeyId = KeyId(0xE0B6);
    pub const APP_USER2: KeyId = KeyId(0xE0B7);

    // ── Dead keys (combining marks) ──────────────────────────────────────────
    pub const DEAD_GRAVE: KeyId = KeyId(0x0300);
    pub const DEAD_ACUTE: KeyId = KeyId(0x0301);
    pub const DEAD_CIRCUMFLEX: KeyId = KeyId(0x0302);
    pub const DEAD_TILDE: KeyId = KeyId(0x0303);
    pub const DEAD_MACRON: KeyId = KeyId(0x0304);
    pub const DEAD_BREVE: KeyId = KeyId(0x0306);
    pub const DEAD_ABOVE_DOT: KeyId = KeyId(0x0307);
    pub const DEAD_DIAERESIS: KeyId = KeyId(0x0308);
    pub const DEAD_ABOVE_RING: KeyId = KeyId(0x030A);
    pub const DEAD_DOUBLE_ACUTE: KeyId = KeyId(0x030B);
    pub const DEAD_CARON: KeyId = KeyId(0x030C);
    pub const DEAD_CEDILLA: KeyId = KeyId(0x0327);
    pub const DEAD_OGONEK: KeyId = KeyId(0x0328);

    /// Function key `F<n>` for `n` in `1..=35`.
    pub const fn function(n: u32) -> Option<KeyId> {
        if n >= 1 && n <= 35 {
            Some(KeyId(Self::F1.0 + n - 1))
        } else {
            None
        }
    }

    /// Keypad digit `0..=9`.
    pub const fn keypad_digit(d: u32) -> Option<KeyId> {
        if d <= 9 {
            Some(KeyId(Self::KP_0.0 + d))
        } else {
            None
        }
    }

    /// `true` for the "no key" sentinel.
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// `true` if this id lives in the reserved named-key block.
    pub const fn is_named(self) -> bool {
        self.0 >= 0xE000 && self.0 <= 0xEFFF
    }

    /// `true` if this id is a dead (combining) key.
    pub const fn is_dead(self) -> bool {
        self.0 >= 0x0300 && self.0 < 0x0370
    }

    /// Builds the id for a character.
    pub fn from_char(ch: char) -> KeyId {
        KeyId(ch as u32)
    }

    /// Returns the character this id stands for, or `None` for named keys,
    /// dead keys, and the sentinel.
    pub fn to_char(self) -> Option<char> {
        if self.is_none() || self.is_named() || self.is_dead() {
            return None;
        }
        char::from_u32(self.0)
    }

    /// Maps a dead key to the spacing character layouts use to label it
    /// (e.g. [`KeyId::DEAD_CIRCUMFLEX`] → `'^'`).
    pub fn dead_to_spacing(self) -> Option<char> {
        DEAD_SPACING
            .iter()
            .find(|(dead, _)| *dead == self)
            .map(|&(_, ch)| ch)
    }

    /// Maps a spacing diacritic back to its dead key id.
    pub fn dead_from_spacing(ch: char) -> Option<KeyId> {
        DEAD_SPACING
            .iter()
            .find(|(_, spacing)| *spacing == ch)
            .map(|&(dead, _)| dead)
    }
}

impl From<char> for KeyId {
    fn from(ch: char) -> Self {
        KeyId::from_char(ch)
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_char() {
            Some(ch) if !ch.is_control() => write!(f, "{ch:?}"),
            _ => write!(f, "0x{:04X}", self.0),
        }
    }
}

const DEAD_SPACING: &[(KeyId, char)] = &[
    (KeyId::DEAD_GRAVE, '`'),
    (KeyId::DEAD_ACUTE, '\u{00B4}'),
    (KeyId::DEAD_CIRCUMFLEX, '^'),
    (KeyId::DEAD_TILDE, '~'),
    (KeyId::DEAD_MACRON, '\u{00AF}'),
    (KeyId::DEAD_BREVE, '\u{02D8}'),
    (KeyId::DEAD_ABOVE_DOT, '\u{02D9}'),
    (KeyId::DEAD_DIAERESIS, '\u{00A8}'),
    (KeyId::DEAD_ABOVE_RING, '\u{02DA}'),
    (KeyId::DEAD_DOUBLE_ACUTE, '\u{02DD}'),
    (KeyId::DEAD_CARON, '\u{02C7}'),
    (KeyId::DEAD_CEDILLA, '\u{00B8}'),
    (KeyId::DEAD_OGONEK, '\u{02DB}'),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_ids_convert_to_chars() {
        assert_eq!(KeyId(0x41).to_char(), Some('A'));
        assert_eq!(KeyId::from_char('ä').to_char(), Some('ä'));
        assert_eq!(KeyId::from_char('€').to_char(), Some('€'));
    }

    #[test]
    fn test_named_and_dead_ids_have_no_char() {
        assert_eq!(KeyId::LEFT.to_char(), None);
        assert_eq!(KeyId::DEAD_ACUTE.to_char(), None);
        assert_eq!(KeyId::NONE.to_char(), None);
    }

    #[test]
    fn test_named_range_classification() {
        assert!(KeyId::F1.is_named());
        assert!(KeyId::AUDIO_MUTE.is_named());
        assert!(!KeyId(0x41).is_named());
        assert!(KeyId::DEAD_GRAVE.is_dead());
        assert!(!KeyId::DEAD_GRAVE.is_named());
    }

    #[test]
    fn test_function_keys_are_contiguous() {
        assert_eq!(KeyId::function(1), Some(KeyId::F1));
        assert_eq!(KeyId::function(12), Some(KeyId::F12));
        assert_eq!(KeyId::function(24), Some(KeyId::F24));
        assert_eq!(KeyId::function(0), None);
        assert_eq!(KeyId::function(36), None);
    }

    #[test]
    fn test_keypad_digits() {
        assert_eq!(KeyId::keypad_digit(0), Some(KeyId::KP_0));
        assert_eq!(KeyId::keypad_digit(9), Some(KeyId::KP_9));
        assert_eq!(KeyId::keypad_digit(10), None);
    }

    #[test]
    fn test_dead_key_spacing_round_trip() {
        assert_eq!(KeyId::DEAD_CIRCUMFLEX.dead_to_spacing(), Some('^'));
        assert_eq!(KeyId::dead_from_spacing('^'), Some(KeyId::DEAD_CIRCUMFLEX));
        assert_eq!(KeyId(0x41).dead_to_spacing(), None);
    }
}
