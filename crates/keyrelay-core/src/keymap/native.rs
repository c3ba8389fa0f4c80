//! Native (OS-level) key codes.
//!
//! The native code space is the Windows virtual-key space: 256 base codes,
//! each doubled by the "extended" flag that disambiguates physically
//! distinct keys sharing a base code (the dedicated Delete key vs. keypad
//! Delete, right Control vs. left Control, keypad Enter vs. Return, ...).
//!
//! Native keys never cross the wire.

use std::fmt;

/// Number of base native codes.
pub const NATIVE_CODE_COUNT: usize = 256;

/// Number of slots in a table indexed by [`NativeKey`] (base codes × extended flag).
pub const NATIVE_TABLE_SIZE: usize = NATIVE_CODE_COUNT * 2;

/// A physical key as the local OS names it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeKey {
    pub code: u16,
    pub extended: bool,
}

impl NativeKey {
    pub const fn new(code: u16, extended: bool) -> Self {
        Self { code, extended }
    }

    /// A non-extended key.
    pub const fn base(code: u16) -> Self {
        Self::new(code, false)
    }

    /// An extended key.
    pub const fn ext(code: u16) -> Self {
        Self::new(code, true)
    }

    /// Table slot for this key, or `None` when the code is outside the
    /// native code space.
    pub const fn index(self) -> Option<usize> {
        if (self.code as usize) < NATIVE_CODE_COUNT {
            Some(self.code as usize | if self.extended { NATIVE_CODE_COUNT } else { 0 })
        } else {
            None
        }
    }

    /// Inverse of [`NativeKey::index`].
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < NATIVE_TABLE_SIZE {
            Some(Self::new(
                (index % NATIVE_CODE_COUNT) as u16,
                index >= NATIVE_CODE_COUNT,
            ))
        } else {
            None
        }
    }

    /// Keypad keys that only produce digits while NumLock is on.
    pub const fn is_keypad(self) -> bool {
        !self.extended
            && ((self.code >= vk::NUMPAD0 && self.code <= vk::NUMPAD9) || self.code == vk::DECIMAL)
    }

    /// Compact 16-bit id used as the wire "button" field: base code in the
    /// low byte, extended flag in bit 8.
    pub const fn button_id(self) -> u16 {
        (self.code & 0xFF) | if self.extended { 0x100 } else { 0 }
    }
}

impl fmt::Debug for NativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extended {
            write!(f, "NativeKey(0x{:02X}+ext)", self.code)
        } else {
            write!(f, "NativeKey(0x{:02X})", self.code)
        }
    }
}

/// A bounds-checked table indexed by [`NativeKey`].
///
/// Array-backed; every lookup returns an explicit `None` for unassigned or
/// out-of-range keys so a zeroed slot can never be mistaken for a mapping.
#[derive(Clone)]
pub struct NativeKeyMap<T> {
    slots: Vec<Option<T>>,
}

impl<T> NativeKeyMap<T> {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(NATIVE_TABLE_SIZE);
        slots.resize_with(NATIVE_TABLE_SIZE, || None);
        Self { slots }
    }

    pub fn get(&self, key: NativeKey) -> Option<&T> {
        key.index().and_then(|i| self.slots[i].as_ref())
    }

    /// Stores `value` for `key`, returning the previous value.
    ///
    /// Keys outside the native code space are not stored; the value is
    /// handed back instead.
    pub fn insert(&mut self, key: NativeKey, value: T) -> Result<Option<T>, T> {
        match key.index() {
            Some(i) => Ok(self.slots[i].replace(value)),
            None => Err(value),
        }
    }

    pub fn remove(&mut self, key: NativeKey) -> Option<T> {
        key.index().and_then(|i| self.slots[i].take())
    }

    pub fn contains(&self, key: NativeKey) -> bool {
        self.get(key).is_some()
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Assigned entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = (NativeKey, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            let value = slot.as_ref()?;
            NativeKey::from_index(i).map(|key| (key, value))
        })
    }
}

impl<T> Default for NativeKeyMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for NativeKeyMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Windows virtual-key codes used by the built-in tables.
///
/// Reference: <https://learn.microsoft.com/windows/win32/inputdev/virtual-key-codes>
pub mod vk {
    pub const BACK: u16 = 0x08;
    pub const TAB: u16 = 0x09;
    pub const CLEAR: u16 = 0x0C;
    pub const RETURN: u16 = 0x0D;
    pub const SHIFT: u16 = 0x10;
    pub const CONTROL: u16 = 0x11;
    pub const MENU: u16 = 0x12;
    pub const PAUSE: u16 = 0x13;
    pub const CAPITAL: u16 = 0x14;
    pub const ESCAPE: u16 = 0x1B;
    pub const SPACE: u16 = 0x20;
    pub const PRIOR: u16 = 0x21;
    pub const NEXT: u16 = 0x22;
    pub const END: u16 = 0x23;
    pub const HOME: u16 = 0x24;
    pub const LEFT: u16 = 0x25;
    pub const UP: u16 = 0x26;
    pub const RIGHT: u16 = 0x27;
    pub const DOWN: u16 = 0x28;
    pub const SNAPSHOT: u16 = 0x2C;
    pub const INSERT: u16 = 0x2D;
    pub const DELETE: u16 = 0x2E;
    pub const HELP: u16 = 0x2F;
    /// `'0'..='9'` are `0x30..=0x39`, `'A'..='Z'` are `0x41..=0x5A`.
    pub const KEY_0: u16 = 0x30;
    pub const KEY_A: u16 = 0x41;
    pub const LWIN: u16 = 0x5B;
    pub const RWIN: u16 = 0x5C;
    pub const APPS: u16 = 0x5D;
    pub const SLEEP: u16 = 0x5F;
    pub const NUMPAD0: u16 = 0x60;
    pub const NUMPAD9: u16 = 0x69;
    pub const MULTIPLY: u16 = 0x6A;
    pub const ADD: u16 = 0x6B;
    pub const SEPARATOR: u16 = 0x6C;
    pub const SUBTRACT: u16 = 0x6D;
    pub const DECIMAL: u16 = 0x6E;
    pub const DIVIDE: u16 = 0x6F;
    pub const F1: u16 = 0x70;
    pub const F24: u16 = 0x87;
    pub const NUMLOCK: u16 = 0x90;
    pub const SCROLL: u16 = 0x91;
    pub const LSHIFT: u16 = 0xA0;
    pub const RSHIFT: u16 = 0xA1;
    pub const LCONTROL: u16 = 0xA2;
    pub const RCONTROL: u16 = 0xA3;
    pub const LMENU: u16 = 0xA4;
    pub const RMENU: u16 = 0xA5;
    pub const BROWSER_BACK: u16 = 0xA6;
    pub const BROWSER_FORWARD: u16 = 0xA7;
    pub const BROWSER_REFRESH: u16 = 0xA8;
    pub const BROWSER_STOP: u16 = 0xA9;
    pub const BROWSER_SEARCH: u16 = 0xAA;
    pub const BROWSER_FAVORITES: u16 = 0xAB;
    pub const BROWSER_HOME: u16 = 0xAC;
    pub const VOLUME_MUTE: u16 = 0xAD;
    pub const VOLUME_DOWN: u16 = 0xAE;
    pub const VOLUME_UP: u16 = 0xAF;
    pub const MEDIA_NEXT_TRACK: u16 = 0xB0;
    pub const MEDIA_PREV_TRACK: u16 = 0xB1;
    pub const MEDIA_STOP: u16 = 0xB2;
    pub const MEDIA_PLAY_PAUSE: u16 = 0xB3;
    pub const LAUNCH_MAIL: u16 = 0xB4;
    pub const LAUNCH_MEDIA_SELECT: u16 = 0xB5;
    pub const LAUNCH_APP1: u16 = 0xB6;
    pub const LAUNCH_APP2: u16 = 0xB7;
    pub const OEM_1: u16 = 0xBA;
    pub const OEM_PLUS: u16 = 0xBB;
    pub const OEM_COMMA: u16 = 0xBC;
    pub const OEM_MINUS: u16 = 0xBD;
    pub const OEM_PERIOD: u16 = 0xBE;
    pub const OEM_2: u16 = 0xBF;
    pub const OEM_3: u16 = 0xC0;
    pub const OEM_4: u16 = 0xDB;
    pub const OEM_5: u16 = 0xDC;
    pub const OEM_6: u16 = 0xDD;
    pub const OEM_7: u16 = 0xDE;
    pub const OEM_102: u16 = 0xE2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip_for_every_slot() {
        for i in 0..NATIVE_TABLE_SIZE {
            let key = NativeKey::from_index(i).expect("in range");
            assert_eq!(key.index(), Some(i));
        }
    }

    #[test]
    fn test_extended_flag_selects_upper_half() {
        assert_eq!(NativeKey::base(vk::DELETE).index(), Some(0x2E));
        assert_eq!(NativeKey::ext(vk::DELETE).index(), Some(0x2E + 256));
    }

    #[test]
    fn test_out_of_range_code_has_no_index() {
        assert_eq!(NativeKey::base(0x100).index(), None);
        assert_eq!(NativeKey::from_index(NATIVE_TABLE_SIZE), None);
    }

    #[test]
    fn test_map_returns_none_for_unassigned_and_out_of_range() {
        // Arrange
        let mut map = NativeKeyMap::new();
        map.insert(NativeKey::base(0x41), 'a').expect("in range");

        // Act / Assert
        assert_eq!(map.get(NativeKey::base(0x41)), Some(&'a'));
        assert_eq!(map.get(NativeKey::ext(0x41)), None);
        assert_eq!(map.get(NativeKey::base(0x42)), None);
        assert_eq!(map.get(NativeKey::base(0x1FF)), None);
    }

    #[test]
    fn test_map_rejects_out_of_range_insert() {
        let mut map = NativeKeyMap::new();
        assert_eq!(map.insert(NativeKey::base(0x400), 7u8), Err(7));
        assert_eq!(map.iter().count(), 0);
    }

    #[test]
    fn test_map_iter_yields_entries_in_index_order() {
        let mut map = NativeKeyMap::new();
        map.insert(NativeKey::ext(0x10), 2).unwrap();
        map.insert(NativeKey::base(0x20), 1).unwrap();
        let keys: Vec<_> = map.iter().map(|(k, v)| (k, *v)).collect();
        assert_eq!(keys, vec![(NativeKey::base(0x20), 1), (NativeKey::ext(0x10), 2)]);
    }

    #[test]
    fn test_keypad_detection() {
        assert!(NativeKey::base(vk::NUMPAD0).is_keypad());
        assert!(NativeKey::base(vk::DECIMAL).is_keypad());
        assert!(!NativeKey::base(vk::ADD).is_keypad());
        assert!(!NativeKey::ext(vk::NUMPAD0).is_keypad());
    }

    #[test]
    fn test_button_id_packs_extended_flag() {
        assert_eq!(NativeKey::base(0x41).button_id(), 0x41);
        assert_eq!(NativeKey::ext(0x2E).button_id(), 0x12E);
    }
}
