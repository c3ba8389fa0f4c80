//! Table-driven [`KeyboardLayout`] implementations.
//!
//! Each layout is a list of keys with up to three levels: base, shifted, and
//! AltGr.  Letters are flagged as CapsLock-sensitive.  Two presets ship:
//! [`StaticLayout::us`] and [`StaticLayout::de`].

use super::layout::{KeySymbol, KeyboardLayout};
use super::modifiers::ModifierMask;
use super::native::{vk, NativeKey, NativeKeyMap};

const BASE: usize = 0;
const SHIFTED: usize = 1;
const ALT_GR: usize = 2;

/// One physical key of a static layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutKey {
    pub key: NativeKey,
    /// Symbols at the base, shifted, and AltGr levels.
    pub levels: [Option<KeySymbol>; 3],
    /// CapsLock inverts Shift for this key.
    pub caps: bool,
}

impl LayoutKey {
    fn new(code: u16, base: KeySymbol, shifted: KeySymbol) -> Self {
        Self {
            key: NativeKey::base(code),
            levels: [Some(base), Some(shifted), None],
            caps: false,
        }
    }

    fn with_alt_gr(mut self, symbol: KeySymbol) -> Self {
        self.levels[ALT_GR] = Some(symbol);
        self
    }

    fn letter(code: u16, lower: char) -> Self {
        let mut key = Self::new(code, KeySymbol::Char(lower), KeySymbol::Char(upper(lower)));
        key.caps = true;
        key
    }
}

/// A keyboard layout defined by a fixed key table.
#[derive(Debug, Clone)]
pub struct StaticLayout {
    name: String,
    keys: Vec<LayoutKey>,
    index: NativeKeyMap<usize>,
    mode_switch: bool,
}

impl StaticLayout {
    /// Builds a layout from a key list.  Later duplicates of a native key
    /// are ignored.
    pub fn new(name: impl Into<String>, keys: Vec<LayoutKey>) -> Self {
        let mut index = NativeKeyMap::new();
        let mut kept = Vec::with_capacity(keys.len());
        for key in keys {
            if index.contains(key.key) {
                continue;
            }
            if index.insert(key.key, kept.len()).is_ok() {
                kept.push(key);
            }
        }
        let mode_switch = kept.iter().any(|k| k.levels[ALT_GR].is_some());
        Self {
            name: name.into(),
            keys: kept,
            index,
            mode_switch,
        }
    }

    /// Looks a preset up by its config name (`"us"`, `"de"`).
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "us" | "en-us" => Some(Self::us()),
            "de" | "de-de" => Some(Self::de()),
            _ => None,
        }
    }

    /// US English (QWERTY).
    pub fn us() -> Self {
        let mut keys = letters();
        keys.extend(digit_row(&['!', '@', '#', '$', '%', '^', '&', '*', '(', ')']));
        keys.push(LayoutKey::new(vk::SPACE, c(' '), c(' ')));
        for (code, base, shifted) in [
            (vk::OEM_MINUS, '-', '_'),
            (vk::OEM_PLUS, '=', '+'),
            (vk::OEM_4, '[', '{'),
            (vk::OEM_6, ']', '}'),
            (vk::OEM_5, '\\', '|'),
            (vk::OEM_1, ';', ':'),
            (vk::OEM_7, '\'', '"'),
            (vk::OEM_3, '`', '~'),
            (vk::OEM_COMMA, ',', '<'),
            (vk::OEM_PERIOD, '.', '>'),
            (vk::OEM_2, '/', '?'),
        ] {
            keys.push(LayoutKey::new(code, c(base), c(shifted)));
        }
        Self::new("us", keys)
    }

    /// German (QWERTZ) with an AltGr level and dead `^`, `´` and `` ` ``.
    pub fn de() -> Self {
        let mut keys = Vec::new();

        // AltGr letters first so they keep their third level.
        keys.push(LayoutKey::letter(vk::KEY_A + 16, 'q').with_alt_gr(c('@')));
        keys.push(LayoutKey::letter(vk::KEY_A + 4, 'e').with_alt_gr(c('€')));
        keys.push(LayoutKey::letter(vk::KEY_A + 12, 'm').with_alt_gr(c('µ')));
        keys.extend(letters());

        let mut digits = digit_row(&['!', '"', '§', '$', '%', '&', '/', '(', ')', '=']);
        for (digit, alt_gr) in [(2usize, '²'), (3, '³'), (7, '{'), (8, '['), (9, ']'), (0, '}')] {
            let slot = if digit == 0 { 9 } else { digit - 1 };
            digits[slot].levels[ALT_GR] = Some(c(alt_gr));
        }
        keys.extend(digits);

        keys.push(LayoutKey::new(vk::SPACE, c(' '), c(' ')));
        keys.push(LayoutKey::new(vk::OEM_4, c('ß'), c('?')).with_alt_gr(c('\\')));
        keys.push(LayoutKey::new(vk::OEM_6, d('´'), d('`')));
        keys.push(LayoutKey::new(vk::OEM_5, d('^'), c('°')));
        keys.push(LayoutKey::new(vk::OEM_PLUS, c('+'), c('*')).with_alt_gr(c('~')));
        keys.push(LayoutKey::new(vk::OEM_2, c('#'), c('\'')));
        keys.push(LayoutKey::new(vk::OEM_COMMA, c(','), c(';')));
        keys.push(LayoutKey::new(vk::OEM_PERIOD, c('.'), c(':')));
        keys.push(LayoutKey::new(vk::OEM_MINUS, c('-'), c('_')));
        keys.push(LayoutKey::new(vk::OEM_102, c('<'), c('>')).with_alt_gr(c('|')));
        for (code, lower) in [(vk::OEM_1, 'ü'), (vk::OEM_3, 'ö'), (vk::OEM_7, 'ä')] {
            keys.push(LayoutKey::letter(code, lower));
        }

        Self::new("de", keys)
    }

    fn entry(&self, key: NativeKey) -> Option<&LayoutKey> {
        self.index.get(key).map(|&i| &self.keys[i])
    }
}

impl KeyboardLayout for StaticLayout {
    fn name(&self) -> &str {
        &self.name
    }

    fn key_for_char(&self, ch: char) -> Option<(NativeKey, ModifierMask)> {
        for (level, mask) in [
            (BASE, ModifierMask::empty()),
            (SHIFTED, ModifierMask::SHIFT),
            (ALT_GR, ModifierMask::CONTROL | ModifierMask::ALT),
        ] {
            let hit = self
                .keys
                .iter()
                .find(|k| k.levels[level].map(KeySymbol::char) == Some(ch));
            if let Some(k) = hit {
                return Some((k.key, mask));
            }
        }
        None
    }

    fn translate(&self, key: NativeKey, mask: ModifierMask) -> Option<KeySymbol> {
        let entry = self.entry(key)?;
        let alt_gr = mask.contains(ModifierMask::MODE_SWITCH)
            || mask.contains(ModifierMask::CONTROL | ModifierMask::ALT);
        if alt_gr {
            return entry.levels[ALT_GR];
        }
        if mask.intersects(ModifierMask::CONTROL | ModifierMask::ALT) {
            return None;
        }
        let shifted =
            mask.contains(ModifierMask::SHIFT) ^ (entry.caps && mask.contains(ModifierMask::CAPS_LOCK));
        entry.levels[if shifted { SHIFTED } else { BASE }]
    }

    fn has_mode_switch(&self) -> bool {
        self.mode_switch
    }
}

fn c(ch: char) -> KeySymbol {
    KeySymbol::Char(ch)
}

fn d(ch: char) -> KeySymbol {
    KeySymbol::Dead(ch)
}

fn upper(ch: char) -> char {
    ch.to_uppercase().next().unwrap_or(ch)
}

fn letters() -> Vec<LayoutKey> {
    ('a'..='z')
        .enumerate()
        .map(|(i, ch)| LayoutKey::letter(vk::KEY_A + i as u16, ch))
        .collect()
}

/// Digit keys `1..=9, 0` with the given shifted symbols, in that order.
fn digit_row(shifted: &[char; 10]) -> Vec<LayoutKey> {
    ['1', '2', '3', '4', '5', '6', '7', '8', '9', '0']
        .into_iter()
        .zip(shifted.iter())
        .map(|(digit, &shift)| {
            let code = vk::KEY_0 + digit.to_digit(10).unwrap_or(0) as u16;
            LayoutKey::new(code, c(digit), c(shift))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: u16) -> NativeKey {
        NativeKey::base(code)
    }

    #[test]
    fn test_us_uppercase_letter_needs_shift() {
        let us = StaticLayout::us();
        assert_eq!(us.key_for_char('A'), Some((key(vk::KEY_A), ModifierMask::SHIFT)));
        assert_eq!(us.key_for_char('a'), Some((key(vk::KEY_A), ModifierMask::empty())));
    }

    #[test]
    fn test_us_has_no_mode_switch() {
        let us = StaticLayout::us();
        assert!(!us.has_mode_switch());
        assert_eq!(us.translate(key(vk::KEY_A + 16), ModifierMask::MODE_SWITCH), None);
    }

    #[test]
    fn test_caps_lock_inverts_shift_for_letters_only() {
        // Arrange
        let us = StaticLayout::us();
        let caps = ModifierMask::CAPS_LOCK;

        // Act / Assert
        assert_eq!(us.translate(key(vk::KEY_A), caps), Some(c('A')));
        assert_eq!(us.translate(key(vk::KEY_A), caps | ModifierMask::SHIFT), Some(c('a')));
        assert_eq!(us.translate(key(vk::KEY_0 + 1), caps), Some(c('1')));
    }

    #[test]
    fn test_control_alone_produces_nothing() {
        let us = StaticLayout::us();
        assert_eq!(us.translate(key(vk::KEY_A), ModifierMask::CONTROL), None);
        assert_eq!(us.translate(key(vk::KEY_A), ModifierMask::ALT), None);
    }

    #[test]
    fn test_de_alt_gr_reported_as_control_alt() {
        let de = StaticLayout::de();
        assert!(de.has_mode_switch());
        assert_eq!(
            de.key_for_char('@'),
            Some((key(vk::KEY_A + 16), ModifierMask::CONTROL | ModifierMask::ALT))
        );
        assert_eq!(de.translate(key(vk::KEY_A + 16), ModifierMask::MODE_SWITCH), Some(c('@')));
        assert_eq!(
            de.translate(key(vk::KEY_A + 16), ModifierMask::CONTROL | ModifierMask::ALT),
            Some(c('@'))
        );
    }

    #[test]
    fn test_de_dead_circumflex() {
        let de = StaticLayout::de();
        assert_eq!(de.key_for_char('^'), Some((key(vk::OEM_5), ModifierMask::empty())));
        assert!(de.is_dead_key(key(vk::OEM_5), ModifierMask::empty()));
        assert!(!de.is_dead_key(key(vk::OEM_5), ModifierMask::SHIFT));
    }

    #[test]
    fn test_de_umlauts_follow_caps_lock() {
        let de = StaticLayout::de();
        assert_eq!(de.translate(key(vk::OEM_7), ModifierMask::CAPS_LOCK), Some(c('Ä')));
        assert_eq!(de.key_for_char('Ö'), Some((key(vk::OEM_3), ModifierMask::SHIFT)));
    }

    #[test]
    fn test_de_digit_alt_gr_level() {
        let de = StaticLayout::de();
        assert_eq!(de.key_for_char('{').map(|(k, _)| k), Some(key(vk::KEY_0 + 7)));
        assert_eq!(de.key_for_char('}').map(|(k, _)| k), Some(key(vk::KEY_0)));
    }

    #[test]
    fn test_unknown_char_and_key() {
        let us = StaticLayout::us();
        assert_eq!(us.key_for_char('ß'), None);
        assert_eq!(us.translate(key(vk::F1), ModifierMask::empty()), None);
    }

    #[test]
    fn test_by_name() {
        assert_eq!(StaticLayout::by_name("DE").map(|l| l.name().to_string()), Some("de".into()));
        assert!(StaticLayout::by_name("fr").is_none());
    }
}
