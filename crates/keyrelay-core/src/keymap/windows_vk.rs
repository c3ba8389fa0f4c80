//! Named-key table: [`KeyId`] ↔ Windows virtual-key [`NativeKey`].
//!
//! Covers every key whose meaning does not depend on the keyboard layout:
//! editing, navigation, keypad, function, modifier, lock, and media keys.
//! Printable characters are *not* here; they go through the active
//! [`KeyboardLayout`](super::layout::KeyboardLayout).
//!
//! # How this table works
//!
//! `NAMED_KEYS` is a compile-time list of `(KeyId, NativeKey)` pairs.  At
//! construction [`NamedKeyTable`] indexes it both ways: a [`NativeKeyMap`]
//! for the hot native → id direction (one array lookup per captured key)
//! and a sorted vector for id → native.
//!
//! The extended flag matters here: the dedicated navigation cluster is
//! extended, the keypad's navigation keys (NumLock off) are not.

use super::key_id::KeyId;
use super::native::{vk, NativeKey, NativeKeyMap};

/// Bidirectional named-key lookup.
#[derive(Debug, Clone)]
pub struct NamedKeyTable {
    by_native: NativeKeyMap<KeyId>,
    by_id: Vec<(KeyId, NativeKey)>,
}

impl NamedKeyTable {
    /// The built-in Windows virtual-key table.
    pub fn standard() -> Self {
        let mut by_native = NativeKeyMap::new();
        let mut by_id = Vec::with_capacity(NAMED_KEYS.len() + OUTBOUND_ALIASES.len() + 40);

        for &(id, key) in NAMED_KEYS {
            // First entry wins for the reverse direction.
            if !by_native.contains(key) {
                let _ = by_native.insert(key, id);
            }
            by_id.push((id, key));
        }
        for n in 1..=24u16 {
            if let Some(id) = KeyId::function(u32::from(n)) {
                let key = NativeKey::base(vk::F1 + n - 1);
                let _ = by_native.insert(key, id);
                by_id.push((id, key));
            }
        }
        for d in 0..=9u16 {
            if let Some(id) = KeyId::keypad_digit(u32::from(d)) {
                let key = NativeKey::base(vk::NUMPAD0 + d);
                let _ = by_native.insert(key, id);
                by_id.push((id, key));
            }
        }
        by_id.extend_from_slice(OUTBOUND_ALIASES);

        by_id.sort_by_key(|&(id, _)| id);
        by_id.dedup_by_key(|&mut (id, _)| id);

        Self { by_native, by_id }
    }

    /// Native key that produces `id`, or `None` if `id` is not a named key
    /// this table knows.
    pub fn native_for(&self, id: KeyId) -> Option<NativeKey> {
        self.by_id
            .binary_search_by_key(&id, |&(id, _)| id)
            .ok()
            .map(|i| self.by_id[i].1)
    }

    /// Named key for a native key, or `None` when the key is layout
    /// dependent (letters, digits, punctuation) or unassigned.
    pub fn key_id_for(&self, key: NativeKey) -> Option<KeyId> {
        self.by_native.get(key).copied()
    }
}

impl Default for NamedKeyTable {
    fn default() -> Self {
        Self::standard()
    }
}

const fn b(code: u16) -> NativeKey {
    NativeKey::base(code)
}

const fn e(code: u16) -> NativeKey {
    NativeKey::ext(code)
}

/// Named keys in both directions.  Where two ids share a native key the
/// first one listed is reported for captured input.
const NAMED_KEYS: &[(KeyId, NativeKey)] = &[
    // ── Editing and control ───────────────────────────────────────────────────
    (KeyId::BACKSPACE, b(vk::BACK)),
    (KeyId::TAB, b(vk::TAB)),
    (KeyId::RETURN, b(vk::RETURN)),
    (KeyId::PAUSE, b(vk::PAUSE)),
    (KeyId::ESCAPE, b(vk::ESCAPE)),
    (KeyId::PRINT, e(vk::SNAPSHOT)),
    (KeyId::HELP, b(vk::HELP)),
    (KeyId::MENU, e(vk::APPS)),
    // ── Navigation cluster (extended) ─────────────────────────────────────────
    (KeyId::INSERT, e(vk::INSERT)),
    (KeyId::DELETE, e(vk::DELETE)),
    (KeyId::HOME, e(vk::HOME)),
    (KeyId::END, e(vk::END)),
    (KeyId::PAGE_UP, e(vk::PRIOR)),
    (KeyId::PAGE_DOWN, e(vk::NEXT)),
    (KeyId::LEFT, e(vk::LEFT)),
    (KeyId::UP, e(vk::UP)),
    (KeyId::RIGHT, e(vk::RIGHT)),
    (KeyId::DOWN, e(vk::DOWN)),
    // ── Keypad with NumLock off (not extended) ────────────────────────────────
    (KeyId::KP_INSERT, b(vk::INSERT)),
    (KeyId::KP_DELETE, b(vk::DELETE)),
    (KeyId::KP_HOME, b(vk::HOME)),
    (KeyId::KP_END, b(vk::END)),
    (KeyId::KP_PAGE_UP, b(vk::PRIOR)),
    (KeyId::KP_PAGE_DOWN, b(vk::NEXT)),
    (KeyId::KP_LEFT, b(vk::LEFT)),
    (KeyId::KP_UP, b(vk::UP)),
    (KeyId::KP_RIGHT, b(vk::RIGHT)),
    (KeyId::KP_DOWN, b(vk::DOWN)),
    (KeyId::KP_BEGIN, b(vk::CLEAR)),
    // ── Keypad operators ──────────────────────────────────────────────────────
    (KeyId::KP_ENTER, e(vk::RETURN)),
    (KeyId::KP_MULTIPLY, b(vk::MULTIPLY)),
    (KeyId::KP_ADD, b(vk::ADD)),
    (KeyId::KP_SEPARATOR, b(vk::SEPARATOR)),
    (KeyId::KP_SUBTRACT, b(vk::SUBTRACT)),
    (KeyId::KP_DECIMAL, b(vk::DECIMAL)),
    (KeyId::KP_DIVIDE, e(vk::DIVIDE)),
    // ── Locks ─────────────────────────────────────────────────────────────────
    (KeyId::CAPS_LOCK, b(vk::CAPITAL)),
    (KeyId::NUM_LOCK, e(vk::NUMLOCK)),
    (KeyId::SCROLL_LOCK, b(vk::SCROLL)),
    // ── Modifiers ─────────────────────────────────────────────────────────────
    (KeyId::SHIFT_L, b(vk::LSHIFT)),
    (KeyId::SHIFT_R, b(vk::RSHIFT)),
    (KeyId::CONTROL_L, b(vk::LCONTROL)),
    (KeyId::CONTROL_R, e(vk::RCONTROL)),
    (KeyId::ALT_L, b(vk::LMENU)),
    (KeyId::ALT_R, e(vk::RMENU)),
    (KeyId::SUPER_L, e(vk::LWIN)),
    (KeyId::SUPER_R, e(vk::RWIN)),
    // Generic modifier codes some hooks report instead of the sided ones.
    (KeyId::SHIFT_L, b(vk::SHIFT)),
    (KeyId::CONTROL_L, b(vk::CONTROL)),
    (KeyId::ALT_L, b(vk::MENU)),
    // ── Media, browser, power ─────────────────────────────────────────────────
    (KeyId::SLEEP, b(vk::SLEEP)),
    (KeyId::WWW_BACK, e(vk::BROWSER_BACK)),
    (KeyId::WWW_FORWARD, e(vk::BROWSER_FORWARD)),
    (KeyId::WWW_REFRESH, e(vk::BROWSER_REFRESH)),
    (KeyId::WWW_STOP, e(vk::BROWSER_STOP)),
    (KeyId::WWW_SEARCH, e(vk::BROWSER_SEARCH)),
    (KeyId::WWW_FAVORITES, e(vk::BROWSER_FAVORITES)),
    (KeyId::WWW_HOME, e(vk::BROWSER_HOME)),
    (KeyId::AUDIO_MUTE, e(vk::VOLUME_MUTE)),
    (KeyId::AUDIO_DOWN, e(vk::VOLUME_DOWN)),
    (KeyId::AUDIO_UP, e(vk::VOLUME_UP)),
    (KeyId::AUDIO_NEXT, e(vk::MEDIA_NEXT_TRACK)),
    (KeyId::AUDIO_PREV, e(vk::MEDIA_PREV_TRACK)),
    (KeyId::AUDIO_STOP, e(vk::MEDIA_STOP)),
    (KeyId::AUDIO_PLAY, e(vk::MEDIA_PLAY_PAUSE)),
    (KeyId::APP_MAIL, e(vk::LAUNCH_MAIL)),
    (KeyId::APP_MEDIA, e(vk::LAUNCH_MEDIA_SELECT)),
    (KeyId::APP_USER1, e(vk::LAUNCH_APP1)),
    (KeyId::APP_USER2, e(vk::LAUNCH_APP2)),
];

/// Ids accepted from the wire that never come out of capture.
const OUTBOUND_ALIASES: &[(KeyId, NativeKey)] = &[
    (KeyId::MODE_SWITCH, e(vk::RMENU)),
    (KeyId::LINEFEED, b(vk::RETURN)),
    (KeyId::CLEAR, b(vk::CLEAR)),
    (KeyId::BEGIN, b(vk::CLEAR)),
];
