//! Modifier tracker: the shadow copy of the local keyboard state.
//!
//! Every native key has a small [`KeyState`] slot.  Modifier keys are also
//! registered under a [`ModifierClass`]; the class is active while any of
//! its variants is down (momentary classes) or while its toggle bit is set
//! (lock classes).  The modifier mask is always derived from the key table,
//! so the two can never disagree.

use tracing::{debug, trace, warn};

use crate::keymap::{
    vk, KeyboardLayout, ModifierClass, ModifierKind, ModifierMask, NativeKey, NativeKeyMap,
};
use crate::keymap::native::NATIVE_TABLE_SIZE;

bitflags::bitflags! {
    /// Shadow state of one native key.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeyState: u8 {
        const DOWN = 0x01;
        const TOGGLED = 0x02;
    }
}

/// Shadow key table plus the native-key → modifier-class assignment for the
/// active layout.
///
/// Owned by the input-processing path; not synchronized.
#[derive(Debug, Clone)]
pub struct ModifierTracker {
    keys: [KeyState; NATIVE_TABLE_SIZE],
    classes: NativeKeyMap<ModifierClass>,
    variants: [Vec<NativeKey>; ModifierClass::COUNT],
    ready: bool,
}

impl ModifierTracker {
    /// Creates a tracker with its class table built for `layout`.
    pub fn new(layout: &dyn KeyboardLayout) -> Self {
        let mut tracker = Self {
            keys: [KeyState::empty(); NATIVE_TABLE_SIZE],
            classes: NativeKeyMap::new(),
            variants: Default::default(),
            ready: false,
        };
        tracker.rebuild(layout);
        tracker
    }

    /// Recomputes which native keys drive which modifier class.
    ///
    /// Right Alt is the mode-switch key on layouts with an AltGr level and
    /// a plain Alt key everywhere else.  Key states are kept.
    pub fn rebuild(&mut self, layout: &dyn KeyboardLayout) {
        self.classes.clear();
        self.variants = Default::default();

        let b = NativeKey::base;
        let e = NativeKey::ext;
        self.assign(ModifierClass::Shift, &[b(vk::LSHIFT), b(vk::RSHIFT), b(vk::SHIFT)]);
        self.assign(ModifierClass::Control, &[b(vk::LCONTROL), e(vk::RCONTROL), b(vk::CONTROL)]);
        self.assign(ModifierClass::Alt, &[b(vk::LMENU), b(vk::MENU)]);
        if layout.has_mode_switch() {
            self.assign(ModifierClass::ModeSwitch, &[e(vk::RMENU)]);
        } else {
            self.assign(ModifierClass::Alt, &[e(vk::RMENU)]);
        }
        self.assign(ModifierClass::Super, &[e(vk::LWIN), e(vk::RWIN)]);
        self.assign(ModifierClass::CapsLock, &[b(vk::CAPITAL)]);
        self.assign(ModifierClass::NumLock, &[e(vk::NUMLOCK)]);
        self.assign(ModifierClass::ScrollLock, &[b(vk::SCROLL)]);

        self.ready = true;
        debug!(layout = layout.name(), "modifier table rebuilt");
    }

    fn assign(&mut self, class: ModifierClass, keys: &[NativeKey]) {
        for &key in keys {
            if self.classes.insert(key, class).is_ok() {
                self.variants[class.index()].push(key);
            }
        }
    }

    /// Marks the class table stale.  Press and release are ignored until
    /// [`rebuild`](Self::rebuild) runs.
    pub fn layout_changed(&mut self) {
        self.classes.clear();
        self.variants = Default::default();
        self.ready = false;
        debug!("keyboard layout changed; modifier table invalidated");
    }

    /// Forgets every key and toggle state.  Used when the screen re-attaches
    /// to its input devices.
    pub fn reset(&mut self) {
        self.keys = [KeyState::empty(); NATIVE_TABLE_SIZE];
    }

    pub fn press(&mut self, key: NativeKey) {
        let Some(slot) = self.slot(key) else { return };
        self.keys[slot].insert(KeyState::DOWN);
        self.repair_stuck_combination();
    }

    /// Lock keys flip their toggle bit here, not on press.
    pub fn release(&mut self, key: NativeKey) {
        let Some(slot) = self.slot(key) else { return };
        let was_down = self.keys[slot].contains(KeyState::DOWN);
        self.keys[slot].remove(KeyState::DOWN);

        let is_lock = self
            .classes
            .get(key)
            .is_some_and(|class| class.kind() == ModifierKind::Toggle);
        if is_lock && was_down {
            self.keys[slot].toggle(KeyState::TOGGLED);
        }
    }

    fn slot(&self, key: NativeKey) -> Option<usize> {
        if !self.ready {
            debug!(?key, "modifier table stale; ignoring key event");
            return None;
        }
        let slot = key.index();
        if slot.is_none() {
            trace!(?key, "native key outside table; ignoring");
        }
        slot
    }

    /// Sets the lock toggles to match `mask`.  Other modifiers are left
    /// alone.
    pub fn sync_toggles(&mut self, mask: ModifierMask) {
        for class in ModifierClass::ALL {
            if class.kind() != ModifierKind::Toggle {
                continue;
            }
            let on = mask.contains(class.mask());
            for &key in &self.variants[class.index()] {
                if let Some(slot) = key.index() {
                    self.keys[slot].set(KeyState::TOGGLED, on);
                }
            }
        }
    }

    /// Clears Control, Alt, mode switch and Delete when all of them are
    /// down at once.  Some input layers never deliver the releases for
    /// this combination.
    fn repair_stuck_combination(&mut self) {
        let delete = [NativeKey::base(vk::DELETE), NativeKey::ext(vk::DELETE)];
        let alt_like = self.is_class_active(ModifierClass::Alt)
            || self.is_class_active(ModifierClass::ModeSwitch);
        if !(self.is_class_active(ModifierClass::Control)
            && alt_like
            && delete.iter().any(|&k| self.is_native_key_down(k)))
        {
            return;
        }

        warn!("control+alt+delete seen down together; clearing shadow state for the combination");
        let mut stuck: Vec<NativeKey> = delete.to_vec();
        for class in [ModifierClass::Control, ModifierClass::Alt, ModifierClass::ModeSwitch] {
            stuck.extend_from_slice(&self.variants[class.index()]);
        }
        for key in stuck {
            if let Some(slot) = key.index() {
                self.keys[slot].remove(KeyState::DOWN);
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn key_state(&self, key: NativeKey) -> KeyState {
        key.index().map_or(KeyState::empty(), |i| self.keys[i])
    }

    pub fn is_native_key_down(&self, key: NativeKey) -> bool {
        self.key_state(key).contains(KeyState::DOWN)
    }

    pub fn is_class_active(&self, class: ModifierClass) -> bool {
        let bit = match class.kind() {
            ModifierKind::Momentary => KeyState::DOWN,
            ModifierKind::Toggle => KeyState::TOGGLED,
        };
        self.variants[class.index()]
            .iter()
            .any(|&key| self.key_state(key).contains(bit))
    }

    /// `true` iff `mask` is non-empty and every modifier in it is active.
    pub fn is_modifier_active(&self, mask: ModifierMask) -> bool {
        !mask.is_empty() && self.current_mask().contains(mask)
    }

    pub fn current_mask(&self) -> ModifierMask {
        ModifierClass::ALL
            .into_iter()
            .filter(|&class| self.is_class_active(class))
            .fold(ModifierMask::empty(), |mask, class| mask | class.mask())
    }

    /// The modifier class `key` drives, if any.
    pub fn class_of(&self, key: NativeKey) -> Option<ModifierClass> {
        self.classes.get(key).copied()
    }

    /// Native keys that drive `class`; the first is the one to press when
    /// the modifier has to be synthesized.
    pub fn variants(&self, class: ModifierClass) -> &[NativeKey] {
        &self.variants[class.index()]
    }

    /// Every key currently marked down.
    pub fn pressed_keys(&self) -> Vec<NativeKey> {
        self.keys
            .iter()
            .enumerate()
            .filter(|(_, state)| state.contains(KeyState::DOWN))
            .filter_map(|(i, _)| NativeKey::from_index(i))
            .collect()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }
}
