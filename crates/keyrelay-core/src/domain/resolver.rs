//! Key resolver: host-independent [`KeyId`]s ↔ native keys.
//!
//! # Outbound (injecting a key received from the server)
//!
//! Named keys come from the fixed [`NamedKeyTable`].  Printable keys are
//! looked up in the active [`KeyboardLayout`], which also says which
//! modifiers select the character's level.  The result is a
//! [`Resolution`]: the native key, the modifiers the planner must force into
//! a given state (`required`), and the state to force them into
//! (`outbound`).
//!
//! # Inbound (reporting a locally captured key)
//!
//! Named keys again come from the table.  Anything else is translated by
//! the layout with Control cleared (AltGr excepted), then, if that fails,
//! with Control and Alt both cleared.

use std::sync::Arc;

use tracing::debug;

use crate::domain::tracker::ModifierTracker;
use crate::keymap::{
    vk, KeyId, KeySymbol, KeyboardLayout, ModifierClass, ModifierMask, NamedKeyTable, NativeKey,
};

/// How to produce one [`KeyId`] on the local keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub key: NativeKey,
    /// Modifiers whose state must match `outbound` while `key` is struck.
    pub required: ModifierMask,
    /// The modifier state to strike `key` with.
    pub outbound: ModifierMask,
    /// `key` is a dead key at the selected level.
    pub dead: bool,
    /// Key to strike after `key` so a dead key yields its spacing form.
    pub compose: Option<NativeKey>,
}

impl Resolution {
    /// A plain resolution with no modifier requirements, used to release a
    /// key exactly as it was pressed.
    pub fn plain(key: NativeKey, outbound: ModifierMask) -> Self {
        Self {
            key,
            required: ModifierMask::empty(),
            outbound,
            dead: false,
            compose: None,
        }
    }
}

const LEVEL_MODIFIERS: ModifierMask = ModifierMask::SHIFT.union(ModifierMask::MODE_SWITCH);
const CONTROL_ALT: ModifierMask = ModifierMask::CONTROL.union(ModifierMask::ALT);

pub struct KeyResolver {
    layout: Arc<dyn KeyboardLayout>,
    named: NamedKeyTable,
}

impl KeyResolver {
    pub fn new(layout: Arc<dyn KeyboardLayout>) -> Self {
        Self::with_table(layout, NamedKeyTable::standard())
    }

    pub fn with_table(layout: Arc<dyn KeyboardLayout>, named: NamedKeyTable) -> Self {
        Self { layout, named }
    }

    pub fn layout(&self) -> &dyn KeyboardLayout {
        self.layout.as_ref()
    }

    /// Swaps in a new layout.  The tracker must be rebuilt against it too.
    pub fn set_layout(&mut self, layout: Arc<dyn KeyboardLayout>) {
        debug!(from = self.layout.name(), to = layout.name(), "switching keyboard layout");
        self.layout = layout;
    }

    pub fn named_keys(&self) -> &NamedKeyTable {
        &self.named
    }

    /// Works out how to type `id` with `desired` modifiers.
    ///
    /// Returns `None` when `id` cannot be produced on this layout; the
    /// caller drops the event.
    pub fn resolve(
        &self,
        id: KeyId,
        desired: ModifierMask,
        auto_repeat: bool,
        tracker: &ModifierTracker,
    ) -> Option<Resolution> {
        if id.is_none() {
            return None;
        }

        if let Some(key) = self.named.native_for(id) {
            return Some(self.resolve_named(key, desired));
        }

        let (ch, wants_dead) = if id.is_dead() {
            (id.dead_to_spacing()?, true)
        } else {
            (id.to_char()?, false)
        };

        let Some((key, reported)) = self.layout.key_for_char(ch) else {
            debug!(%id, layout = self.layout.name(), "no key produces this character");
            return None;
        };

        let layout_mask = fold_alt_gr(reported);
        let required = LEVEL_MODIFIERS | (layout_mask & CONTROL_ALT);
        let mut outbound = (desired & !required) | layout_mask;

        // CapsLock swaps the meaning of Shift for the keys it affects.
        if tracker.is_class_active(ModifierClass::CapsLock)
            && self.layout.translate(key, layout_mask)
                != self.layout.translate(key, layout_mask | ModifierMask::CAPS_LOCK)
        {
            outbound.toggle(ModifierMask::SHIFT);
        }

        let dead = self.layout.is_dead_key(key, layout_mask);
        let compose = if dead && !auto_repeat && !wants_dead {
            Some(self.space_key())
        } else {
            None
        };

        Some(Resolution {
            key,
            required,
            outbound,
            dead,
            compose,
        })
    }

    fn resolve_named(&self, key: NativeKey, desired: ModifierMask) -> Resolution {
        let mut resolution = Resolution::plain(key, desired);
        if key.is_keypad() {
            resolution.required |= ModifierMask::NUM_LOCK;
            resolution.outbound |= ModifierMask::NUM_LOCK;
        }
        resolution
    }

    fn space_key(&self) -> NativeKey {
        self.layout
            .key_for_char(' ')
            .map_or(NativeKey::base(vk::SPACE), |(key, _)| key)
    }

    /// Identifies a locally captured key given the current shadow state.
    ///
    /// Returns the key id and the modifier mask to report with it, or `None`
    /// if the key produces nothing on this layout.
    pub fn translate(
        &self,
        key: NativeKey,
        tracker: &ModifierTracker,
    ) -> Option<(KeyId, ModifierMask)> {
        let mask = tracker.current_mask();

        if let Some(id) = self.named.key_id_for(key) {
            return Some((id, mask));
        }

        let first = if mask.contains(ModifierMask::MODE_SWITCH) {
            mask
        } else {
            mask - ModifierMask::CONTROL
        };
        let symbol = self
            .layout
            .translate(key, first)
            .or_else(|| self.layout.translate(key, mask - CONTROL_ALT));

        let Some(symbol) = symbol else {
            debug!(?key, ?mask, "captured key has no translation");
            return None;
        };

        let id = match symbol {
            KeySymbol::Char(ch) => KeyId::from_char(ch),
            KeySymbol::Dead(ch) => KeyId::dead_from_spacing(ch).unwrap_or(KeyId::from_char(ch)),
        };
        Some((id, mask))
    }
}

/// The OS reports the AltGr level as Control+Alt; treat it as mode switch.
fn fold_alt_gr(mask: ModifierMask) -> ModifierMask {
    if mask.contains(CONTROL_ALT) {
        (mask - CONTROL_ALT) | ModifierMask::MODE_SWITCH
    } else {
        mask
    }
}
