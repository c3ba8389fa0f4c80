//! Keystroke planner.
//!
//! Turns a [`Resolution`] into the exact native key sequence to inject:
//!
//! ```text
//! [modifier adjustments] [target key] [dead-key release, compose key] [restore, reversed]
//! ```
//!
//! Only the modifiers in `Resolution::required` are adjusted, and only when
//! their current state differs from `Resolution::outbound`.  The planner is
//! pure: it reads the tracker, never writes it, and gives the same output
//! for the same input.

use crate::domain::resolver::Resolution;
use crate::domain::tracker::ModifierTracker;
use crate::keymap::{ModifierClass, ModifierKind, ModifierMask, NativeKey};

/// One synthetic key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Keystroke {
    pub key: NativeKey,
    pub press: bool,
    pub repeat: bool,
}

impl Keystroke {
    pub fn press(key: NativeKey) -> Self {
        Self {
            key,
            press: true,
            repeat: false,
        }
    }

    pub fn release(key: NativeKey) -> Self {
        Self {
            key,
            press: false,
            repeat: false,
        }
    }

    pub fn repeat(key: NativeKey) -> Self {
        Self {
            key,
            press: true,
            repeat: true,
        }
    }
}

/// What to do with the target key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press,
    Release,
    Repeat,
}

/// Output of [`KeystrokePlanner::plan`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Plan {
    pub keystrokes: Vec<Keystroke>,
    /// Modifier state in effect while the target key is struck.
    pub active_mask: ModifierMask,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeystrokePlanner;

impl KeystrokePlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn plan(&self, resolution: &Resolution, tracker: &ModifierTracker, action: KeyAction) -> Plan {
        let current = tracker.current_mask();
        let required = resolution.required;
        let active_mask = (current & !required) | (resolution.outbound & required);

        let target = target_keystrokes(resolution, action);
        if target.is_empty() {
            return Plan {
                keystrokes: Vec::new(),
                active_mask: current,
            };
        }

        let mut prefix = Vec::new();
        let mut restore_groups: Vec<Vec<Keystroke>> = Vec::new();

        for class in ModifierClass::in_mask(required) {
            let want = resolution.outbound.contains(class.mask());
            let have = current.contains(class.mask());
            if want == have {
                continue;
            }
            let (adjust, restore) = match class.kind() {
                ModifierKind::Toggle => toggle_keystrokes(tracker, class),
                ModifierKind::Momentary if want => engage_keystrokes(tracker, class),
                ModifierKind::Momentary => disengage_keystrokes(tracker, class),
            };
            prefix.extend(adjust);
            restore_groups.push(restore);
        }

        let mut keystrokes = prefix;
        keystrokes.extend(target);
        keystrokes.extend(restore_groups.into_iter().rev().flatten());

        Plan {
            keystrokes,
            active_mask,
        }
    }
}

fn target_keystrokes(resolution: &Resolution, action: KeyAction) -> Vec<Keystroke> {
    let key = resolution.key;
    let mut out = Vec::with_capacity(4);
    match action {
        KeyAction::Press | KeyAction::Repeat => {
            out.push(if action == KeyAction::Repeat {
                Keystroke::repeat(key)
            } else {
                Keystroke::press(key)
            });
            if resolution.dead {
                out.push(Keystroke::release(key));
            }
            if let Some(compose) = resolution.compose {
                out.push(Keystroke::press(compose));
                out.push(Keystroke::release(compose));
            }
        }
        // A dead key was released right after its press.
        KeyAction::Release if resolution.dead => {}
        KeyAction::Release => out.push(Keystroke::release(key)),
    }
    out
}

/// Lock keys flip with a press+release pair, both ways.
fn toggle_keystrokes(tracker: &ModifierTracker, class: ModifierClass) -> (Vec<Keystroke>, Vec<Keystroke>) {
    match tracker.variants(class).first() {
        Some(&key) => {
            let pair = vec![Keystroke::press(key), Keystroke::release(key)];
            (pair.clone(), pair)
        }
        None => (Vec::new(), Vec::new()),
    }
}

/// Presses the primary variant.  Without a dedicated mode-switch key,
/// mode switch is driven as Control+Alt.
fn engage_keystrokes(tracker: &ModifierTracker, class: ModifierClass) -> (Vec<Keystroke>, Vec<Keystroke>) {
    let keys: Vec<NativeKey> = match tracker.variants(class).first() {
        Some(&key) => vec![key],
        None if class == ModifierClass::ModeSwitch => [ModifierClass::Control, ModifierClass::Alt]
            .into_iter()
            .filter_map(|c| tracker.variants(c).first().copied())
            .collect(),
        None => Vec::new(),
    };
    let adjust = keys.iter().map(|&k| Keystroke::press(k)).collect();
    let restore = keys.iter().rev().map(|&k| Keystroke::release(k)).collect();
    (adjust, restore)
}

/// Releases every held variant and presses them again afterwards.
fn disengage_keystrokes(tracker: &ModifierTracker, class: ModifierClass) -> (Vec<Keystroke>, Vec<Keystroke>) {
    let held: Vec<NativeKey> = tracker
        .variants(class)
        .iter()
        .copied()
        .filter(|&k| tracker.is_native_key_down(k))
        .collect();
    let adjust = held.iter().map(|&k| Keystroke::release(k)).collect();
    let restore = held.iter().rev().map(|&k| Keystroke::press(k)).collect();
    (adjust, restore)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::resolver::KeyResolver;
    use crate::keymap::{vk, KeyId, StaticLayout};

    fn b(code: u16) -> NativeKey {
        NativeKey::base(code)
    }

    fn e(code: u16) -> NativeKey {
        NativeKey::ext(code)
    }

    fn resolve(layout: StaticLayout, id: KeyId, desired: ModifierMask) -> (Resolution, ModifierTracker) {
        let tracker = ModifierTracker::new(&layout);
        let resolver = KeyResolver::new(Arc::new(layout));
        let r = resolver.resolve(id, desired, false, &tracker).expect("resolves");
        (r, tracker)
    }

    #[test]
    fn test_shifted_letter_wraps_in_shift() {
        // Arrange
        let (r, tracker) = resolve(StaticLayout::us(), KeyId(0x41), ModifierMask::SHIFT);

        // Act
        let plan = KeystrokePlanner::new().plan(&r, &tracker, KeyAction::Press);

        // Assert
        assert_eq!(
            plan.keystrokes,
            vec![
                Keystroke::press(b(vk::LSHIFT)),
                Keystroke::press(b(vk::KEY_A)),
                Keystroke::release(b(vk::LSHIFT)),
            ]
        );
        assert_eq!(plan.active_mask, ModifierMask::SHIFT);
    }

    #[test]
    fn test_held_shift_is_lifted_for_lowercase() {
        let (r, mut tracker) = resolve(StaticLayout::us(), KeyId::from_char('a'), ModifierMask::empty());
        tracker.press(b(vk::LSHIFT));
        tracker.press(b(vk::RSHIFT));

        let plan = KeystrokePlanner::new().plan(&r, &tracker, KeyAction::Press);

        assert_eq!(
            plan.keystrokes,
            vec![
                Keystroke::release(b(vk::LSHIFT)),
                Keystroke::release(b(vk::RSHIFT)),
                Keystroke::press(b(vk::KEY_A)),
                Keystroke::press(b(vk::RSHIFT)),
                Keystroke::press(b(vk::LSHIFT)),
            ]
        );
        assert_eq!(plan.active_mask, ModifierMask::empty());
    }

    #[test]
    fn test_no_adjustment_when_state_already_matches() {
        let (r, mut tracker) = resolve(StaticLayout::us(), KeyId(0x41), ModifierMask::SHIFT);
        tracker.press(b(vk::LSHIFT));
        let plan = KeystrokePlanner::new().plan(&r, &tracker, KeyAction::Press);
        assert_eq!(plan.keystrokes, vec![Keystroke::press(b(vk::KEY_A))]);
    }

    #[test]
    fn test_keypad_toggles_num_lock_around_key() {
        let (r, tracker) = resolve(StaticLayout::us(), KeyId::KP_0, ModifierMask::empty());
        let plan = KeystrokePlanner::new().plan(&r, &tracker, KeyAction::Press);
        let num = e(vk::NUMLOCK);
        assert_eq!(
            plan.keystrokes,
            vec![
                Keystroke::press(num),
                Keystroke::release(num),
                Keystroke::press(b(vk::NUMPAD0)),
                Keystroke::press(num),
                Keystroke::release(num),
            ]
        );
    }

    #[test]
    fn test_alt_gr_uses_right_alt() {
        let (r, tracker) = resolve(StaticLayout::de(), KeyId::from_char('@'), ModifierMask::empty());
        let plan = KeystrokePlanner::new().plan(&r, &tracker, KeyAction::Press);
        assert_eq!(
            plan.keystrokes,
            vec![
                Keystroke::press(e(vk::RMENU)),
                Keystroke::press(b(vk::KEY_A + 16)),
                Keystroke::release(e(vk::RMENU)),
            ]
        );
    }

    #[test]
    fn test_mode_switch_without_dedicated_key_falls_back_to_control_alt() {
        // Arrange: the tracker uses a layout without AltGr, the resolution
        // asks for mode switch anyway.
        let tracker = ModifierTracker::new(&StaticLayout::us());
        let r = Resolution {
            key: b(vk::KEY_A + 16),
            required: ModifierMask::MODE_SWITCH,
            outbound: ModifierMask::MODE_SWITCH,
            dead: false,
            compose: None,
        };

        // Act
        let plan = KeystrokePlanner::new().plan(&r, &tracker, KeyAction::Press);

        // Assert
        assert_eq!(
            plan.keystrokes,
            vec![
                Keystroke::press(b(vk::LCONTROL)),
                Keystroke::press(b(vk::LMENU)),
                Keystroke::press(b(vk::KEY_A + 16)),
                Keystroke::release(b(vk::LMENU)),
                Keystroke::release(b(vk::LCONTROL)),
            ]
        );
    }

    #[test]
    fn test_dead_key_releases_immediately_and_composes() {
        let (r, tracker) = resolve(StaticLayout::de(), KeyId::from_char('^'), ModifierMask::empty());
        let planner = KeystrokePlanner::new();

        let down = planner.plan(&r, &tracker, KeyAction::Press);
        let up = planner.plan(&r, &tracker, KeyAction::Release);

        assert_eq!(
            down.keystrokes,
            vec![
                Keystroke::press(b(vk::OEM_5)),
                Keystroke::release(b(vk::OEM_5)),
                Keystroke::press(b(vk::SPACE)),
                Keystroke::release(b(vk::SPACE)),
            ]
        );
        assert!(up.keystrokes.is_empty());
    }

    #[test]
    fn test_repeat_is_flagged() {
        let (r, mut tracker) = resolve(StaticLayout::us(), KeyId::from_char('a'), ModifierMask::empty());
        tracker.press(b(vk::KEY_A));
        let plan = KeystrokePlanner::new().plan(&r, &tracker, KeyAction::Repeat);
        assert_eq!(plan.keystrokes, vec![Keystroke::repeat(b(vk::KEY_A))]);
    }

    #[test]
    fn test_plain_release() {
        let tracker = ModifierTracker::new(&StaticLayout::us());
        let r = Resolution::plain(b(vk::KEY_A), ModifierMask::SHIFT);
        let plan = KeystrokePlanner::new().plan(&r, &tracker, KeyAction::Release);
        assert_eq!(plan.keystrokes, vec![Keystroke::release(b(vk::KEY_A))]);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let (r, tracker) = resolve(StaticLayout::de(), KeyId::from_char('}'), ModifierMask::SHIFT);
        let planner = KeystrokePlanner::new();
        assert_eq!(
            planner.plan(&r, &tracker, KeyAction::Press),
            planner.plan(&r, &tracker, KeyAction::Press)
        );
    }
}
