//! EmulateInputUseCase: turns received protocol messages into local input.
//!
//! Key messages go through the full synchronization pipeline:
//!
//! ```text
//! Message ─► EventOrderGuard ─► KeyResolver ─► KeystrokePlanner ─► emulator
//!                                   ▲                │
//!                                   └─ ModifierTracker ◄┘ (every keystroke)
//! ```
//!
//! The OS call itself is made by a [`PlatformInputEmulator`] injected at
//! construction time.
//!
//! Every message arrives through the one ordered server stream, so the
//! guard's markers are queued directly behind the Enter or Leave that
//! posted them and are observed before the next message is looked at.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use keyrelay_core::{
    EventOrderGuard, KeyAction, KeyId, KeyResolver, KeyboardLayout, Keystroke, KeystrokePlanner,
    Mark, Message, ModifierClass, ModifierMask, ModifierTracker, NativeKey, Plan, Resolution,
};
use tracing::{debug, info, trace};

/// Platform-agnostic input injection.
///
/// Implementations report their own failures through logging; nothing
/// here returns an error.
pub trait PlatformInputEmulator: Send + Sync {
    /// Injects one native key transition.
    fn emit_keystroke(&self, stroke: Keystroke);

    /// Moves the cursor to an absolute position in the client's coordinate space.
    fn emit_mouse_move(&self, x: i32, y: i32);

    /// Moves the cursor by a relative amount.
    fn emit_mouse_relative_move(&self, dx: i32, dy: i32);

    /// Presses or releases a protocol mouse button (1 = left, 2 = middle, 3 = right).
    fn emit_mouse_button(&self, button: u8, pressed: bool);

    /// Scrolls by the given wheel deltas.
    fn emit_mouse_wheel(&self, x_delta: i16, y_delta: i16);
}

/// Filters duplicate consecutive events to avoid injecting the same event twice.
#[derive(Default)]
struct DedupFilter {
    last_mouse_pos: Option<(i32, i32)>,
}

impl DedupFilter {
    fn should_send_mouse_move(&mut self, x: i32, y: i32) -> bool {
        if self.last_mouse_pos == Some((x, y)) {
            return false;
        }
        self.last_mouse_pos = Some((x, y));
        true
    }

    fn reset(&mut self) {
        self.last_mouse_pos = None;
    }
}

/// The native key a server button was pressed on.
#[derive(Debug, Clone, Copy)]
struct HeldKey {
    key: NativeKey,
    dead: bool,
}

/// The Emulate Input use case.
///
/// Owns the client's input-processing path: the guard, the shadow key state,
/// and the resolver all live here and are touched from nowhere else.
pub struct EmulateInputUseCase {
    emulator: Arc<dyn PlatformInputEmulator>,
    /// Markers posted since the last message; they follow the transition
    /// that posted them.
    markers: VecDeque<Mark>,
    guard: EventOrderGuard,
    tracker: ModifierTracker,
    resolver: KeyResolver,
    planner: KeystrokePlanner,
    /// Server button id → native key it went down on.
    held: HashMap<u16, HeldKey>,
    dedup: DedupFilter,
    entered: bool,
}

impl EmulateInputUseCase {
    /// Creates a use case injecting through `emulator` and resolving
    /// characters with `layout`.
    pub fn new(emulator: Arc<dyn PlatformInputEmulator>, layout: Arc<dyn KeyboardLayout>) -> Self {
        let tracker = ModifierTracker::new(layout.as_ref());
        Self {
            emulator,
            markers: VecDeque::new(),
            guard: EventOrderGuard::new(),
            tracker,
            resolver: KeyResolver::new(layout),
            planner: KeystrokePlanner::new(),
            held: HashMap::new(),
            dedup: DedupFilter::default(),
            entered: false,
        }
    }

    /// Dispatches one message received from the server.
    ///
    /// Input messages are dropped while a focus change is still in flight;
    /// control messages always apply.
    pub fn handle_message(&mut self, msg: &Message) {
        while let Some(mark) = self.markers.pop_front() {
            self.guard.observe(mark);
        }
        if msg.is_input() && !self.guard.admit() {
            trace!(kind = ?msg.kind(), "dropping input queued before the last focus change");
            return;
        }

        match *msg {
            Message::Enter { x, y, mask, .. } => self.handle_enter(x, y, mask),
            Message::Leave => self.handle_leave(),
            Message::ScreenSaver { active } => info!(active, "server screen saver state changed"),
            Message::KeyDown { id, mask, button } => self.handle_key_down(id, mask, button),
            Message::KeyRepeat {
                id,
                mask,
                count,
                button,
            } => self.handle_key_repeat(id, mask, count, button),
            Message::KeyUp { button, .. } => self.handle_key_up(button),
            Message::MouseMove { x, y } => self.handle_mouse_move(i32::from(x), i32::from(y)),
            Message::MouseRelativeMove { dx, dy } => {
                self.emulator.emit_mouse_relative_move(i32::from(dx), i32::from(dy));
            }
            Message::MouseDown { button } => self.emulator.emit_mouse_button(button, true),
            Message::MouseUp { button } => self.emulator.emit_mouse_button(button, false),
            Message::MouseWheel { x_delta, y_delta } => {
                self.emulator.emit_mouse_wheel(x_delta, y_delta);
            }
            _ => debug!(kind = ?msg.kind(), "message has no local input effect"),
        }
    }

    /// Switches to a new keyboard layout.
    ///
    /// Key events are ignored by the tracker between the notification and
    /// the rebuild, so both happen here back to back.
    pub fn set_layout(&mut self, layout: Arc<dyn KeyboardLayout>) {
        self.tracker.layout_changed();
        self.tracker.rebuild(layout.as_ref());
        self.resolver.set_layout(layout);
    }

    /// Resets per-connection state after the server goes away.
    ///
    /// Keys still held on the server's behalf are released first.  The
    /// shadow state then starts over, keeping only the lock toggles this
    /// machine is actually left in.
    pub fn reset(&mut self) {
        self.release_held_keys();
        let locks = self.tracker.current_mask() & ModifierMask::TOGGLES;
        self.tracker.reset();
        self.tracker.sync_toggles(locks);
        self.markers.clear();
        self.guard = EventOrderGuard::new();
        self.dedup.reset();
        self.entered = false;
    }

    /// Whether the server's cursor is currently on this screen.
    pub fn is_entered(&self) -> bool {
        self.entered
    }

    pub fn tracker(&self) -> &ModifierTracker {
        &self.tracker
    }

    pub fn guard(&self) -> &EventOrderGuard {
        &self.guard
    }

    // ── Private event handlers ────────────────────────────────────────────────

    fn handle_enter(&mut self, x: i16, y: i16, mask: ModifierMask) {
        info!(x, y, ?mask, "server cursor entered this screen");
        self.advance_focus();
        self.entered = true;
        self.sync_lock_keys(mask);
        self.dedup.reset();
        self.handle_mouse_move(i32::from(x), i32::from(y));
    }

    fn handle_leave(&mut self) {
        info!("server cursor left this screen");
        self.release_held_keys();
        self.entered = false;
        self.advance_focus();
    }

    fn advance_focus(&mut self) {
        let markers = &mut self.markers;
        let mark = self.guard.advance(&mut |mark: Mark| markers.push_back(mark));
        debug!(?mark, "focus change marker posted");
    }

    fn handle_key_down(&mut self, id: KeyId, mask: ModifierMask, button: u16) {
        let Some(resolution) = self.resolver.resolve(id, mask, false, &self.tracker) else {
            debug!(%id, ?mask, "key has no mapping on this layout; dropped");
            return;
        };
        let plan = self.planner.plan(&resolution, &self.tracker, KeyAction::Press);
        self.apply(&plan);
        self.held.insert(
            button,
            HeldKey {
                key: resolution.key,
                dead: resolution.dead,
            },
        );
    }

    fn handle_key_repeat(&mut self, id: KeyId, mask: ModifierMask, count: u16, button: u16) {
        if !self.held.contains_key(&button) {
            trace!(%id, button, "repeat for a key that is not down; dropped");
            return;
        }
        let Some(resolution) = self.resolver.resolve(id, mask, true, &self.tracker) else {
            debug!(%id, ?mask, "repeated key has no mapping on this layout; dropped");
            return;
        };
        for _ in 0..count {
            let plan = self.planner.plan(&resolution, &self.tracker, KeyAction::Repeat);
            self.apply(&plan);
        }
    }

    fn handle_key_up(&mut self, button: u16) {
        let Some(held) = self.held.remove(&button) else {
            trace!(button, "release for a key that is not down; dropped");
            return;
        };
        self.release(held);
    }

    fn handle_mouse_move(&mut self, x: i32, y: i32) {
        if self.dedup.should_send_mouse_move(x, y) {
            self.emulator.emit_mouse_move(x, y);
        }
    }

    /// Strikes each lock key whose state differs from `mask`.
    fn sync_lock_keys(&mut self, mask: ModifierMask) {
        let differs = (self.tracker.current_mask() ^ mask) & ModifierMask::TOGGLES;
        for class in ModifierClass::in_mask(differs) {
            let Some(&key) = self.tracker.variants(class).first() else {
                continue;
            };
            debug!(?class, "toggling lock key to match server");
            self.emit(Keystroke::press(key));
            self.emit(Keystroke::release(key));
        }
    }

    fn release_held_keys(&mut self) {
        let held: Vec<HeldKey> = self.held.drain().map(|(_, key)| key).collect();
        for key in held {
            self.release(key);
        }
    }

    fn release(&mut self, held: HeldKey) {
        let resolution = Resolution {
            dead: held.dead,
            ..Resolution::plain(held.key, self.tracker.current_mask())
        };
        let plan = self.planner.plan(&resolution, &self.tracker, KeyAction::Release);
        self.apply(&plan);
    }

    fn apply(&mut self, plan: &Plan) {
        for &stroke in &plan.keystrokes {
            self.emit(stroke);
        }
    }

    /// Injects one keystroke and mirrors it into the shadow state.
    fn emit(&mut self, stroke: Keystroke) {
        self.emulator.emit_keystroke(stroke);
        if stroke.press {
            self.tracker.press(stroke.key);
        } else {
            self.tracker.release(stroke.key);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use keyrelay_core::keymap::vk;
    use keyrelay_core::StaticLayout;

    use super::*;
    use crate::infrastructure::input_emulation::mock::{EmittedInput, MockInputEmulator};

    fn b(code: u16) -> NativeKey {
        NativeKey::base(code)
    }

    fn make_use_case(layout: StaticLayout) -> (EmulateInputUseCase, Arc<MockInputEmulator>) {
        let emulator = Arc::new(MockInputEmulator::new());
        let uc = EmulateInputUseCase::new(
            Arc::clone(&emulator) as Arc<dyn PlatformInputEmulator>,
            Arc::new(layout),
        );
        (uc, emulator)
    }

    fn enter(x: i16, y: i16, mask: ModifierMask) -> Message {
        Message::Enter {
            x,
            y,
            sequence: 1,
            mask,
        }
    }

    fn key_down(ch: char, mask: ModifierMask, button: u16) -> Message {
        Message::KeyDown {
            id: KeyId::from_char(ch),
            mask,
            button,
        }
    }

    fn key_up(ch: char, button: u16) -> Message {
        Message::KeyUp {
            id: KeyId::from_char(ch),
            mask: ModifierMask::empty(),
            button,
        }
    }

    // ── Keys ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_shifted_letter_is_wrapped_in_shift() {
        // Arrange
        let (mut uc, em) = make_use_case(StaticLayout::us());

        // Act
        uc.handle_message(&key_down('A', ModifierMask::SHIFT, 0x41));

        // Assert
        assert_eq!(
            em.keystrokes(),
            vec![
                Keystroke::press(b(vk::LSHIFT)),
                Keystroke::press(b(vk::KEY_A)),
                Keystroke::release(b(vk::LSHIFT)),
            ]
        );
        assert!(uc.tracker().is_native_key_down(b(vk::KEY_A)));
        assert!(!uc.tracker().is_modifier_active(ModifierMask::SHIFT));
    }

    #[test]
    fn test_release_uses_the_key_chosen_on_press() {
        // Arrange
        let (mut uc, em) = make_use_case(StaticLayout::de());
        uc.handle_message(&key_down('@', ModifierMask::empty(), 0x10));
        em.clear();

        // Act: the id in the release no longer matters.
        uc.handle_message(&Message::KeyUp {
            id: KeyId::from_char('x'),
            mask: ModifierMask::empty(),
            button: 0x10,
        });

        // Assert
        assert_eq!(em.keystrokes(), vec![Keystroke::release(b(vk::KEY_A + 16))]);
    }

    #[test]
    fn test_unmapped_character_is_dropped() {
        let (mut uc, em) = make_use_case(StaticLayout::us());
        uc.handle_message(&key_down('€', ModifierMask::empty(), 1));
        uc.handle_message(&key_up('€', 1));
        assert!(em.events().is_empty());
    }

    #[test]
    fn test_repeat_emits_count_repeats() {
        // Arrange
        let (mut uc, em) = make_use_case(StaticLayout::us());
        uc.handle_message(&key_down('a', ModifierMask::empty(), 7));
        em.clear();

        // Act
        uc.handle_message(&Message::KeyRepeat {
            id: KeyId::from_char('a'),
            mask: ModifierMask::empty(),
            count: 3,
            button: 7,
        });

        // Assert
        assert_eq!(em.keystrokes(), vec![Keystroke::repeat(b(vk::KEY_A)); 3]);
    }

    #[test]
    fn test_repeat_without_press_is_ignored() {
        let (mut uc, em) = make_use_case(StaticLayout::us());
        uc.handle_message(&Message::KeyRepeat {
            id: KeyId::from_char('a'),
            mask: ModifierMask::empty(),
            count: 2,
            button: 7,
        });
        assert!(em.events().is_empty());
    }

    #[test]
    fn test_dead_key_release_emits_nothing() {
        // Arrange
        let (mut uc, em) = make_use_case(StaticLayout::de());
        uc.handle_message(&key_down('^', ModifierMask::empty(), 0x29));
        em.clear();

        // Act
        uc.handle_message(&key_up('^', 0x29));

        // Assert
        assert!(em.keystrokes().is_empty());
    }

    // ── Focus changes ─────────────────────────────────────────────────────────

    #[test]
    fn test_leave_releases_held_keys_and_advances_guard() {
        // Arrange
        let (mut uc, em) = make_use_case(StaticLayout::us());
        uc.handle_message(&key_down('a', ModifierMask::empty(), 1));
        uc.handle_message(&key_down('b', ModifierMask::empty(), 2));
        em.clear();

        // Act
        uc.handle_message(&Message::Leave);

        // Assert
        let mut released = em.keystrokes();
        released.sort_by_key(|s| s.key.code);
        assert_eq!(
            released,
            vec![
                Keystroke::release(b(vk::KEY_A)),
                Keystroke::release(b(vk::KEY_A + 1)),
            ]
        );
        assert_eq!(uc.guard().current(), Mark(1));
        assert!(uc.tracker().pressed_keys().is_empty());
    }

    #[test]
    fn test_input_after_leave_and_reenter_is_injected() {
        // Arrange: all four messages were received before any was handled.
        let (mut uc, em) = make_use_case(StaticLayout::us());
        let batch = [
            Message::Leave,
            enter(10, 20, ModifierMask::empty()),
            key_down('a', ModifierMask::empty(), 1),
            key_up('a', 1),
        ];

        // Act
        for msg in &batch {
            uc.handle_message(msg);
        }

        // Assert
        assert_eq!(
            em.keystrokes(),
            vec![
                Keystroke::press(b(vk::KEY_A)),
                Keystroke::release(b(vk::KEY_A)),
            ]
        );
        assert_eq!(uc.guard().current(), Mark(2), "enter and leave both advance");
        assert!(uc.tracker().pressed_keys().is_empty());
    }

    #[test]
    fn test_input_right_after_enter_is_admitted() {
        let (mut uc, em) = make_use_case(StaticLayout::us());
        uc.handle_message(&enter(0, 0, ModifierMask::empty()));

        uc.handle_message(&Message::MouseRelativeMove { dx: 5, dy: 5 });

        assert!(uc.guard().admit());
        assert_eq!(
            em.events(),
            vec![EmittedInput::Move(0, 0), EmittedInput::RelativeMove(5, 5)]
        );
    }

    #[test]
    fn test_enter_is_not_gated_by_pending_marker() {
        let (mut uc, em) = make_use_case(StaticLayout::us());
        uc.handle_message(&Message::Leave);

        uc.handle_message(&enter(10, 20, ModifierMask::empty()));

        assert!(uc.is_entered());
        assert_eq!(em.events(), vec![EmittedInput::Move(10, 20)]);
    }

    #[test]
    fn test_enter_toggles_lock_keys_to_match_server_mask() {
        // Arrange
        let (mut uc, em) = make_use_case(StaticLayout::us());

        // Act
        uc.handle_message(&enter(0, 0, ModifierMask::CAPS_LOCK | ModifierMask::SHIFT));

        // Assert: only the lock is synced; Shift is not a toggle.
        assert_eq!(
            em.keystrokes(),
            vec![
                Keystroke::press(b(vk::CAPITAL)),
                Keystroke::release(b(vk::CAPITAL)),
            ]
        );
        assert!(uc.tracker().is_modifier_active(ModifierMask::CAPS_LOCK));
    }

    #[test]
    fn test_reset_starts_shadow_state_over_but_keeps_locks() {
        // Arrange
        let (mut uc, _em) = make_use_case(StaticLayout::us());
        uc.handle_message(&enter(0, 0, ModifierMask::CAPS_LOCK));
        uc.handle_message(&key_down('a', ModifierMask::empty(), 1));
        uc.handle_message(&Message::Leave);

        // Act
        uc.reset();

        // Assert
        assert!(uc.tracker().pressed_keys().is_empty());
        assert_eq!(uc.tracker().current_mask(), ModifierMask::CAPS_LOCK);
        assert_eq!(uc.guard().current(), Mark::default());
        assert!(uc.guard().admit());
        assert!(!uc.is_entered());
    }

    // ── Mouse ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_mouse_move_deduplicates_identical_consecutive_positions() {
        // Arrange
        let (mut uc, em) = make_use_case(StaticLayout::us());
        let event = Message::MouseMove { x: 100, y: 200 };

        // Act
        uc.handle_message(&event);
        uc.handle_message(&event);

        // Assert
        assert_eq!(em.events(), vec![EmittedInput::Move(100, 200)]);
    }

    #[test]
    fn test_reset_clears_dedup_state() {
        let (mut uc, em) = make_use_case(StaticLayout::us());
        let event = Message::MouseMove { x: 100, y: 200 };
        uc.handle_message(&event);

        uc.reset();
        uc.handle_message(&event);

        assert_eq!(em.events().len(), 2);
    }

    #[test]
    fn test_mouse_buttons_and_wheel_pass_through() {
        let (mut uc, em) = make_use_case(StaticLayout::us());

        uc.handle_message(&Message::MouseDown { button: 1 });
        uc.handle_message(&Message::MouseUp { button: 1 });
        uc.handle_message(&Message::MouseWheel {
            x_delta: 0,
            y_delta: 120,
        });

        assert_eq!(
            em.events(),
            vec![
                EmittedInput::Button(1, true),
                EmittedInput::Button(1, false),
                EmittedInput::Wheel(0, 120),
            ]
        );
    }

    #[test]
    fn test_set_layout_switches_resolution() {
        // Arrange
        let (mut uc, em) = make_use_case(StaticLayout::us());

        // Act
        uc.set_layout(Arc::new(StaticLayout::de()));
        uc.handle_message(&key_down('€', ModifierMask::empty(), 1));

        // Assert: de has an AltGr key, so mode switch is driven by Right Alt.
        assert_eq!(
            em.keystrokes(),
            vec![
                Keystroke::press(NativeKey::ext(vk::RMENU)),
                Keystroke::press(b(vk::KEY_A + 4)),
                Keystroke::release(NativeKey::ext(vk::RMENU)),
            ]
        );
    }

    // ── Call order against a strict mock ──────────────────────────────────────

    mockall::mock! {
        Emulator {}
        impl PlatformInputEmulator for Emulator {
            fn emit_keystroke(&self, stroke: Keystroke);
            fn emit_mouse_move(&self, x: i32, y: i32);
            fn emit_mouse_relative_move(&self, dx: i32, dy: i32);
            fn emit_mouse_button(&self, button: u8, pressed: bool);
            fn emit_mouse_wheel(&self, x_delta: i16, y_delta: i16);
        }
    }

    #[test]
    fn test_click_after_enter_reaches_emulator_in_order() {
        // Arrange: any keystroke would be an unexpected call.
        let mut seq = mockall::Sequence::new();
        let mut emulator = MockEmulator::new();
        emulator
            .expect_emit_mouse_move()
            .with(mockall::predicate::eq(10), mockall::predicate::eq(20))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        emulator
            .expect_emit_mouse_button()
            .with(mockall::predicate::eq(1), mockall::predicate::eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        emulator
            .expect_emit_mouse_button()
            .with(mockall::predicate::eq(1), mockall::predicate::eq(false))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        let mut uc = EmulateInputUseCase::new(Arc::new(emulator), Arc::new(StaticLayout::us()));

        // Act
        uc.handle_message(&enter(10, 20, ModifierMask::empty()));
        uc.handle_message(&Message::MouseDown { button: 1 });
        uc.handle_message(&Message::MouseUp { button: 1 });

        // Assert: expectations are verified when the mock drops.
        drop(uc);
    }
}
