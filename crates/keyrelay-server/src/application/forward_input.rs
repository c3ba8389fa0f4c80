//! ForwardInputUseCase: turns captured local input into protocol messages.
//!
//! This use case is the heart of the server application.  It receives raw
//! events from the capture service, keeps the shadow key state current, and
//! while the client has focus translates every event into the message the
//! client needs:
//!
//! ```text
//! RawInputEvent ─► EventOrderGuard ─► ModifierTracker ─► KeyResolver::translate ─► transmitter
//! ```
//!
//! Focus moves with the switch hotkey.  Each move advances the event order
//! guard, so anything captured before the switch and still queued is dropped.
//!
//! # Architecture
//!
//! This use case depends only on traits (`InputTransmitter`, `CursorController`)
//! and core types.  All infrastructure implementations are injected at
//! construction time, making the use case fully unit-testable.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use keyrelay_core::protocol::ScreenInfo;
use keyrelay_core::{
    EventOrderGuard, KeyId, KeyResolver, KeyboardLayout, MarkerSink, Message, ModifierTracker,
    NativeKey,
};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::infrastructure::input_capture::{MouseButton, RawInputEvent};

/// Error type for the forward-input use case.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("transmitter error: {0}")]
    Transmit(String),
}

/// Trait for sending messages to the connected client.
///
/// The infrastructure implementation queues onto the client's TCP session;
/// test implementations record calls.
#[async_trait]
pub trait InputTransmitter: Send + Sync {
    /// Screen reported by the connected client, or `None` if no client is
    /// connected.
    fn client_screen(&self) -> Option<ScreenInfo>;

    /// Sends one message to the connected client.
    async fn send(&self, msg: Message) -> Result<(), String>;
}

/// Trait for controlling the physical server cursor position.
///
/// Infrastructure implementation calls `SetCursorPos`; test implementation records calls.
pub trait CursorController: Send + Sync {
    /// Teleports the physical cursor to (x, y) in server-local coordinates.
    fn teleport_cursor(&self, x: i32, y: i32);

    /// Returns the current physical cursor position in server-local coordinates.
    fn get_cursor_pos(&self) -> (i32, i32);

    /// Size of the server's primary screen in pixels.
    fn screen_size(&self) -> (i32, i32);
}

/// Which machine currently has the keyboard and mouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveTarget {
    /// Input stays on the server.
    #[default]
    Local,
    /// Input is forwarded to the client.
    Client,
}

/// The Forward Input use case.
pub struct ForwardInputUseCase {
    transmitter: Arc<dyn InputTransmitter>,
    cursor: Arc<dyn CursorController>,
    markers: Box<dyn MarkerSink + Send>,
    guard: EventOrderGuard,
    tracker: ModifierTracker,
    resolver: KeyResolver,
    active: ActiveTarget,
    /// Native code of the focus-toggle key.
    hotkey: u16,
    hotkey_down: bool,
    /// Key id sent on each press, so the release names the same key.
    sent: HashMap<NativeKey, KeyId>,
    /// Where the cursor was when focus left the server.
    return_pos: (i32, i32),
    sequence: u32,
}

impl ForwardInputUseCase {
    /// Creates a new use case instance with focus on the server.
    pub fn new(
        transmitter: Arc<dyn InputTransmitter>,
        cursor: Arc<dyn CursorController>,
        layout: Arc<dyn KeyboardLayout>,
        markers: Box<dyn MarkerSink + Send>,
        hotkey: u16,
    ) -> Self {
        let tracker = ModifierTracker::new(layout.as_ref());
        Self {
            transmitter,
            cursor,
            markers,
            guard: EventOrderGuard::new(),
            tracker,
            resolver: KeyResolver::new(layout),
            active: ActiveTarget::Local,
            hotkey,
            hotkey_down: false,
            sent: HashMap::new(),
            return_pos: (0, 0),
            sequence: 0,
        }
    }

    /// Returns the currently active target.
    pub fn active_target(&self) -> ActiveTarget {
        self.active
    }

    pub fn tracker(&self) -> &ModifierTracker {
        &self.tracker
    }

    /// Handles a raw event from the capture channel.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardError::Transmit`] if the transmitter fails to deliver
    /// a message.
    pub async fn handle_event(&mut self, event: RawInputEvent) -> Result<(), ForwardError> {
        match event {
            RawInputEvent::Marker(mark) => {
                self.guard.observe(mark);
                return Ok(());
            }
            // The hotkey is consumed here, ahead of the guard, and never
            // reaches the tracker.
            RawInputEvent::KeyDown { key, .. } if key.code == self.hotkey => {
                if !std::mem::replace(&mut self.hotkey_down, true) {
                    self.toggle_focus().await?;
                }
                return Ok(());
            }
            RawInputEvent::KeyUp { key, .. } if key.code == self.hotkey => {
                self.hotkey_down = false;
                return Ok(());
            }
            _ => {}
        }
        if !self.guard.admit() {
            trace!(?event, "dropping input captured before the last focus change");
            return Ok(());
        }

        match event {
            RawInputEvent::KeyDown { key, .. } => self.handle_key_down(key).await,
            RawInputEvent::KeyUp { key, .. } => self.handle_key_up(key).await,
            RawInputEvent::MouseMove { x, y, .. } => self.handle_mouse_move(x, y).await,
            RawInputEvent::MouseButtonDown { button, .. } => {
                self.handle_mouse_button(button, true).await
            }
            RawInputEvent::MouseButtonUp { button, .. } => {
                self.handle_mouse_button(button, false).await
            }
            RawInputEvent::MouseWheel { delta, .. } => self.handle_mouse_wheel(0, delta).await,
            RawInputEvent::MouseWheelH { delta, .. } => self.handle_mouse_wheel(delta, 0).await,
            RawInputEvent::Marker(_) => Ok(()),
        }
    }

    /// The client's session ended; focus returns to the server without
    /// telling anyone.
    pub fn client_disconnected(&mut self) {
        if self.active == ActiveTarget::Client {
            info!("client went away; input returns to the server");
            self.return_to_local();
        }
    }

    // ── Private event handlers ────────────────────────────────────────────────

    async fn handle_key_down(&mut self, key: NativeKey) -> Result<(), ForwardError> {
        let repeat = self.tracker.is_native_key_down(key);
        self.tracker.press(key);
        if self.active == ActiveTarget::Local {
            return Ok(());
        }

        let button = key.button_id();
        if repeat {
            if let Some(&id) = self.sent.get(&key) {
                let mask = self.tracker.current_mask();
                return self
                    .send(Message::KeyRepeat {
                        id,
                        mask,
                        count: 1,
                        button,
                    })
                    .await;
            }
        }

        let Some((id, mask)) = self.resolver.translate(key, &self.tracker) else {
            debug!(?key, "captured key has no key id; not forwarded");
            return Ok(());
        };
        self.sent.insert(key, id);
        self.send(Message::KeyDown { id, mask, button }).await
    }

    async fn handle_key_up(&mut self, key: NativeKey) -> Result<(), ForwardError> {
        self.tracker.release(key);

        let Some(id) = self.sent.remove(&key) else {
            return Ok(());
        };
        if self.active == ActiveTarget::Local {
            return Ok(());
        }
        let mask = self.tracker.current_mask();
        self.send(Message::KeyUp {
            id,
            mask,
            button: key.button_id(),
        })
        .await
    }

    async fn handle_mouse_move(&mut self, x: i32, y: i32) -> Result<(), ForwardError> {
        if self.active == ActiveTarget::Local {
            return Ok(());
        }

        // The cursor is parked at the centre; every move is an offset from it.
        let (cx, cy) = self.centre();
        let (dx, dy) = (clamp_i16(x - cx), clamp_i16(y - cy));
        if dx == 0 && dy == 0 {
            return Ok(());
        }
        self.cursor.teleport_cursor(cx, cy);
        self.send(Message::MouseRelativeMove { dx, dy }).await
    }

    async fn handle_mouse_button(
        &mut self,
        button: MouseButton,
        pressed: bool,
    ) -> Result<(), ForwardError> {
        if self.active == ActiveTarget::Local {
            return Ok(());
        }
        let button = button.id();
        let msg = if pressed {
            Message::MouseDown { button }
        } else {
            Message::MouseUp { button }
        };
        self.send(msg).await
    }

    async fn handle_mouse_wheel(&mut self, x_delta: i16, y_delta: i16) -> Result<(), ForwardError> {
        if self.active == ActiveTarget::Local {
            return Ok(());
        }
        self.send(Message::MouseWheel { x_delta, y_delta }).await
    }

    async fn toggle_focus(&mut self) -> Result<(), ForwardError> {
        match self.active {
            ActiveTarget::Local => {
                let Some(screen) = self.transmitter.client_screen() else {
                    warn!("switch hotkey pressed but no client is connected");
                    return Ok(());
                };
                let mark = self.guard.advance(self.markers.as_mut());
                self.active = ActiveTarget::Client;
                self.sequence = self.sequence.wrapping_add(1);
                self.return_pos = self.cursor.get_cursor_pos();
                let (cx, cy) = self.centre();
                self.cursor.teleport_cursor(cx, cy);
                info!(?mark, "focus moved to client");

                self.send(Message::Enter {
                    x: screen.mouse_x,
                    y: screen.mouse_y,
                    sequence: self.sequence,
                    mask: self.tracker.current_mask(),
                })
                .await
            }
            ActiveTarget::Client => {
                self.return_to_local();
                self.send(Message::Leave).await
            }
        }
    }

    fn return_to_local(&mut self) {
        let mark = self.guard.advance(self.markers.as_mut());
        self.active = ActiveTarget::Local;
        self.sent.clear();
        let (x, y) = self.return_pos;
        self.cursor.teleport_cursor(x, y);
        info!(?mark, "focus returned to server");
    }

    fn centre(&self) -> (i32, i32) {
        let (w, h) = self.cursor.screen_size();
        (w / 2, h / 2)
    }

    async fn send(&self, msg: Message) -> Result<(), ForwardError> {
        self.transmitter.send(msg).await.map_err(ForwardError::Transmit)
    }
}

fn clamp_i16(v: i32) -> i16 {
    v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

// ── Tests ─────────────────────────────────────────────────────────────────────
