//! ClientLink: the single client slot and its outbound queue.
//!
//! The server drives one client at a time.  A session that completes its
//! handshake attaches here and receives an outbound queue; the forwarding
//! use case sends through the slot via [`InputTransmitter`].

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use keyrelay_core::protocol::ScreenInfo;
use keyrelay_core::Message;
use tokio::sync::mpsc;
use tracing::info;

use crate::application::forward_input::InputTransmitter;

#[derive(Debug)]
struct Peer {
    name: String,
    screen: ScreenInfo,
    outbound: mpsc::UnboundedSender<Message>,
}

/// The connected client, if any.
#[derive(Debug, Default)]
pub struct ClientLink {
    peer: Mutex<Option<Peer>>,
}

impl ClientLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for `name`.
    ///
    /// Returns the queue the session must drain onto the socket, or `None`
    /// if another client already holds the slot.
    pub fn attach(
        &self,
        name: &str,
        screen: ScreenInfo,
    ) -> Option<mpsc::UnboundedReceiver<Message>> {
        let mut peer = self.lock();
        if peer.is_some() {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        info!(name, width = screen.width, height = screen.height, "client attached");
        *peer = Some(Peer {
            name: name.to_string(),
            screen,
            outbound: tx,
        });
        Some(rx)
    }

    /// Frees the slot.
    pub fn detach(&self) {
        if let Some(peer) = self.lock().take() {
            info!(name = %peer.name, "client detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.lock().is_some()
    }

    pub fn client_name(&self) -> Option<String> {
        self.lock().as_ref().map(|p| p.name.clone())
    }

    /// Records a screen change reported mid-session.
    pub fn update_screen(&self, screen: ScreenInfo) {
        if let Some(peer) = self.lock().as_mut() {
            peer.screen = screen;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Peer>> {
        self.peer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl InputTransmitter for ClientLink {
    fn client_screen(&self) -> Option<ScreenInfo> {
        self.lock().as_ref().map(|p| p.screen)
    }

    async fn send(&self, msg: Message) -> Result<(), String> {
        match self.lock().as_ref() {
            Some(peer) => peer
                .outbound
                .send(msg)
                .map_err(|_| format!("session for {} has ended", peer.name)),
            None => Err("no client connected".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> ScreenInfo {
        ScreenInfo {
            width: 1024,
            height: 768,
            ..Default::default()
        }
    }

    #[test]
    fn test_second_attach_is_refused() {
        // Arrange
        let link = ClientLink::new();

        // Act
        let first = link.attach("a", screen());
        let second = link.attach("b", screen());

        // Assert
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(link.client_name().as_deref(), Some("a"));
    }

    #[test]
    fn test_detach_frees_the_slot() {
        let link = ClientLink::new();
        let _rx = link.attach("a", screen());

        link.detach();

        assert!(!link.is_attached());
        assert!(link.attach("b", screen()).is_some());
    }

    #[tokio::test]
    async fn test_send_queues_onto_attached_session() {
        // Arrange
        let link = ClientLink::new();
        let mut rx = link.attach("a", screen()).expect("attach");

        // Act
        link.send(Message::KeepAlive).await.expect("send");

        // Assert
        assert_eq!(rx.try_recv().ok(), Some(Message::KeepAlive));
    }

    #[tokio::test]
    async fn test_send_without_client_fails() {
        let link = ClientLink::new();
        assert!(link.send(Message::Leave).await.is_err());
        assert_eq!(link.client_screen(), None);
    }

    #[test]
    fn test_update_screen_replaces_reported_shape() {
        let link = ClientLink::new();
        let _rx = link.attach("a", screen());

        link.update_screen(ScreenInfo {
            width: 1920,
            height: 1080,
            ..Default::default()
        });

        assert_eq!(link.client_screen().map(|s| s.width), Some(1920));
    }
}
