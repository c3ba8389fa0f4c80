//! Network infrastructure for the server application.
//!
//! Architecture:
//! - [`ServerListener`] accepts TCP connections.  While a client holds the
//!   [`ClientLink`] slot every further connection is answered with Busy and
//!   closed.
//! - [`handshake`] runs Hello → HelloBack → QueryInfo → Info → InfoAck on a
//!   fresh stream.  Its [`MessageReader`] is handed on to the session, so
//!   anything the client sent right behind Info is not lost.
//! - [`run_session`] then drains the client's outbound queue onto the socket,
//!   sends a KeepAlive every `keep_alive` period, and drops the client if it
//!   stays silent for three periods.
//!
//! # Sub-modules
//!
//! - **`client_link`** – The single client slot; implements the use case's
//!   `InputTransmitter`.

pub mod client_link;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use keyrelay_core::protocol::{ScreenInfo, PROTOCOL_MAJOR, PROTOCOL_MINOR};
use keyrelay_core::{
    decode_message, encode_frame, CodecLimits, FrameDecoder, Message, MessageKind, ProtocolError,
};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::mpsc,
    time::{self, Instant},
};
use tracing::{debug, error, info, warn};

pub use client_link::ClientLink;

const READ_CHUNK: usize = 4096;

/// Missed keep-alive periods before a client is considered gone.
const KEEP_ALIVE_MISSES: u32 = 3;

/// Errors that can occur in the server network layer.
#[derive(Debug, Error)]
pub enum ServerNetworkError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("client speaks incompatible protocol version {major}.{minor}")]
    IncompatibleVersion { major: u16, minor: u16 },
    #[error("expected {expected:?} during handshake, got {got:?}")]
    UnexpectedMessage {
        expected: MessageKind,
        got: MessageKind,
    },
    #[error("client silent for {0:?}")]
    Timeout(Duration),
    #[error("connection closed by client")]
    Closed,
}

/// Configuration for the network service.
#[derive(Debug, Clone)]
pub struct ServerNetworkConfig {
    /// `host:port` to listen on.
    pub listen_addr: String,
    pub keep_alive: Duration,
    pub limits: CodecLimits,
}

impl Default for ServerNetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", keyrelay_core::protocol::DEFAULT_PORT),
            keep_alive: Duration::from_secs(3),
            limits: CodecLimits::default(),
        }
    }
}

impl ServerNetworkConfig {
    fn silence_limit(&self) -> Duration {
        self.keep_alive * KEEP_ALIVE_MISSES
    }
}

/// Events emitted by the network layer to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    ClientConnected { name: String },
    ClientDisconnected { name: String },
}

/// Reassembles messages from a byte stream.
pub struct MessageReader {
    decoder: FrameDecoder,
    limits: CodecLimits,
    buf: Vec<u8>,
}

impl MessageReader {
    pub fn new(limits: CodecLimits) -> Self {
        Self {
            decoder: FrameDecoder::new(limits.max_message_size),
            limits,
            buf: vec![0u8; READ_CHUNK],
        }
    }

    /// Reads from `reader` until one whole message is available.
    ///
    /// Cancel-safe: a partial frame stays buffered in the decoder.
    async fn next<R>(&mut self, reader: &mut R) -> Result<Message, ServerNetworkError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            if let Some(payload) = self.decoder.next_frame()? {
                return Ok(decode_message(&payload, &self.limits)?);
            }
            let n = reader.read(&mut self.buf).await?;
            if n == 0 {
                return Err(ServerNetworkError::Closed);
            }
            self.decoder.extend(&self.buf[..n]);
        }
    }

    async fn next_within<R>(
        &mut self,
        reader: &mut R,
        limit: Duration,
    ) -> Result<Message, ServerNetworkError>
    where
        R: AsyncRead + Unpin,
    {
        time::timeout(limit, self.next(reader))
            .await
            .map_err(|_| ServerNetworkError::Timeout(limit))?
    }
}

async fn send<W>(writer: &mut W, msg: &Message) -> Result<(), ServerNetworkError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_frame(msg)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Runs the server side of the handshake.
///
/// Returns the client's screen name and shape.  On a major version
/// mismatch the client is told so before the error is returned.
///
/// # Errors
///
/// Any [`ServerNetworkError`]; the caller drops the connection.
pub async fn handshake<S>(
    stream: &mut S,
    frames: &mut MessageReader,
    config: &ServerNetworkConfig,
) -> Result<(String, ScreenInfo), ServerNetworkError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let limit = config.silence_limit();

    send(stream, &Message::hello()).await?;
    let name = match frames.next_within(stream, limit).await? {
        Message::HelloBack { major, minor, name } if major == PROTOCOL_MAJOR => {
            debug!(major, minor, %name, "hello back");
            name
        }
        Message::HelloBack { major, minor, .. } => {
            let reply = Message::IncompatibleVersion {
                major: PROTOCOL_MAJOR,
                minor: PROTOCOL_MINOR,
            };
            send(stream, &reply).await?;
            return Err(ServerNetworkError::IncompatibleVersion { major, minor });
        }
        other => return Err(unexpected(MessageKind::HelloBack, &other)),
    };

    send(stream, &Message::QueryInfo).await?;
    let info = match frames.next_within(stream, limit).await? {
        Message::Info(info) => info,
        other => return Err(unexpected(MessageKind::Info, &other)),
    };

    send(stream, &Message::InfoAck).await?;
    Ok((name, info))
}

fn unexpected(expected: MessageKind, got: &Message) -> ServerNetworkError {
    ServerNetworkError::UnexpectedMessage {
        expected,
        got: got.kind(),
    }
}

/// Drives an attached client until either side ends the session.
///
/// `frames` carries over whatever the handshake already buffered.
///
/// Returns `Ok(())` when the client says goodbye or the outbound queue is
/// closed (after sending Close).
///
/// # Errors
///
/// I/O and protocol faults, silence past three keep-alive periods, and EOF.
pub async fn run_session<S>(
    stream: S,
    mut frames: MessageReader,
    config: &ServerNetworkConfig,
    link: &ClientLink,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) -> Result<(), ServerNetworkError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut keep_alive = time::interval_at(Instant::now() + config.keep_alive, config.keep_alive);
    let mut last_heard = Instant::now();

    loop {
        tokio::select! {
            biased;

            msg = outbound.recv() => match msg {
                Some(msg) => send(&mut writer, &msg).await?,
                None => {
                    send(&mut writer, &Message::Close).await?;
                    return Ok(());
                }
            },

            _ = keep_alive.tick() => {
                if last_heard.elapsed() >= config.silence_limit() {
                    return Err(ServerNetworkError::Timeout(config.silence_limit()));
                }
                send(&mut writer, &Message::KeepAlive).await?;
            }

            msg = frames.next(&mut reader) => {
                last_heard = Instant::now();
                match msg? {
                    Message::KeepAlive | Message::NoOp => {}
                    Message::Close => return Ok(()),
                    Message::Info(info) => {
                        link.update_screen(info);
                        send(&mut writer, &Message::InfoAck).await?;
                    }
                    other => warn!(kind = ?other.kind(), "unexpected message from client ignored"),
                }
            }
        }
    }
}

/// Accepts clients and runs their sessions.
pub struct ServerListener {
    config: ServerNetworkConfig,
    link: Arc<ClientLink>,
}

impl ServerListener {
    pub fn new(config: ServerNetworkConfig, link: Arc<ClientLink>) -> Self {
        Self { config, link }
    }

    /// Binds the configured address.
    ///
    /// # Errors
    ///
    /// [`ServerNetworkError::BindFailed`] if the address is unavailable.
    pub async fn bind(&self) -> Result<TcpListener, ServerNetworkError> {
        TcpListener::bind(&self.config.listen_addr)
            .await
            .map_err(|source| ServerNetworkError::BindFailed {
                addr: self.config.listen_addr.clone(),
                source,
            })
    }

    /// Accept loop.  Runs until `running` is cleared or `events` is closed.
    pub async fn run(
        self: Arc<Self>,
        listener: TcpListener,
        running: Arc<AtomicBool>,
        events: mpsc::UnboundedSender<ServerEvent>,
    ) {
        while running.load(Ordering::Relaxed) && !events.is_closed() {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("accept failed: {e}");
                    continue;
                }
            };

            if self.link.is_attached() {
                info!(%peer_addr, "rejecting connection: a client is already attached");
                tokio::spawn(async move {
                    let mut stream = stream;
                    let _ = send(&mut stream, &Message::Busy).await;
                });
                continue;
            }

            let this = Arc::clone(&self);
            let events = events.clone();
            tokio::spawn(async move {
                this.serve(stream, events).await;
            });
        }
    }

    async fn serve(&self, mut stream: TcpStream, events: mpsc::UnboundedSender<ServerEvent>) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("could not disable Nagle: {e}");
        }

        let mut frames = MessageReader::new(self.config.limits);
        let (name, screen) = match handshake(&mut stream, &mut frames, &self.config).await {
            Ok(hello) => hello,
            Err(e) => {
                warn!("handshake failed: {e}");
                return;
            }
        };

        let Some(outbound) = self.link.attach(&name, screen) else {
            let _ = send(&mut stream, &Message::Busy).await;
            return;
        };
        let _ = events.send(ServerEvent::ClientConnected { name: name.clone() });

        match run_session(stream, frames, &self.config, &self.link, outbound).await {
            Ok(()) => info!(%name, "session closed"),
            Err(e) => error!(%name, "session ended: {e}"),
        }

        self.link.detach();
        let _ = events.send(ServerEvent::ClientDisconnected { name });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use keyrelay_core::{KeyId, ModifierMask};
    use tokio_test::io::Builder;

    use super::*;
    use crate::application::forward_input::InputTransmitter;

    fn wire(msg: &Message) -> Vec<u8> {
        encode_frame(msg).expect("encode")
    }

    fn hello_back(major: u16) -> Message {
        Message::HelloBack {
            major,
            minor: PROTOCOL_MINOR,
            name: "laptop".to_string(),
        }
    }

    fn reader() -> MessageReader {
        MessageReader::new(CodecLimits::default())
    }

    fn laptop_screen() -> ScreenInfo {
        ScreenInfo {
            x: 0,
            y: 0,
            width: 1366,
            height: 768,
            mouse_x: 683,
            mouse_y: 384,
        }
    }

    #[test]
    fn test_default_config_listens_on_protocol_port() {
        let cfg = ServerNetworkConfig::default();
        assert!(cfg.listen_addr.ends_with(":24800"));
        assert_eq!(cfg.silence_limit(), Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_handshake_collects_name_and_screen() {
        // Arrange
        let mut stream = Builder::new()
            .write(&wire(&Message::hello()))
            .read(&wire(&hello_back(PROTOCOL_MAJOR)))
            .write(&wire(&Message::QueryInfo))
            .read(&wire(&Message::Info(laptop_screen())))
            .write(&wire(&Message::InfoAck))
            .build();

        // Act
        let result = handshake(&mut stream, &mut reader(), &ServerNetworkConfig::default()).await;

        // Assert
        let (name, screen) = result.expect("handshake");
        assert_eq!(name, "laptop");
        assert_eq!(screen, laptop_screen());
    }

    #[tokio::test]
    async fn test_handshake_rejects_other_major_version() {
        // Arrange
        let mut stream = Builder::new()
            .write(&wire(&Message::hello()))
            .read(&wire(&hello_back(PROTOCOL_MAJOR + 1)))
            .write(&wire(&Message::IncompatibleVersion {
                major: PROTOCOL_MAJOR,
                minor: PROTOCOL_MINOR,
            }))
            .build();

        // Act
        let result = handshake(&mut stream, &mut reader(), &ServerNetworkConfig::default()).await;

        // Assert
        assert!(matches!(
            result,
            Err(ServerNetworkError::IncompatibleVersion { major: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_handshake_rejects_wrong_reply() {
        let mut stream = Builder::new()
            .write(&wire(&Message::hello()))
            .read(&wire(&Message::KeepAlive))
            .build();

        let result = handshake(&mut stream, &mut reader(), &ServerNetworkConfig::default()).await;

        assert!(matches!(
            result,
            Err(ServerNetworkError::UnexpectedMessage {
                expected: MessageKind::HelloBack,
                got: MessageKind::KeepAlive,
            })
        ));
    }

    #[tokio::test]
    async fn test_bytes_sent_right_after_info_reach_the_session() {
        // Arrange: Close is pipelined behind Info in the same read, and the
        // stream has nothing more to give.
        let config = ServerNetworkConfig::default();
        let mut info_then_close = wire(&Message::Info(laptop_screen()));
        info_then_close.extend(wire(&Message::Close));
        let mut stream = Builder::new()
            .write(&wire(&Message::hello()))
            .read(&wire(&hello_back(PROTOCOL_MAJOR)))
            .write(&wire(&Message::QueryInfo))
            .read(&info_then_close)
            .write(&wire(&Message::InfoAck))
            .build();
        let mut frames = reader();
        let link = ClientLink::new();
        let (_tx, rx) = mpsc::unbounded_channel();

        // Act
        let (name, _) = handshake(&mut stream, &mut frames, &config)
            .await
            .expect("handshake");
        let result = run_session(stream, frames, &config, &link, rx).await;

        // Assert
        assert_eq!(name, "laptop");
        assert!(result.is_ok(), "buffered Close was lost: {result:?}");
    }

    #[tokio::test]
    async fn test_session_drains_outbound_then_closes() {
        // Arrange
        let key_down = Message::KeyDown {
            id: KeyId::from_char('q'),
            mask: ModifierMask::empty(),
            button: 0x51,
        };
        let stream = Builder::new()
            .write(&wire(&key_down))
            .write(&wire(&Message::Close))
            .build();
        let link = ClientLink::new();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(key_down.clone()).expect("queue");
        drop(tx);

        // Act
        let result = run_session(stream, reader(), &ServerNetworkConfig::default(), &link, rx).await;

        // Assert
        assert!(result.is_ok(), "got {result:?}");
    }

    #[tokio::test]
    async fn test_session_ends_on_client_close() {
        // Arrange
        let stream = Builder::new()
            .read(&wire(&Message::KeepAlive))
            .read(&wire(&Message::Close))
            .build();
        let link = ClientLink::new();
        let (_tx, rx) = mpsc::unbounded_channel();

        // Act
        let result = run_session(stream, reader(), &ServerNetworkConfig::default(), &link, rx).await;

        // Assert
        assert!(result.is_ok(), "got {result:?}");
    }

    #[tokio::test]
    async fn test_session_acknowledges_screen_change() {
        // Arrange
        let link = ClientLink::new();
        let _queue = link.attach("laptop", ScreenInfo::default());
        let stream = Builder::new()
            .read(&wire(&Message::Info(laptop_screen())))
            .write(&wire(&Message::InfoAck))
            .read(&wire(&Message::Close))
            .build();
        let (_tx, rx) = mpsc::unbounded_channel();

        // Act
        let result = run_session(stream, reader(), &ServerNetworkConfig::default(), &link, rx).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(link.client_screen(), Some(laptop_screen()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_client_times_out() {
        // Arrange: the client never answers; keep-alives go out until the
        // silence limit is reached.
        let config = ServerNetworkConfig::default();
        let stream = Builder::new()
            .write(&wire(&Message::KeepAlive))
            .write(&wire(&Message::KeepAlive))
            .wait(Duration::from_secs(60))
            .build();
        let link = ClientLink::new();
        let (_tx, rx) = mpsc::unbounded_channel();

        // Act
        let result = run_session(stream, reader(), &config, &link, rx).await;

        // Assert
        assert!(matches!(result, Err(ServerNetworkError::Timeout(_))));
    }
}
