//! Network infrastructure for the client application.
//!
//! Handles the TCP connection to the server and dispatches inbound
//! [`Message`]s to the application layer.
//!
//! Architecture:
//! - `ClientConnection` runs a reconnect loop; each established stream is
//!   driven by [`run_session`] until it ends.
//! - The session answers the handshake, info queries and keep-alives itself.
//!   Everything the use case needs (input, enter/leave, screen saver) is
//!   forwarded on an `mpsc` channel as [`NetworkEvent::Message`], in the
//!   order it was read off the socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use keyrelay_core::protocol::{ScreenInfo, PROTOCOL_MAJOR, PROTOCOL_MINOR};
use keyrelay_core::{
    decode_message, encode_frame, CodecLimits, FrameDecoder, Message, ProtocolError,
};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
    task::JoinHandle,
    time,
};
use tracing::{debug, error, info, warn};

const READ_CHUNK: usize = 4096;

/// Errors that can occur in the client network layer.
#[derive(Debug, Error)]
pub enum ClientNetworkError {
    /// TCP connection to the server failed.
    #[error("failed to connect to server at {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A frame or message could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// The server speaks a protocol major version we do not.
    #[error("incompatible protocol version {major}.{minor}")]
    IncompatibleVersion { major: u16, minor: u16 },
    /// The server refused or aborted the session.
    #[error("server rejected the session: {0}")]
    Rejected(&'static str),
    /// Nothing arrived within the keep-alive timeout.
    #[error("no data from server for {0:?}")]
    Timeout(Duration),
    /// The connection was closed by the remote side.
    #[error("connection closed by server")]
    Closed,
}

/// Configuration for the client's network connection.
#[derive(Debug, Clone)]
pub struct ClientConnectionConfig {
    /// `host:port` of the server.
    pub server_addr: String,
    /// Name sent in the hello reply.
    pub screen_name: String,
    /// Reconnect interval when the connection drops.
    pub reconnect_interval: Duration,
    /// The session is dropped if the server is silent this long.
    pub read_timeout: Duration,
    pub limits: CodecLimits,
    /// Answer to the server's info query.
    pub screen: ScreenInfo,
}

impl Default for ClientConnectionConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", keyrelay_core::protocol::DEFAULT_PORT),
            screen_name: "keyrelay-client".to_string(),
            reconnect_interval: Duration::from_secs(5),
            read_timeout: Duration::from_secs(9),
            limits: CodecLimits::default(),
            screen: ScreenInfo::default(),
        }
    }
}

/// Events emitted by the network layer to the application layer.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    /// The handshake completed.
    Connected,
    /// A message for the input use case.
    Message(Message),
    /// The session ended; the connection loop will reconnect.
    Disconnected,
}

/// Manages the TCP connection from the client to the server.
pub struct ClientConnection {
    config: ClientConnectionConfig,
}

impl ClientConnection {
    /// Creates a new (not yet connected) `ClientConnection`.
    pub fn new(config: ClientConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConnectionConfig {
        &self.config
    }

    /// Spawns the reconnect loop.
    ///
    /// Events are delivered on `tx`.  The loop runs until `running` is
    /// cleared or the receiving side of `tx` is dropped.
    pub fn start(
        self: Arc<Self>,
        running: Arc<AtomicBool>,
        tx: mpsc::UnboundedSender<NetworkEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while running.load(Ordering::Relaxed) && !tx.is_closed() {
                match self.connect().await {
                    Ok(stream) => {
                        info!("connected to server at {}", self.config.server_addr);
                        if let Err(e) = stream.set_nodelay(true) {
                            warn!("could not disable Nagle: {e}");
                        }

                        match run_session(stream, &self.config, &tx).await {
                            Ok(()) => info!("server closed the session"),
                            Err(e) => error!("session ended: {e}"),
                        }

                        let _ = tx.send(NetworkEvent::Disconnected);
                        info!(
                            "disconnected from server; reconnecting in {:?}",
                            self.config.reconnect_interval
                        );
                    }
                    Err(e) => warn!("{e}"),
                }

                if running.load(Ordering::Relaxed) {
                    time::sleep(self.config.reconnect_interval).await;
                }
            }
        })
    }

    async fn connect(&self) -> Result<TcpStream, ClientNetworkError> {
        TcpStream::connect(&self.config.server_addr)
            .await
            .map_err(|source| ClientNetworkError::ConnectFailed {
                addr: self.config.server_addr.clone(),
                source,
            })
    }
}

/// Drives one session on an established stream.
///
/// Returns `Ok(())` when the server says goodbye or the application stops
/// listening; any protocol fault ends the session with an error.
///
/// # Errors
///
/// [`ClientNetworkError`] for I/O failures, malformed frames, version
/// mismatch, server-side rejection, silence past the read timeout, and
/// EOF.
pub async fn run_session<S>(
    mut stream: S,
    config: &ClientConnectionConfig,
    tx: &mpsc::UnboundedSender<NetworkEvent>,
) -> Result<(), ClientNetworkError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut decoder = FrameDecoder::new(config.limits.max_message_size);
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let n = time::timeout(config.read_timeout, stream.read(&mut buf))
            .await
            .map_err(|_| ClientNetworkError::Timeout(config.read_timeout))??;
        if n == 0 {
            return Err(ClientNetworkError::Closed);
        }
        decoder.extend(&buf[..n]);

        while let Some(payload) = decoder.next_frame()? {
            let msg = decode_message(&payload, &config.limits)?;
            match handle_message(msg, config) {
                Step::Reply(reply) => {
                    if matches!(reply, Message::HelloBack { .. }) {
                        let _ = tx.send(NetworkEvent::Connected);
                    }
                    send(&mut stream, &reply).await?;
                }
                Step::Forward(msg) => {
                    if tx.send(NetworkEvent::Message(msg)).is_err() {
                        return Ok(());
                    }
                }
                Step::Ignore => {}
                Step::Finish => return Ok(()),
                Step::Fail(reply, err) => {
                    if let Some(reply) = reply {
                        send(&mut stream, &reply).await?;
                    }
                    return Err(err);
                }
            }
        }
    }
}

enum Step {
    Reply(Message),
    Forward(Message),
    Ignore,
    Finish,
    Fail(Option<Message>, ClientNetworkError),
}

fn handle_message(msg: Message, config: &ClientConnectionConfig) -> Step {
    match msg {
        Message::Hello { major, minor } => {
            if major != PROTOCOL_MAJOR {
                warn!(major, minor, "server protocol version is incompatible");
                return Step::Fail(
                    Some(Message::IncompatibleVersion {
                        major: PROTOCOL_MAJOR,
                        minor: PROTOCOL_MINOR,
                    }),
                    ClientNetworkError::IncompatibleVersion { major, minor },
                );
            }
            info!(major, minor, "server hello");
            Step::Reply(Message::HelloBack {
                major: PROTOCOL_MAJOR,
                minor: PROTOCOL_MINOR,
                name: config.screen_name.clone(),
            })
        }
        Message::QueryInfo => Step::Reply(Message::Info(config.screen)),
        Message::KeepAlive => Step::Reply(Message::KeepAlive),
        Message::Close => Step::Finish,
        Message::Busy => Step::Fail(None, ClientNetworkError::Rejected("server busy")),
        Message::IncompatibleVersion { major, minor } => Step::Fail(
            None,
            ClientNetworkError::IncompatibleVersion { major, minor },
        ),
        Message::Bad => Step::Fail(None, ClientNetworkError::Rejected("protocol violation")),
        Message::Unknown => Step::Fail(None, ClientNetworkError::Rejected("unknown client")),
        Message::NoOp | Message::InfoAck | Message::ResetOptions | Message::SetOptions(_) => {
            debug!(kind = ?msg.kind(), "control message");
            Step::Ignore
        }
        Message::HelloBack { .. } | Message::Info(_) => {
            warn!(kind = ?msg.kind(), "unexpected message from server ignored");
            Step::Ignore
        }
        // Input, enter/leave and screen saver belong to the use case.
        msg => Step::Forward(msg),
    }
}

async fn send<S>(stream: &mut S, msg: &Message) -> Result<(), ClientNetworkError>
where
    S: AsyncWrite + Unpin,
{
    let bytes = encode_frame(msg)?;
    stream.write_all(&bytes).await?;
    stream.flush().await?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
