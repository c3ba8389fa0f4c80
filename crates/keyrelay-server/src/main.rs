//! KeyRelay Server Application entry point.
//!
//! Wires together all infrastructure services and runs the Tokio event loop.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()               -- TOML file or defaults
//!  └─ ServerListener::run()       -- TCP accept loop, one client slot
//!  └─ InputSource::start()        -- Windows hook thread
//!  └─ event dispatch loop
//!       ├─ RawInputEvent          -> ForwardInputUseCase::handle_event
//!       └─ ClientDisconnected     -> ForwardInputUseCase::client_disconnected
//! ```
//!
//! The use case's markers are sent into the raw event channel, behind
//! anything the hooks captured before the focus switch.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use keyrelay_core::{KeyboardLayout, Mark, StaticLayout};
use keyrelay_server::application::forward_input::{
    ActiveTarget, CursorController, ForwardInputUseCase,
};
use keyrelay_server::infrastructure::{
    input_capture::{InputSource, RawInputEvent},
    network::{ClientLink, ServerEvent, ServerListener, ServerNetworkConfig},
    storage::config::{load_config, ServerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config unavailable ({e}); using defaults");
            ServerConfig::default()
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_level))
                .context("invalid log_level in config")?,
        )
        .init();

    info!("KeyRelay Server starting");

    let layout: Arc<dyn KeyboardLayout> = match StaticLayout::by_name(&config.keyboard.layout) {
        Some(layout) => Arc::new(layout),
        None => {
            warn!(layout = %config.keyboard.layout, "unknown keyboard layout; using us");
            Arc::new(StaticLayout::us())
        }
    };

    let running = Arc::new(AtomicBool::new(true));

    // ── Network ───────────────────────────────────────────────────────────────
    let link = Arc::new(ClientLink::new());
    let net_cfg = ServerNetworkConfig {
        listen_addr: config.network.listen_addr(),
        keep_alive: Duration::from_secs(config.network.keep_alive_secs),
        limits: config.protocol,
    };
    let listener = Arc::new(ServerListener::new(net_cfg, Arc::clone(&link)));
    let socket = listener.bind().await?;
    info!(addr = %config.network.listen_addr(), "listening");

    let (server_tx, mut server_rx) = mpsc::unbounded_channel();
    let net_task = tokio::spawn(Arc::clone(&listener).run(socket, Arc::clone(&running), server_tx));

    // ── Input capture ─────────────────────────────────────────────────────────
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
    let source = platform_source();
    source
        .start(raw_tx.clone())
        .context("failed to start input capture")?;

    let marker_tx = raw_tx.clone();
    let mut use_case = ForwardInputUseCase::new(
        link,
        platform_cursor(&config),
        layout,
        Box::new(move |mark: Mark| {
            let _ = marker_tx.send(RawInputEvent::Marker(mark));
        }),
        config.server.switch_hotkey,
    );
    drop(raw_tx);

    info!(hotkey = config.server.switch_hotkey, "press the hotkey to switch screens");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            event = raw_rx.recv() => {
                let Some(event) = event else { break };
                if let Err(e) = use_case.handle_event(event).await {
                    error!("forwarding failed: {e}");
                }
                source.set_suppressing(use_case.active_target() == ActiveTarget::Client);
            }
            event = server_rx.recv() => {
                match event {
                    Some(ServerEvent::ClientConnected { name }) => info!(%name, "client ready"),
                    Some(ServerEvent::ClientDisconnected { name }) => {
                        info!(%name, "client disconnected");
                        use_case.client_disconnected();
                        source.set_suppressing(false);
                    }
                    None => break,
                }
            }
        }
    }

    running.store(false, Ordering::Relaxed);
    source.stop();
    net_task.abort();

    info!("KeyRelay Server stopped");
    Ok(())
}

#[cfg(target_os = "windows")]
fn platform_source() -> Box<dyn InputSource> {
    use keyrelay_server::infrastructure::input_capture::windows::WindowsInputCaptureService;
    Box::new(WindowsInputCaptureService::new())
}

#[cfg(not(target_os = "windows"))]
fn platform_source() -> Box<dyn InputSource> {
    use keyrelay_server::infrastructure::input_capture::mock::MockInputSource;
    warn!("no input capture backend for this platform; nothing will be forwarded");
    Box::new(MockInputSource::new())
}

#[cfg(target_os = "windows")]
fn platform_cursor(_config: &ServerConfig) -> Arc<dyn CursorController> {
    use keyrelay_server::infrastructure::cursor::WindowsCursorController;
    Arc::new(WindowsCursorController::new())
}

#[cfg(not(target_os = "windows"))]
fn platform_cursor(config: &ServerConfig) -> Arc<dyn CursorController> {
    use keyrelay_server::infrastructure::cursor::VirtualCursor;
    Arc::new(VirtualCursor::new(
        config.server.screen_width,
        config.server.screen_height,
    ))
}
