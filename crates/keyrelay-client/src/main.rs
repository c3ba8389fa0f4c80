//! KeyRelay Client Application entry point.
//!
//! Loads the config, wires the network connection to the input use case,
//! then runs the Tokio event loop.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()              -- TOML file or defaults
//!  └─ ClientConnection::start()  -- TCP reconnect loop
//!  └─ event dispatch loop
//!       ├─ Message      -> EmulateInputUseCase::handle_message
//!       └─ Disconnected -> EmulateInputUseCase::reset
//! ```

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use keyrelay_client::application::emulate_input::{EmulateInputUseCase, PlatformInputEmulator};
use keyrelay_client::infrastructure::{
    network::{ClientConnection, ClientConnectionConfig, NetworkEvent},
    storage::config::{load_config, ClientConfig},
};
use keyrelay_core::{KeyboardLayout, StaticLayout};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config unavailable ({e}); using defaults");
            ClientConfig::default()
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_level))
                .context("invalid log_level in config")?,
        )
        .init();

    info!("KeyRelay Client starting");

    let layout: Arc<dyn KeyboardLayout> = match StaticLayout::by_name(&config.keyboard.layout) {
        Some(layout) => Arc::new(layout),
        None => {
            warn!(layout = %config.keyboard.layout, "unknown keyboard layout; using us");
            Arc::new(StaticLayout::us())
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut use_case = EmulateInputUseCase::new(platform_emulator(), layout);

    let net_cfg = ClientConnectionConfig {
        server_addr: config.network.server_address.clone(),
        screen_name: config.network.screen_name.clone(),
        reconnect_interval: Duration::from_secs(config.network.reconnect_interval_secs),
        limits: config.protocol,
        screen: config.screen.to_screen_info(),
        ..Default::default()
    };
    info!(server = %net_cfg.server_addr, screen = %net_cfg.screen_name, "connecting");
    let connection = Arc::new(ClientConnection::new(net_cfg));
    let net_task = Arc::clone(&connection).start(Arc::clone(&running), tx);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                running.store(false, Ordering::Relaxed);
                break;
            }
            event = rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    NetworkEvent::Connected => info!("session established"),
                    NetworkEvent::Message(msg) => use_case.handle_message(&msg),
                    NetworkEvent::Disconnected => {
                        warn!("session lost; reconnect in progress");
                        use_case.reset();
                    }
                }
            }
        }
    }

    // Nothing may stay pressed on this machine once we stop listening.
    use_case.reset();
    net_task.abort();

    info!("KeyRelay Client stopped");
    Ok(())
}

#[cfg(target_os = "windows")]
fn platform_emulator() -> Arc<dyn PlatformInputEmulator> {
    use keyrelay_client::infrastructure::input_emulation::windows::WindowsInputEmulator;
    Arc::new(WindowsInputEmulator::new())
}

#[cfg(not(target_os = "windows"))]
fn platform_emulator() -> Arc<dyn PlatformInputEmulator> {
    use keyrelay_client::infrastructure::input_emulation::mock::MockInputEmulator;
    warn!("no input injection backend for this platform; events are only recorded");
    Arc::new(MockInputEmulator::new())
}
