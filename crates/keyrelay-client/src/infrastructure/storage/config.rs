//! TOML-based configuration for the client application.
//!
//! Reads `ClientConfig` from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\KeyRelay\client.toml`
//! - Linux:    `$XDG_CONFIG_HOME/keyrelay/client.toml` or `~/.config/keyrelay/client.toml`
//! - macOS:    `~/Library/Application Support/KeyRelay/client.toml`
//!
//! ```toml
//! log_level = "info"
//!
//! [network]
//! server_address = "192.168.1.10:24800"
//! screen_name = "laptop"
//! reconnect_interval_secs = 5
//!
//! [screen]
//! width = 2560
//! height = 1440
//!
//! [protocol]
//! max_message_size = 4194304
//! max_field_length = 1048576
//!
//! [keyboard]
//! layout = "de"
//! ```
//!
//! Every key is optional; a missing file yields the defaults.

use std::path::{Path, PathBuf};

use keyrelay_core::protocol::ScreenInfo;
use keyrelay_core::CodecLimits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILE_NAME: &str = "client.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub screen: ScreenConfig,
    #[serde(default)]
    pub protocol: CodecLimits,
    #[serde(default)]
    pub keyboard: KeyboardConfig,
}

/// Where to connect and how to introduce ourselves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// `host:port` of the server.
    #[serde(default = "default_server_address")]
    pub server_address: String,
    /// Name sent in the hello reply; the server identifies screens by it.
    #[serde(default = "default_screen_name")]
    pub screen_name: String,
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,
}

/// Screen shape reported in the info message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScreenConfig {
    #[serde(default = "default_screen_width")]
    pub width: u16,
    #[serde(default = "default_screen_height")]
    pub height: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyboardConfig {
    /// Reference layout name: `"us"` or `"de"`.
    #[serde(default = "default_layout")]
    pub layout: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_server_address() -> String {
    format!("127.0.0.1:{}", keyrelay_core::protocol::DEFAULT_PORT)
}
fn default_screen_name() -> String {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "keyrelay-client".to_string())
}
fn default_reconnect_interval_secs() -> u64 {
    5
}
fn default_screen_width() -> u16 {
    1920
}
fn default_screen_height() -> u16 {
    1080
}
fn default_layout() -> String {
    "us".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            network: NetworkConfig::default(),
            screen: ScreenConfig::default(),
            protocol: CodecLimits::default(),
            keyboard: KeyboardConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: default_server_address(),
            screen_name: default_screen_name(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: default_screen_width(),
            height: default_screen_height(),
        }
    }
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            layout: default_layout(),
        }
    }
}

impl ScreenConfig {
    /// The info message for this screen, with the cursor parked in the centre.
    pub fn to_screen_info(self) -> ScreenInfo {
        let half = |v: u16| i16::try_from(v / 2).unwrap_or(i16::MAX);
        ScreenInfo {
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
            mouse_x: half(self.width),
            mouse_y: half(self.height),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the client config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config from the platform location.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `ClientConfig` from `path`, returning the defaults if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &ClientConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("KeyRelay"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("keyrelay"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("KeyRelay")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("keyrelay_client_test_{}_{tag}", std::process::id()))
            .join(CONFIG_FILE_NAME)
    }

    #[test]
    fn test_default_config_targets_local_server_on_default_port() {
        // Arrange / Act
        let cfg = ClientConfig::default();

        // Assert
        assert_eq!(cfg.network.server_address, "127.0.0.1:24800");
        assert_eq!(cfg.network.reconnect_interval_secs, 5);
        assert_eq!(cfg.keyboard.layout, "us");
        assert_eq!(cfg.protocol, CodecLimits::default());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: ClientConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.screen, ScreenConfig::default());
    }

    #[test]
    fn test_partial_protocol_section_keeps_other_default() {
        // Arrange
        let toml_str = r#"
[protocol]
max_field_length = 65536
"#;

        // Act
        let cfg: ClientConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.protocol.max_field_length, 65_536);
        assert_eq!(
            cfg.protocol.max_message_size,
            CodecLimits::default().max_message_size
        );
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let result: Result<ClientConfig, toml::de::Error> = toml::from_str("[[[ not valid toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_from_missing_file_returns_defaults() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/client.toml");
        let cfg = load_config_from(&path).expect("missing file is not an error");
        assert_eq!(cfg, ClientConfig::default());
    }

    #[test]
    fn test_save_and_load_round_trip_via_temp_dir() {
        // Arrange
        let path = temp_path("roundtrip");
        let mut cfg = ClientConfig::default();
        cfg.network.server_address = "10.0.0.5:24800".to_string();
        cfg.keyboard.layout = "de".to_string();
        cfg.screen.width = 2560;

        // Act
        save_config_to(&cfg, &path).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_screen_info_parks_cursor_in_centre() {
        let info = ScreenConfig {
            width: 2560,
            height: 1440,
        }
        .to_screen_info();
        assert_eq!((info.mouse_x, info.mouse_y), (1280, 720));
        assert_eq!((info.width, info.height), (2560, 1440));
    }

    #[test]
    fn test_config_file_path_ends_with_client_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with(CONFIG_FILE_NAME), "got {path:?}");
        }
    }
}
