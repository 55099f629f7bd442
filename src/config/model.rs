//! Configuration data model.
//!
//! All structs derive `Serialize`/`Deserialize` for TOML persistence.
//! Every field has a default so an empty file yields a working config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::nickname::generate_nickname;
use crate::irc::SessionConfig;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub session: SessionSettings,
    /// Channels joined once the server welcomes us.
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Build the session config this file describes.
    pub fn session_config(&self) -> SessionConfig {
        let nick = &self.identity.nickname;
        SessionConfig {
            server: self.server.clone(),
            nick: nick.clone(),
            username: self.identity.username.clone().unwrap_or_else(|| nick.clone()),
            realname: self.identity.realname.clone().unwrap_or_else(|| nick.clone()),
            ping_interval: Duration::from_secs(self.session.ping_interval_secs.max(1)),
            quit_message: self.session.quit_message.clone(),
            echo_traffic: self.session.echo_traffic,
        }
    }
}

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname or IP address of the IRC server.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub tls: bool,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl ServerConfig {
    /// `host:port`, suitable for `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: true,
            accept_invalid_certs: false,
        }
    }
}

/// Who we register as.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_nickname")]
    pub nickname: String,
    /// Defaults to the nickname.
    #[serde(default)]
    pub username: Option<String>,
    /// Defaults to the nickname.
    #[serde(default)]
    pub realname: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            nickname: default_nickname(),
            username: None,
            realname: None,
        }
    }
}

/// Session loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
    #[serde(default)]
    pub quit_message: Option<String>,
    /// Trace every line read and written.
    #[serde(default)]
    pub echo_traffic: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval(),
            quit_message: None,
            echo_traffic: false,
        }
    }
}

/// Trace log file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write trace output to files instead of stdout.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            timestamp_format: default_timestamp_format(),
        }
    }
}

fn default_host() -> String {
    "irc.libera.chat".to_string()
}
fn default_port() -> u16 {
    6697
}
fn default_true() -> bool {
    true
}
fn default_nickname() -> String {
    generate_nickname()
}
fn default_ping_interval() -> u64 {
    90
}
fn default_log_dir() -> String {
    "~/.local/share/crabwire/logs".to_string()
}
fn default_timestamp_format() -> String {
    "%H:%M:%S".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gets_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.server.address(), "irc.libera.chat:6697");
        assert!(!config.identity.nickname.is_empty());
        assert_eq!(config.session.ping_interval_secs, 90);
        assert!(config.channels.is_empty());
        assert!(!config.logging.enabled);
    }

    #[test]
    fn test_full_file() {
        let config: AppConfig = toml::from_str(
            r##"
            channels = ["#rust", "#crabwire"]

            [server]
            host = "irc.example.net"
            port = 6667
            tls = false

            [identity]
            nickname = "bob"
            realname = "Bob Builder"

            [session]
            ping_interval_secs = 30
            quit_message = "later"
            echo_traffic = true

            [logging]
            enabled = true
            log_dir = "/tmp/crabwire"
            "##,
        )
        .unwrap();

        let session = config.session_config();
        assert_eq!(session.server.address(), "irc.example.net:6667");
        assert!(!session.server.tls);
        assert_eq!(session.nick, "bob");
        assert_eq!(session.username, "bob");
        assert_eq!(session.realname, "Bob Builder");
        assert_eq!(session.ping_interval, Duration::from_secs(30));
        assert_eq!(session.quit_message.as_deref(), Some("later"));
        assert!(session.echo_traffic);
        assert_eq!(config.channels, ["#rust", "#crabwire"]);
        assert_eq!(config.logging.log_dir, "/tmp/crabwire");
    }

    #[test]
    fn test_zero_ping_interval_is_clamped() {
        let config: AppConfig = toml::from_str("[session]\nping_interval_secs = 0").unwrap();
        assert_eq!(config.session_config().ping_interval, Duration::from_secs(1));
    }
}
