use std::io;

use thiserror::Error;

/// Errors surfaced by the IRC core.
///
/// Stream failures while the session is running are not reported through
/// this type: they end the session and show up as a
/// [`ShutdownReason`](super::ShutdownReason) from `wait`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse an empty line")]
    EmptyLine,

    #[error("command not PRIVMSG")]
    NotPrivmsg,

    #[error("message has no sender nick")]
    NoSender,

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid server name for TLS: {0}")]
    InvalidServerName(String),

    #[error("TLS handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("session already started")]
    AlreadyStarted,

    #[error("session is not running")]
    NotRunning,
}

pub type Result<T> = std::result::Result<T, Error>;
