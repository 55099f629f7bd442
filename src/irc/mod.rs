//! IRC protocol core: line parsing, callback dispatch, outbound formatting and
//! the session that ties them to a stream.

pub mod client;
pub mod commands;
pub mod connection;
pub mod error;
pub mod message;
pub mod registry;
mod responders;
pub mod session;
mod shutdown;

pub use client::Client;
pub use commands::Command;
pub use error::{Error, Result};
pub use message::{Message, WILDCARD};
pub use registry::{Handler, Registry};
pub use session::{Session, SessionConfig, SessionState};
pub use shutdown::ShutdownReason;
