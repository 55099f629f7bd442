//! A minimal IRC client core.
//!
//! [`irc::Session`] owns one server connection and runs its read, write, ping
//! and trace loops. Consumers register [`irc::Handler`]s per command and talk
//! back through the [`irc::Client`] handle each handler receives.

pub mod config;
pub mod irc;
pub mod logging;
