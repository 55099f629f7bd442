//! Cloneable handle onto a session's outbound path.
//!
//! Every outbound line, whether from the caller, a registered handler, the
//! built-in responders or the ping loop, goes through the same unbounded
//! channel. The write loop is its only consumer, so lines reach the stream in
//! submission order. Keepalive replies use a second lane that the write loop
//! drains ahead of the first.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tracing::debug;

use super::commands::Command;
use super::error::{Error, Result};
use super::session::SessionState;
use super::shutdown::{Shutdown, ShutdownReason};

/// State shared between the session, its loops and every [`Client`] clone.
pub(crate) struct Shared {
    /// Current nick. All mutation happens under this lock.
    pub(crate) nick: Mutex<String>,
    pub(crate) outbound: Mutex<Option<UnboundedSender<String>>>,
    /// Lines that jump ahead of anything pending on `outbound`.
    pub(crate) urgent: Mutex<Option<UnboundedSender<String>>>,
    pub(crate) trace: Mutex<Option<UnboundedSender<String>>>,
    pub(crate) state: Mutex<SessionState>,
    pub(crate) shutdown: Shutdown,
    /// Set once to stop the ping loop.
    pub(crate) stop_ping: watch::Sender<bool>,
    pub(crate) quit_message: Option<String>,
}

impl Shared {
    pub(crate) fn new(nick: String, quit_message: Option<String>) -> Self {
        Self {
            nick: Mutex::new(nick),
            outbound: Mutex::new(None),
            urgent: Mutex::new(None),
            trace: Mutex::new(None),
            state: Mutex::new(SessionState::Idle),
            shutdown: Shutdown::default(),
            stop_ping: watch::channel(false).0,
            quit_message,
        }
    }
}

/// Handle for issuing commands on a session.
///
/// Cheap to clone. Handlers receive one with every dispatched message.
#[derive(Clone)]
pub struct Client {
    pub(crate) shared: Arc<Shared>,
}

impl Client {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// The nick the client is currently using.
    pub fn nick(&self) -> String {
        self.shared.nick.lock().clone()
    }

    /// Queue a command for the write loop.
    pub fn send(&self, command: Command) -> Result<()> {
        let line = command.to_line();
        match self.shared.outbound.lock().as_ref() {
            Some(tx) => tx.send(line).map_err(|_| Error::NotRunning),
            None => Err(Error::NotRunning),
        }
    }

    /// Queue a command ahead of every pending [`send`](Self::send) line.
    pub(crate) fn send_urgent(&self, command: Command) -> Result<()> {
        let line = command.to_line();
        match self.shared.urgent.lock().as_ref() {
            Some(tx) => tx.send(line).map_err(|_| Error::NotRunning),
            None => Err(Error::NotRunning),
        }
    }

    pub fn join(&self, channel: &str) -> Result<()> {
        self.send(Command::Join(channel.to_string()))
    }

    pub fn part(&self, channel: &str) -> Result<()> {
        self.send(Command::Part {
            channel: channel.to_string(),
            reason: None,
        })
    }

    pub fn privmsg(&self, target: &str, text: &str) -> Result<()> {
        self.send(Command::Privmsg {
            target: target.to_string(),
            text: text.to_string(),
        })
    }

    pub fn notice(&self, target: &str, text: &str) -> Result<()> {
        self.send(Command::Notice {
            target: target.to_string(),
            text: text.to_string(),
        })
    }

    /// Switch to `nick` and send the `NICK` line.
    pub fn change_nick(&self, nick: &str) -> Result<()> {
        self.rename_with(|_| nick.to_string()).map(|_| ())
    }

    /// Derive a new nick from the current one, store it and send `NICK`.
    ///
    /// The read-modify-write and the send happen under the nick lock, so
    /// concurrent renames queue their `NICK` lines in the order the nick
    /// changed. Returns `(old, new)`.
    pub(crate) fn rename_with<F>(&self, derive: F) -> Result<(String, String)>
    where
        F: FnOnce(&str) -> String,
    {
        let mut nick = self.shared.nick.lock();
        let new_nick = derive(&nick);
        self.send(Command::Nick(new_nick.clone()))?;
        let old_nick = std::mem::replace(&mut *nick, new_nick.clone());
        Ok((old_nick, new_nick))
    }

    /// Send `QUIT` without tearing anything down. The server closing the
    /// stream in response ends the session.
    pub fn quit(&self, message: Option<&str>) -> Result<()> {
        self.send(Command::Quit(message.map(str::to_string)))
    }

    /// Hand diagnostic text to the trace loop.
    pub fn trace(&self, text: impl Into<String>) {
        let text = text.into();
        let sent = match self.shared.trace.lock().as_ref() {
            Some(tx) => tx.send(text).map_err(|e| e.0),
            None => Err(text),
        };
        if let Err(text) = sent {
            debug!(%text, "trace loop gone, dropping line");
        }
    }

    /// Send `QUIT`, stop the ping loop and signal shutdown.
    ///
    /// `Session::wait` performs the actual teardown.
    pub fn disconnect(&self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            match *state {
                SessionState::Running | SessionState::Draining => *state = SessionState::Draining,
                _ => return Err(Error::NotRunning),
            }
        }
        // The write loop may already be gone if the stream failed first.
        let _ = self.send(Command::Quit(self.shared.quit_message.clone()));
        self.shared.stop_ping.send_replace(true);
        self.shared.shutdown.trigger(ShutdownReason::Disconnect);
        Ok(())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("nick", &*self.shared.nick.lock())
            .field("state", &*self.shared.state.lock())
            .finish()
    }
}
