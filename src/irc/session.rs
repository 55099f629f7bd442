//! A single connection to one IRC server.
//!
//! After [`Session::connect`] four tasks run alongside the caller:
//!
//! - **write** drains the outbound channels onto the stream, keepalive
//!   replies first,
//! - **read** parses each line and dispatches it through the [`Registry`],
//! - **ping** sends a timestamped `PING` every interval,
//! - **trace** forwards diagnostic text to a [`TraceSink`].
//!
//! Whichever of disconnect, read exit, write exit or trace exit happens first
//! fires the shared shutdown signal. [`Session::wait`] observes it once,
//! closes both channels, lets the loops drain and releases the stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::client::{Client, Shared};
use super::commands::Command;
use super::connection;
use super::error::{Error, Result};
use super::message::Message;
use super::registry::{Handler, Registry};
use super::responders;
use super::shutdown::ShutdownReason;
use crate::config::model::ServerConfig;
use crate::logging::{StdoutSink, TraceSink};

/// Keepalive period used when the config does not override it.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(90);

/// Shortest ping interval a session will run with.
const MIN_PING_INTERVAL: Duration = Duration::from_secs(1);

/// Read buffer size; one protocol line is at most 512 bytes.
const READ_BUFFER: usize = 512;

/// Longest line the read loop accepts. Anything longer is discarded up to the
/// next newline.
const MAX_LINE_LEN: usize = 8192;

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Running,
    Draining,
    Closed,
}

/// Everything a session needs before it connects. Immutable afterwards,
/// apart from the nick which lives in the session state.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub server: ServerConfig,
    pub nick: String,
    pub username: String,
    pub realname: String,
    pub ping_interval: Duration,
    pub quit_message: Option<String>,
    /// Copy every line read and written to the trace sink.
    pub echo_traffic: bool,
}

impl SessionConfig {
    /// Config with the username and realname defaulted to the nick.
    pub fn new(server: ServerConfig, nick: &str) -> Self {
        Self {
            server,
            nick: nick.to_string(),
            username: nick.to_string(),
            realname: nick.to_string(),
            ping_interval: DEFAULT_PING_INTERVAL,
            quit_message: None,
            echo_traffic: false,
        }
    }
}

/// Loop handles. Each slot is cleared once its task has been joined, so an
/// interrupted teardown can resume where it stopped.
struct Loops {
    read: Option<JoinHandle<()>>,
    write: Option<JoinHandle<()>>,
    ping: Option<JoinHandle<()>>,
    trace: Option<JoinHandle<()>>,
}

pub struct Session {
    config: SessionConfig,
    registry: Arc<Registry>,
    shared: Arc<Shared>,
    sink: Option<Box<dyn TraceSink>>,
    loops: Option<Loops>,
}

impl Session {
    /// An idle session. No I/O happens until [`connect`](Self::connect).
    ///
    /// A zero ping interval is raised to one second.
    pub fn new(mut config: SessionConfig) -> Self {
        if config.ping_interval.is_zero() {
            warn!(min = ?MIN_PING_INTERVAL, "ping interval is zero, using minimum");
            config.ping_interval = MIN_PING_INTERVAL;
        }
        let shared = Arc::new(Shared::new(config.nick.clone(), config.quit_message.clone()));
        Self {
            config,
            registry: Arc::new(Registry::new()),
            shared,
            sink: None,
            loops: None,
        }
    }

    /// Replace the default stdout trace sink. Only effective before connect.
    pub fn set_trace_sink<S: TraceSink>(&mut self, sink: S) {
        self.sink = Some(Box::new(sink));
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        let state = *self.shared.state.lock();
        if state == SessionState::Running && self.shared.shutdown.is_triggered() {
            SessionState::Draining
        } else {
            state
        }
    }

    /// A handle for sending commands. Usable before connect, but sends fail
    /// with [`Error::NotRunning`] until the session is running.
    pub fn client(&self) -> Client {
        Client::new(Arc::clone(&self.shared))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register `handler` for `command` (or `"*"`). May be called at any time.
    pub fn register<H: Handler>(&self, command: &str, handler: H) {
        self.registry.register(command, handler);
    }

    pub fn nick(&self) -> String {
        self.shared.nick.lock().clone()
    }

    /// Open the configured stream and start the session.
    ///
    /// A failed connect leaves the session idle so it can be retried.
    pub async fn connect(&mut self) -> Result<()> {
        self.begin_connect()?;
        match connection::establish(&self.config.server).await {
            Ok(transport) => {
                self.start(transport);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "connect failed");
                *self.shared.state.lock() = SessionState::Idle;
                Err(e)
            }
        }
    }

    /// Start the session over an already-connected stream.
    pub async fn connect_with_stream<S>(&mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.begin_connect()?;
        self.start(stream);
        Ok(())
    }

    fn begin_connect(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if *state != SessionState::Idle {
            return Err(Error::AlreadyStarted);
        }
        *state = SessionState::Connecting;
        Ok(())
    }

    fn start<S>(&mut self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (urgent_tx, urgent_rx) = mpsc::unbounded_channel();
        let (trace_tx, trace_rx) = mpsc::unbounded_channel();
        *self.shared.outbound.lock() = Some(out_tx);
        *self.shared.urgent.lock() = Some(urgent_tx);
        *self.shared.trace.lock() = Some(trace_tx);

        responders::install(&self.registry);

        let client = self.client();
        // Queued before the write loop exists so registration is first on the wire.
        let _ = client.send(Command::Nick(client.nick()));
        let _ = client.send(Command::User {
            username: self.config.username.clone(),
            realname: self.config.realname.clone(),
        });

        let echo = self.config.echo_traffic;
        let sink = self.sink.take().unwrap_or_else(|| Box::new(StdoutSink::default()));
        let lanes = Outbound {
            urgent: urgent_rx,
            normal: out_rx,
        };
        self.loops = Some(Loops {
            trace: Some(tokio::spawn(trace_loop(trace_rx, sink, client.clone()))),
            write: Some(tokio::spawn(write_loop(writer, lanes, client.clone(), echo))),
            read: Some(tokio::spawn(read_loop(reader, Arc::clone(&self.registry), client.clone(), echo))),
            ping: Some(tokio::spawn(ping_loop(self.config.ping_interval, client))),
        });

        *self.shared.state.lock() = SessionState::Running;
        info!(server = %self.config.server.address(), nick = %self.nick(), "session running");
    }

    /// Send `QUIT`, stop the ping loop and signal shutdown.
    pub fn disconnect(&self) -> Result<()> {
        self.client().disconnect()
    }

    /// Block until shutdown fires, then tear everything down exactly once.
    ///
    /// Returns the reason that fired first. Calling it on a session that is
    /// not running, or after a completed teardown, yields
    /// [`Error::NotRunning`]. If the returned future is dropped part way, the
    /// next call picks the teardown up again.
    pub async fn wait(&mut self) -> Result<ShutdownReason> {
        if self.loops.is_none() {
            return Err(Error::NotRunning);
        }
        self.shared.shutdown.triggered().await;
        info!("cleaning up");

        self.shared.stop_ping.send_replace(true);
        // Dropping the only senders closes both lanes; the write loop flushes
        // what is queued and shuts its half of the stream.
        drop(self.shared.urgent.lock().take());
        drop(self.shared.outbound.lock().take());
        if let Some(loops) = self.loops.as_mut() {
            join("write", &mut loops.write).await;
            join("read", &mut loops.read).await;
            join("ping", &mut loops.ping).await;
            drop(self.shared.trace.lock().take());
            join("trace", &mut loops.trace).await;
        }
        self.loops = None;

        *self.shared.state.lock() = SessionState::Closed;
        let reason = self
            .shared
            .shutdown
            .reason()
            .unwrap_or(ShutdownReason::Disconnect);
        info!(?reason, "session closed");
        Ok(reason)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("server", &self.config.server.address())
            .field("nick", &self.nick())
            .field("state", &self.state())
            .finish()
    }
}

async fn join(name: &str, slot: &mut Option<JoinHandle<()>>) {
    let Some(handle) = slot.as_mut() else {
        return;
    };
    let joined = handle.await;
    *slot = None;
    if let Err(e) = joined {
        warn!(task = name, error = %e, "session task ended abnormally");
    }
}

async fn read_loop<R>(reader: R, registry: Arc<Registry>, client: Client, echo: bool)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::with_capacity(READ_BUFFER, reader);
    let mut buf = Vec::with_capacity(READ_BUFFER);
    // Set while skipping the tail of an overlong line.
    let mut discarding = false;
    loop {
        buf.clear();
        let mut limited = (&mut reader).take(MAX_LINE_LEN as u64);
        let read = tokio::select! {
            read = limited.read_until(b'\n', &mut buf) => read,
            _ = client.shared.shutdown.triggered() => break,
        };
        match read {
            Ok(0) => {
                info!("server closed the connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "read failed");
                break;
            }
        }

        let terminated = buf.last() == Some(&b'\n');
        if discarding {
            discarding = !terminated;
            continue;
        }
        if !terminated && buf.len() >= MAX_LINE_LEN {
            warn!(limit = MAX_LINE_LEN, "line too long, discarding");
            discarding = true;
            continue;
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            continue;
        }
        if echo {
            client.trace(format!("<- {}", line));
        }
        match Message::parse(line, &client.nick()) {
            Ok(msg) => {
                registry.dispatch(&client, msg);
            }
            Err(e) => debug!(error = %e, "skipping line"),
        }
    }
    client.shared.shutdown.trigger(ShutdownReason::ReadClosed);
}

/// Receiving ends of the two outbound lanes.
struct Outbound {
    urgent: UnboundedReceiver<String>,
    normal: UnboundedReceiver<String>,
}

async fn write_loop<W>(mut writer: W, mut lanes: Outbound, client: Client, echo: bool)
where
    W: AsyncWrite + Unpin,
{
    loop {
        let line = tokio::select! {
            biased;
            Some(line) = lanes.urgent.recv() => line,
            Some(line) = lanes.normal.recv() => line,
            else => break,
        };
        if echo {
            client.trace(format!("-> {}", line.trim_end()));
        }
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            warn!(error = %e, "write failed");
            client.shared.shutdown.trigger(ShutdownReason::WriteClosed);
            return;
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "stream shutdown failed");
    }
    client.shared.shutdown.trigger(ShutdownReason::WriteClosed);
}

async fn ping_loop(period: Duration, client: Client) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stop = client.shared.stop_ping.subscribe();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let stamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
                if client.send(Command::Ping(stamp.to_string())).is_err() {
                    break;
                }
            }
            _ = stop.wait_for(|stopped| *stopped) => {
                debug!("stopping ping loop");
                break;
            }
            _ = client.shared.shutdown.triggered() => break,
        }
    }
}

async fn trace_loop(mut lines: UnboundedReceiver<String>, mut sink: Box<dyn TraceSink>, client: Client) {
    while let Some(line) = lines.recv().await {
        sink.emit(&line);
    }
    sink.flush();
    client.shared.shutdown.trigger(ShutdownReason::TraceClosed);
}
