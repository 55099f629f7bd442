use std::path::PathBuf;

use anyhow::{Context, Result};
use crabwire::config;
use crabwire::irc::message::RPL_WELCOME;
use crabwire::irc::{Client, Message, Session, WILDCARD};
use crabwire::logging::TraceLogger;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = config::load_config(config_path.as_deref())?;

    let mut session = Session::new(cfg.session_config());
    if cfg.logging.enabled {
        session.set_trace_sink(TraceLogger::new(&cfg.logging, &cfg.server.host));
    }

    let channels = cfg.channels.clone();
    session.register(RPL_WELCOME, move |client: &Client, _: &Message| {
        info!(nick = %client.nick(), "registered");
        for channel in &channels {
            if let Err(e) = client.join(channel) {
                warn!(%channel, error = %e, "join failed");
            }
        }
    });
    session.register(WILDCARD, |_: &Client, msg: &Message| {
        debug!(command = msg.command(), raw = msg.raw(), "unhandled");
    });

    session
        .connect()
        .await
        .with_context(|| format!("Failed to connect to {}", cfg.server.address()))?;

    let client = session.client();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, disconnecting");
            let _ = client.disconnect();
        }
    });

    let reason = session.wait().await?;
    info!(?reason, "done");
    Ok(())
}
