//! Handlers every session installs before its loops start.

use tracing::{debug, info, warn};

use super::client::Client;
use super::commands::Command;
use super::message::{Message, CMD_PING, ERR_NICKNAMEINUSE};
use super::registry::{Handler, Registry};

/// Appended to the nick each time the server reports it taken.
const NICK_SUFFIX: &str = "-";

pub(crate) fn install(registry: &Registry) {
    registry.register(CMD_PING, PingResponder);
    registry.register(ERR_NICKNAMEINUSE, NickCollision);
}

/// Answers a server `PING` with a `PONG` carrying the same payload, ahead of
/// any output already queued.
struct PingResponder;

impl Handler for PingResponder {
    fn handle(&self, client: &Client, msg: &Message) {
        // Servers send the token as trailing (`PING :x`), a few as a param.
        let payload = msg
            .trailing()
            .or_else(|| msg.params().first().map(String::as_str))
            .unwrap_or_default();
        if let Err(e) = client.send_urgent(Command::Pong(payload.to_string())) {
            debug!(error = %e, "could not answer PING");
        }
    }
}

/// Renegotiates the nick on `433`, once per collision.
struct NickCollision;

impl Handler for NickCollision {
    fn handle(&self, client: &Client, _msg: &Message) {
        match client.rename_with(|nick| format!("{}{}", nick, NICK_SUFFIX)) {
            Ok((old, new)) => {
                info!(%old, %new, "nick in use, renaming");
                client.trace(format!("Nick {} is in use, changing to {}.", old, new));
            }
            Err(e) => warn!(error = %e, "could not renegotiate nick"),
        }
    }
}
