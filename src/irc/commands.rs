//! Outbound command formatter.
//!
//! Builds protocol lines (`COMMAND p1 p2 :trailing\r\n`) from typed
//! [`Command`] values. Every outbound line the session writes goes through
//! [`Command::to_line`].

/// A command the client can send. Each variant renders to exactly one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Nick(String),
    User { username: String, realname: String },
    Join(String),
    Part { channel: String, reason: Option<String> },
    Privmsg { target: String, text: String },
    Notice { target: String, text: String },
    Ping(String),
    Pong(String),
    Quit(Option<String>),
    /// A pre-formatted line, sent as-is apart from sanitizing.
    Raw(String),
}

impl Command {
    /// Render the command as a CRLF-terminated protocol line.
    ///
    /// CR, LF and NUL are removed from every field so no argument can smuggle
    /// in a second line.
    pub fn to_line(&self) -> String {
        match self {
            Command::Nick(nick) => line("NICK", &[nick.as_str()], None),
            Command::User { username, realname } => {
                line("USER", &[username.as_str(), "8", "*"], Some(realname.as_str()))
            }
            Command::Join(channel) => line("JOIN", &[channel.as_str()], None),
            Command::Part { channel, reason } => line("PART", &[channel.as_str()], reason.as_deref()),
            Command::Privmsg { target, text } => line("PRIVMSG", &[target.as_str()], Some(text.as_str())),
            Command::Notice { target, text } => line("NOTICE", &[target.as_str()], Some(text.as_str())),
            Command::Ping(payload) => line("PING", &[payload.as_str()], None),
            Command::Pong(payload) => line("PONG", &[payload.as_str()], None),
            Command::Quit(message) => line("QUIT", &[], message.as_deref()),
            Command::Raw(raw) => format!("{}\r\n", sanitize(raw)),
        }
    }

    /// The protocol verb this command is sent as.
    pub fn verb(&self) -> &str {
        match self {
            Command::Nick(_) => "NICK",
            Command::User { .. } => "USER",
            Command::Join(_) => "JOIN",
            Command::Part { .. } => "PART",
            Command::Privmsg { .. } => "PRIVMSG",
            Command::Notice { .. } => "NOTICE",
            Command::Ping(_) => "PING",
            Command::Pong(_) => "PONG",
            Command::Quit(_) => "QUIT",
            Command::Raw(raw) => raw.split(' ').next().unwrap_or_default(),
        }
    }
}

fn line(verb: &str, params: &[&str], trailing: Option<&str>) -> String {
    let mut out = String::from(verb);
    for param in params {
        out.push(' ');
        out.push_str(&sanitize(param));
    }
    if let Some(trailing) = trailing {
        out.push_str(" :");
        out.push_str(&sanitize(trailing));
    }
    out.push_str("\r\n");
    out
}

fn sanitize(field: &str) -> String {
    field
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\0'))
        .collect()
}
