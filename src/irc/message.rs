//! Inbound protocol line parser.
//!
//! Turns one CRLF-stripped line of the form
//! `[':' prefix SP] command [SP param]* [SP ':' trailing]` into a
//! [`Message`]. Parsing never fails on a non-empty line: malformed input
//! produces a message with whatever fields could be recovered.

use std::fmt;

use super::error::{Error, Result};

pub const RPL_WELCOME: &str = "001";
pub const RPL_TOPIC: &str = "332";
pub const RPL_TOPICWHOTIME: &str = "333";
pub const RPL_NAMREPLY: &str = "353";
pub const RPL_ENDOFNAMES: &str = "366";
pub const RPL_MOTDSTART: &str = "375";
pub const RPL_MOTD: &str = "372";
pub const RPL_ENDOFMOTD: &str = "376";

pub const ERR_NOMOTD: &str = "422";
pub const ERR_NICKNAMEINUSE: &str = "433";

pub const CMD_NOTICE: &str = "NOTICE";
pub const CMD_PRIVMSG: &str = "PRIVMSG";
pub const CMD_JOIN: &str = "JOIN";
pub const CMD_KICK: &str = "KICK";
pub const CMD_MODE: &str = "MODE";
pub const CMD_PING: &str = "PING";
pub const CMD_PONG: &str = "PONG";

/// Registry key matching any command without a dedicated handler.
pub const WILDCARD: &str = "*";

/// Channel name sigils recognised when classifying a PRIVMSG target.
const CHANNEL_SIGILS: [char; 4] = ['#', '&', '!', '+'];

/// The `nick!user@host` parts of a user prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Mask {
    nick: String,
    user: String,
    host: String,
}

impl Mask {
    /// Split a prefix on `!` and `@`. Only a prefix that yields exactly three
    /// non-empty pieces is a user mask; a bare server name is not.
    fn decompose(prefix: &str) -> Option<Self> {
        let parts: Vec<&str> = prefix
            .split(['!', '@'])
            .filter(|p| !p.is_empty())
            .collect();
        match parts.as_slice() {
            [nick, user, host] => Some(Self {
                nick: nick.to_string(),
                user: user.to_string(),
                host: host.to_string(),
            }),
            _ => None,
        }
    }
}

/// A parsed protocol line. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    raw: String,
    prefix: Option<String>,
    command: String,
    params: Vec<String>,
    trailing: Option<String>,
    mask: Option<Mask>,
    self_nick: String,
}

impl Message {
    /// Parse `raw` (line terminator already removed) as seen by a client
    /// currently using `self_nick`.
    pub fn parse(raw: &str, self_nick: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::EmptyLine);
        }

        let (prefix, rest) = match raw.strip_prefix(':') {
            Some(after_colon) => match after_colon.split_once(' ') {
                Some((prefix, rest)) => (Some(prefix), rest),
                // Nothing but a prefix: keep it and leave the command empty.
                None => (Some(after_colon), ""),
            },
            None => (None, raw),
        };

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };

        let mut tokens = head.split(' ').filter(|t| !t.is_empty());
        let command = tokens.next().unwrap_or_default().to_ascii_uppercase();
        let params = tokens.map(str::to_string).collect();

        Ok(Self {
            raw: raw.to_string(),
            prefix: prefix.map(str::to_string),
            command,
            params,
            trailing: trailing.map(str::to_string),
            mask: prefix.and_then(Mask::decompose),
            self_nick: self_nick.to_string(),
        })
    }

    /// The original line, without its terminator.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Uppercased command or three-digit numeric.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Middle parameters. Never includes the trailing parameter.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn trailing(&self) -> Option<&str> {
        self.trailing.as_deref()
    }

    pub fn nick(&self) -> Option<&str> {
        self.mask.as_ref().map(|m| m.nick.as_str())
    }

    pub fn user(&self) -> Option<&str> {
        self.mask.as_ref().map(|m| m.user.as_str())
    }

    pub fn host(&self) -> Option<&str> {
        self.mask.as_ref().map(|m| m.host.as_str())
    }

    /// The client's own nick when this line was parsed.
    pub fn self_nick(&self) -> &str {
        &self.self_nick
    }

    pub fn is_numeric(&self) -> bool {
        self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit())
    }

    /// Whether the sender is the client itself.
    pub fn is_from_self(&self) -> bool {
        self.nick()
            .is_some_and(|nick| nick.eq_ignore_ascii_case(&self.self_nick))
    }

    /// A PRIVMSG addressed to a channel rather than to the client.
    pub fn is_channel_message(&self) -> bool {
        self.command == CMD_PRIVMSG
            && self
                .params
                .first()
                .is_some_and(|target| target.starts_with(CHANNEL_SIGILS))
    }

    /// Where a reply to this PRIVMSG should go: the channel for channel
    /// messages, the sender for private ones.
    pub fn respond_to(&self) -> Result<&str> {
        if self.command != CMD_PRIVMSG {
            return Err(Error::NotPrivmsg);
        }
        if self.is_channel_message() {
            // Checked non-empty by is_channel_message.
            return Ok(&self.params[0]);
        }
        self.nick().ok_or(Error::NoSender)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Message {
        Message::parse(raw, "me").unwrap()
    }

    #[test]
    fn test_full_line() {
        let msg = parse(":nick!user@host privMsg p1 p2 :trailing text");
        assert_eq!(msg.raw(), ":nick!user@host privMsg p1 p2 :trailing text");
        assert_eq!(msg.prefix(), Some("nick!user@host"));
        assert_eq!(msg.nick(), Some("nick"));
        assert_eq!(msg.user(), Some("user"));
        assert_eq!(msg.host(), Some("host"));
        assert_eq!(msg.command(), "PRIVMSG");
        assert_eq!(msg.params(), ["p1", "p2"]);
        assert_eq!(msg.trailing(), Some("trailing text"));
        assert_eq!(msg.self_nick(), "me");
    }

    #[test]
    fn test_no_prefix() {
        let msg = parse("COMMAND arg");
        assert_eq!(msg.prefix(), None);
        assert_eq!(msg.nick(), None);
        assert_eq!(msg.user(), None);
        assert_eq!(msg.host(), None);
        assert_eq!(msg.command(), "COMMAND");
        assert_eq!(msg.params(), ["arg"]);
        assert_eq!(msg.trailing(), None);
    }

    #[test]
    fn test_server_prefix() {
        let msg = parse(":server NOTICE * :*** Looking up");
        assert_eq!(msg.prefix(), Some("server"));
        assert_eq!(msg.command(), "NOTICE");
        assert_eq!(msg.params(), ["*"]);
        assert_eq!(msg.trailing(), Some("*** Looking up"));
        assert_eq!(msg.nick(), None);
        assert_eq!(msg.user(), None);
        assert_eq!(msg.host(), None);
    }

    #[test]
    fn test_command_only() {
        let msg = parse("quit");
        assert_eq!(msg.command(), "QUIT");
        assert!(msg.params().is_empty());
        assert_eq!(msg.trailing(), None);
    }

    #[test]
    fn test_ping_trailing() {
        let msg = parse("PING :abc123");
        assert_eq!(msg.command(), CMD_PING);
        assert!(msg.params().is_empty());
        assert_eq!(msg.trailing(), Some("abc123"));
    }

    #[test]
    fn test_trailing_keeps_colons_and_spaces() {
        let msg = parse(":a!b@c PRIVMSG #chan ::) hello  there");
        assert_eq!(msg.trailing(), Some(":) hello  there"));
        assert_eq!(msg.params(), ["#chan"]);
    }

    #[test]
    fn test_empty_trailing_is_present() {
        let msg = parse("TOPIC #chan :");
        assert_eq!(msg.trailing(), Some(""));
    }

    #[test]
    fn test_numeric() {
        let msg = parse(":irc.example.net 433 * bob :Nickname is already in use");
        assert_eq!(msg.command(), ERR_NICKNAMEINUSE);
        assert!(msg.is_numeric());
        assert_eq!(msg.params(), ["*", "bob"]);
        assert!(!parse("PRIVMSG #a :x").is_numeric());
    }

    #[test]
    fn test_empty_line_is_error() {
        assert!(matches!(Message::parse("", "me"), Err(Error::EmptyLine)));
    }

    #[test]
    fn test_malformed_lines_do_not_panic() {
        let msg = parse(":");
        assert_eq!(msg.prefix(), Some(""));
        assert_eq!(msg.command(), "");

        let msg = parse(":prefixonly");
        assert_eq!(msg.prefix(), Some("prefixonly"));
        assert_eq!(msg.command(), "");

        let msg = parse(" :only trailing");
        assert_eq!(msg.command(), "");
        assert_eq!(msg.trailing(), Some("only trailing"));

        let msg = parse("JOIN   #a  #b");
        assert_eq!(msg.params(), ["#a", "#b"]);

        let msg = parse(":a!b PRIVMSG x :y");
        assert_eq!(msg.nick(), None);
        let msg = parse(":a!!b@@c PRIVMSG x :y");
        assert_eq!(msg.nick(), Some("a"));
        assert_eq!(msg.host(), Some("c"));
    }

    #[test]
    fn test_channel_message() {
        for target in ["#rust", "&local", "!12345chan", "+modeless"] {
            let msg = parse(&format!(":a!b@c PRIVMSG {} :hi", target));
            assert!(msg.is_channel_message(), "{}", target);
        }
        assert!(!parse(":a!b@c PRIVMSG alice :hi").is_channel_message());
        assert!(!parse(":a!b@c NOTICE #rust :hi").is_channel_message());
        assert!(!parse("PRIVMSG").is_channel_message());
    }

    #[test]
    fn test_respond_to() {
        let msg = parse(":alice!a@host PRIVMSG #rust :hi");
        assert_eq!(msg.respond_to().unwrap(), "#rust");

        let msg = parse(":alice!a@host PRIVMSG me :hi");
        assert_eq!(msg.respond_to().unwrap(), "alice");

        let msg = parse(":alice!a@host NOTICE me :hi");
        assert!(matches!(msg.respond_to(), Err(Error::NotPrivmsg)));

        let msg = parse(":services PRIVMSG me :hi");
        assert!(matches!(msg.respond_to(), Err(Error::NoSender)));
    }

    #[test]
    fn test_is_from_self() {
        let msg = Message::parse(":Bob!b@host JOIN #rust", "bob").unwrap();
        assert!(msg.is_from_self());
        let msg = Message::parse(":alice!a@host JOIN #rust", "bob").unwrap();
        assert!(!msg.is_from_self());
        let msg = Message::parse(":server 001 bob :Welcome", "bob").unwrap();
        assert!(!msg.is_from_self());
    }
}
