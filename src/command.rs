use std::collections::HashMap;
use std::fmt;

/// A status line sent back to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyCode(&'static str);

impl ReplyCode {
    pub const SERVICE_CLOSING: ReplyCode = ReplyCode("221 goodbye");
    pub const OKAY: ReplyCode = ReplyCode("250 yes sir");
    pub const START_MAIL_INPUT: ReplyCode = ReplyCode("354 fill 'er up");
    pub const NOT_IMPLEMENTED: ReplyCode = ReplyCode("502 *shrugs*");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// EHLO or HELO
    Hello,
    Mail,
    Rcpt,
    Data,
    Rset,
    Vrfy,
    Expn,
    Help,
    Noop,
    Quit,
    Unknown,
}

/// Verb and reply tables, built once at startup and shared read-only by
/// every session.
#[derive(Debug, Clone)]
pub struct Protocol {
    banner: String,
    commands: HashMap<&'static str, Command>,
    replies: HashMap<Command, ReplyCode>,
}

impl Protocol {
    pub fn new(hostname: &str) -> Self {
        let commands = HashMap::from([
            ("EHLO", Command::Hello),
            ("HELO", Command::Hello),
            ("MAIL", Command::Mail),
            ("RCPT", Command::Rcpt),
            ("DATA", Command::Data),
            ("RSET", Command::Rset),
            ("VRFY", Command::Vrfy),
            ("EXPN", Command::Expn),
            ("HELP", Command::Help),
            ("NOOP", Command::Noop),
            ("QUIT", Command::Quit),
        ]);

        let replies = HashMap::from([
            (Command::Hello, ReplyCode::OKAY),
            (Command::Mail, ReplyCode::OKAY),
            (Command::Rcpt, ReplyCode::OKAY),
            (Command::Data, ReplyCode::START_MAIL_INPUT),
            (Command::Rset, ReplyCode::OKAY),
            (Command::Vrfy, ReplyCode::OKAY),
            (Command::Expn, ReplyCode::NOT_IMPLEMENTED),
            (Command::Help, ReplyCode::NOT_IMPLEMENTED),
            (Command::Noop, ReplyCode::OKAY),
            (Command::Quit, ReplyCode::SERVICE_CLOSING),
        ]);

        Self {
            banner: format!("220 {} ESMTP dumptruck", hostname),
            commands,
            replies,
        }
    }

    pub fn banner(&self) -> &str {
        &self.banner
    }

    /// Looks up the first space-separated token of `line`, ignoring case.
    pub fn parse(&self, line: &str) -> Command {
        let verb = line.trim().split(' ').next().unwrap_or_default();
        self.commands
            .get(verb.to_ascii_uppercase().as_str())
            .copied()
            .unwrap_or(Command::Unknown)
    }

    /// Unknown verbs get the okay reply so clients keep talking.
    pub fn reply(&self, command: Command) -> ReplyCode {
        match command {
            Command::Unknown => ReplyCode::OKAY,
            known => self
                .replies
                .get(&known)
                .copied()
                .unwrap_or(ReplyCode::NOT_IMPLEMENTED),
        }
    }

    /// Parses `line` and picks its reply in one step.
    pub fn dispatch(&self, line: &str) -> (Command, ReplyCode) {
        let command = self.parse(line);
        (command, self.reply(command))
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self::new("mail.lf.lc")
    }
}
