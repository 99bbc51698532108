//! The plain-text line protocol spoken between server and clients.
//!
//! Every message is one newline-terminated UTF-8 line. The server decorates
//! broadcast lines (`** … **` for membership banners, `[nick] text` for chat)
//! and [`ServerLine`] classifies those decorations back for display.

/// Prompt written to every connection as soon as it is accepted.
pub const WELCOME: &str = "Welcome to the chat! Please enter your nickname:";

/// Reply to `/quit`, written to the leaving client only.
pub const GOODBYE: &str = "Goodbye!";

/// Command a client sends to leave the chat.
pub const QUIT: &str = "/quit";

const SYSTEM_TAG: &str = "[system]";
const SYSTEM_SENDER: &str = "system";

pub fn greeting(nickname: &str) -> String {
    format!("Hello {nickname}! Type {QUIT} to exit.")
}

pub fn joined(nickname: &str) -> String {
    format!("** {nickname} joined the chat **")
}

pub fn left(nickname: &str) -> String {
    format!("** {nickname} left the chat **")
}

/// Chat broadcast for `text`, which is carried as sent (not trimmed).
pub fn chat(nickname: &str, text: &str) -> String {
    format!("[{nickname}] {text}")
}

pub fn guest_name(number: u64) -> String {
    format!("Guest{number}")
}

/// Nickname proposed by a handshake line, or `None` when the client closed
/// the stream or only sent whitespace.
pub fn proposed_nickname(line: Option<&str>) -> Option<String> {
    line.map(str::trim)
        .filter(|nickname| !nickname.is_empty())
        .map(str::to_string)
}

pub fn is_quit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(QUIT)
}

/// A line received from the server, classified for presentation.
///
/// Front ends that style their output use this to tell banners from chat and
/// [`ServerLine::is_from`] to tell their own messages from everyone else's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// Server-originated text: banners, prompts, greetings.
    Notice(String),
    /// A chat line relayed on behalf of `sender`.
    Chat { sender: String, body: String },
}

impl ServerLine {
    /// Classifies one received line. Blank lines carry nothing to display.
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        if trimmed.starts_with("**") {
            return Some(Self::Notice(trimmed.replace("**", "").trim().to_string()));
        }

        if let Some(rest) = strip_system_tag(trimmed) {
            return Some(Self::Notice(rest.trim().to_string()));
        }

        if let Some((sender, body)) = split_sender(trimmed) {
            let body = body.trim().to_string();
            let lowered = sender.to_lowercase();
            if lowered == SYSTEM_SENDER || lowered.contains("error") {
                return Some(Self::Notice(body));
            }
            return Some(Self::Chat {
                sender: sender.to_string(),
                body,
            });
        }

        Some(Self::Notice(trimmed.to_string()))
    }

    /// Whether this is a chat line sent under `nickname`.
    pub fn is_from(&self, nickname: &str) -> bool {
        matches!(self, Self::Chat { sender, .. } if sender == nickname)
    }
}

fn strip_system_tag(line: &str) -> Option<&str> {
    let tag = line.get(..SYSTEM_TAG.len())?;
    tag.eq_ignore_ascii_case(SYSTEM_TAG)
        .then(|| &line[SYSTEM_TAG.len()..])
}

fn split_sender(line: &str) -> Option<(&str, &str)> {
    let inner = line.strip_prefix('[')?;
    let end = inner.find(']')?;
    if end == 0 {
        return None;
    }
    Some((&inner[..end], &inner[end + 1..]))
}
