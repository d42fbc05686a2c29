//! Chat lines the relay itself shows to the player.

use std::fmt::Display;

use kira_protocol::{Message, Text};

/// Marks every line that comes from the relay rather than the server.
pub const TAG: &str = "<§5Kira§r> : ";

/// Formatting code for error lines (red).
const ERROR_STYLE: &str = "§c";

/// A tagged informational line.
pub fn notice(text: impl Display, xuid: &str) -> Message {
    Message::Text(Text::chat(format!("{TAG}{text}"), xuid))
}

/// A tagged error line.
pub fn error(text: impl Display, xuid: &str) -> Message {
    Message::Text(Text::chat(format!("{TAG}{ERROR_STYLE}{text}"), xuid))
}

/// The chat text of a relay line, without the tag. `None` for anything
/// that is not a relay chat line.
pub fn body(message: &Message) -> Option<&str> {
    match message {
        Message::Text(text) if text.is_chat() => text.message.strip_prefix(TAG),
        _ => None,
    }
}
