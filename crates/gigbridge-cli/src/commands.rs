use gigbridge_common::{Message, RoomId, UserId};

const COMMAND_PREFIX: &str = "!gig";

/// A bridge management command parsed out of a room message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    pub sender: UserId,
    pub room_id: RoomId,
    pub command: String,
    pub args: Vec<String>,
}

impl CommandEvent {
    /// Parses `!gig <command> [args...]` from message text. Anything else is
    /// an ordinary message, not a command.
    pub fn parse(sender: UserId, room_id: RoomId, text: &str) -> Option<Self> {
        let rest = text.strip_prefix(COMMAND_PREFIX)?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let mut words = rest.split_whitespace();
        let command = words.next().unwrap_or("help").to_lowercase();
        Some(Self {
            sender,
            room_id,
            command,
            args: words.map(str::to_string).collect(),
        })
    }

    /// Handles the command, returning the bridge's reply as a notice
    /// addressed back to the originating room.
    pub fn handle(&self, bot: &UserId) -> Message {
        let reply = match self.command.as_str() {
            "help" => "Commands: help, version, ping".to_string(),
            "version" => format!("gigbridge {}", env!("CARGO_PKG_VERSION")),
            "ping" => "pong".to_string(),
            other => format!("unknown command '{other}', try '!gig help'"),
        };
        Message::system(self.room_id.clone(), bot.clone(), reply)
    }
}
