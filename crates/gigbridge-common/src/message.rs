use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EventId, RoomId, UserId};

/// A message flowing through the bridge in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Matrix event ID, assigned by the homeserver. `None` until the event
    /// has actually been accepted on the Matrix side.
    pub event_id: Option<EventId>,
    pub room_id: RoomId,
    pub sender: UserId,
    pub direction: MessageDirection,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageDirection {
    /// From the gig service toward Matrix.
    ToMatrix,
    /// From Matrix toward the gig service.
    ToRemote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessageContent {
    Text(String),
    Image { url: String, caption: Option<String> },
    File { url: String, filename: String },
    Reaction { emoji: String, target_event_id: String },
    System(String),
}

impl Message {
    pub fn text(
        room_id: RoomId,
        sender: UserId,
        direction: MessageDirection,
        text: impl Into<String>,
    ) -> Self {
        Self {
            event_id: None,
            room_id,
            sender,
            direction,
            content: MessageContent::Text(text.into()),
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    /// A bridge-generated notice, e.g. a management command reply.
    pub fn system(room_id: RoomId, sender: UserId, text: impl Into<String>) -> Self {
        Self {
            event_id: None,
            room_id,
            sender,
            direction: MessageDirection::ToMatrix,
            content: MessageContent::System(text.into()),
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Message, MessageContent, MessageDirection};
    use crate::types::{EventId, RoomId, UserId};

    #[test]
    fn text_messages_round_trip_through_json() {
        let message = Message::text(
            RoomId::from_str("!room:example.com"),
            UserId::from_str("@gig_1:example.com"),
            MessageDirection::ToMatrix,
            "hello",
        );
        assert_eq!(message.event_id, None);

        let json = serde_json::to_string(&message).expect("message should serialize");
        let back: Message = serde_json::from_str(&json).expect("message should deserialize");
        assert_eq!(back.event_id, None);
        assert_eq!(back.direction, MessageDirection::ToMatrix);
        assert!(matches!(back.content, MessageContent::Text(t) if t == "hello"));
    }

    #[test]
    fn event_ids_survive_the_trip_once_assigned() {
        let mut message = Message::text(
            RoomId::from_str("!room:example.com"),
            UserId::from_str("@alice:example.com"),
            MessageDirection::ToRemote,
            "edited later",
        );
        message.event_id = Some(EventId::from_str("$abc:example.com"));

        let json = serde_json::to_string(&message).expect("message should serialize");
        let back: Message = serde_json::from_str(&json).expect("message should deserialize");
        assert_eq!(back.event_id, Some(EventId::from_str("$abc:example.com")));
    }
}
