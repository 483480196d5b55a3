use serde::{Deserialize, Serialize};

use crate::urn::Urn;

/// Events arriving from the gig service's realtime feed.
///
/// The bridge treats these as opaque already-formed payloads; the feed
/// protocol itself lives outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteEvent {
    MessageReceived {
        thread_urn: Urn,
        sender_urn: Urn,
        message_urn: Urn,
        text: String,
        timestamp: f64,
    },
    MessageEdited {
        thread_urn: Urn,
        message_urn: Urn,
        text: String,
        timestamp: f64,
    },
    ReactionAdded {
        thread_urn: Urn,
        message_urn: Urn,
        sender_urn: Urn,
        emoji: String,
    },
    ReactionRemoved {
        thread_urn: Urn,
        message_urn: Urn,
        sender_urn: Urn,
        emoji: String,
    },
    ThreadRenamed {
        thread_urn: Urn,
        name: String,
    },
    Presence {
        member_urn: Urn,
        online: bool,
    },
}
