pub mod error;
pub mod message;
pub mod template;
pub mod types;

pub use error::{Error, Result};
pub use message::{Message, MessageContent, MessageDirection};
pub use template::SimpleTemplate;
pub use types::{EventId, RoomId, UserId};
