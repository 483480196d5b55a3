use serde::{Deserialize, Serialize};
use std::fmt;

/// A Matrix user ID, e.g. `@gig_12345:example.com`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserId(String);

/// A Matrix room ID, e.g. `!abcdef:example.com`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RoomId(String);

/// A Matrix event ID, e.g. `$deadbeef:example.com`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct EventId(String);

// Matrix identifiers are opaque strings issued by the homeserver; the
// bridge only carries ones it was handed, so wrapping is the only
// constructor.
macro_rules! impl_matrix_id {
    ($t:ty) => {
        impl $t {
            pub fn from_str(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_matrix_id!(UserId);
impl_matrix_id!(RoomId);
impl_matrix_id!(EventId);

#[cfg(test)]
mod tests {
    use super::{EventId, RoomId, UserId};

    #[test]
    fn ids_wrap_strings_without_changing_them() {
        let user = UserId::from_str("@alice:example.com");
        assert_eq!(user.as_str(), "@alice:example.com");
        assert_eq!(user.to_string(), "@alice:example.com");

        assert_eq!(
            RoomId::from_str("!room:example.com").as_str(),
            "!room:example.com"
        );
        assert_eq!(
            EventId::from_str("$event:example.com").as_str(),
            "$event:example.com"
        );
    }
}
