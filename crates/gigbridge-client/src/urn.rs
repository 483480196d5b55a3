use std::fmt;

use gigbridge_common::{Result, SimpleTemplate};
use serde::{Deserialize, Serialize};

/// An opaque gig-service resource name, e.g. `urn:gig:msg:555` or
/// `urn:gig:member:42`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(String);

impl Urn {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The colon-separated segments of the URN.
    pub fn parts(&self) -> Vec<&str> {
        self.0.split(':').collect()
    }

    /// The final segment, which carries the resource ID for most URN kinds.
    pub fn id_str(&self) -> Option<&str> {
        self.0.rsplit(':').next()
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Urn {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Urn {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Template for message URNs; `parse` recovers the numeric message ID and
/// `format_full` rebuilds the URN from one.
pub fn message_urn_template() -> Result<SimpleTemplate<u64>> {
    SimpleTemplate::new("urn:gig:msg:{id}", "id")
}

/// Template for member URNs.
pub fn member_urn_template() -> Result<SimpleTemplate<u64>> {
    SimpleTemplate::new("urn:gig:member:{id}", "id")
}

#[cfg(test)]
mod tests {
    use super::{Urn, member_urn_template, message_urn_template};

    #[test]
    fn parts_and_id_access() {
        let urn = Urn::new("urn:gig:msg:555");
        assert_eq!(urn.parts(), vec!["urn", "gig", "msg", "555"]);
        assert_eq!(urn.id_str(), Some("555"));
    }

    #[test]
    fn message_template_round_trips() {
        let tpl = message_urn_template().expect("template should construct");
        assert_eq!(tpl.format_full(&555), "urn:gig:msg:555");
        assert_eq!(tpl.parse("urn:gig:msg:555"), Some(555));
        assert_eq!(tpl.parse("urn:gig:member:555"), None);
    }

    #[test]
    fn member_template_rejects_foreign_urns() {
        let tpl = member_urn_template().expect("template should construct");
        assert_eq!(tpl.parse("urn:gig:msg:1"), None);
        assert_eq!(tpl.parse("urn:gig:member:42"), Some(42));
    }
}
