use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of an OSM record, written as a braced UUID.
///
/// `{8adb3faa-8e6a-48e3-bd73-ba6a02154b02}`
#[derive(Eq, PartialEq, Hash, Debug, Clone, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(String);

impl From<&str> for Handle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Handle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Handle {
    pub fn new() -> Self {
        Self(format!("{{{}}}", Uuid::new_v4()))
    }

    /// Parses a braced UUID. Anything else (names, numbers, bare UUIDs) is rejected.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let inner = text.strip_prefix('{')?.strip_suffix('}')?;
        // Only the hyphenated form, so one id has one spelling.
        let uuid = Uuid::try_parse(inner).ok()?;
        let hyphenated = uuid.hyphenated().to_string();
        if !inner.eq_ignore_ascii_case(&hyphenated) {
            return None;
        }
        Some(Self(text.to_string()))
    }

    /// Returns true if the text looks like a record handle.
    pub fn is_handle(text: &str) -> bool {
        Self::parse(text).is_some()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
