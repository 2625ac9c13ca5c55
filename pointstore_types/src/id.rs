use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifies the sample stream of a single data point
#[derive(Debug, Copy, Clone, Eq, PartialOrd, Ord, PartialEq, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct SeriesId(u32);

impl SeriesId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl From<u32> for SeriesId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Display for SeriesId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::SeriesId;

    #[test]
    fn serializes_as_bare_integer() {
        let id = SeriesId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let back: SeriesId = serde_json::from_str("42").unwrap();
        assert_eq!(back, id);
    }
}
