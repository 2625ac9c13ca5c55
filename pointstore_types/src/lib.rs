//! Shared types for the point-value store: series identifiers, samples and their values.
//!
//! A series is the time ordered stream of samples recorded for a single data point. Timestamps are
//! milliseconds since the Unix epoch. The types here are deliberately free of any storage concern
//! so that every backend, the query engine and the migration coordinator can share them.

mod id;
mod sample;
mod value;

pub use id::SeriesId;
pub use sample::{Annotation, Sample};
pub use value::{Value, ValueType};

/// Milliseconds since the Unix epoch
pub type Timestamp = i64;

/// The direction in which a series is traversed from a seek point
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Yield samples at or after the seek timestamp, oldest first
    Ascending,
    /// Yield samples strictly before the seek timestamp, newest first
    Descending,
}

impl Direction {
    /// Whether `timestamp` is reached before `other` when traversing in this direction
    pub fn precedes(self, timestamp: Timestamp, other: Timestamp) -> bool {
        match self {
            Self::Ascending => timestamp < other,
            Self::Descending => timestamp > other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_precedes() {
        assert!(Direction::Ascending.precedes(1, 2));
        assert!(!Direction::Ascending.precedes(2, 2));
        assert!(Direction::Descending.precedes(3, 2));
        assert!(!Direction::Descending.precedes(1, 2));
    }
}
