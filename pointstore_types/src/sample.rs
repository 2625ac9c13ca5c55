use serde::{Deserialize, Serialize};

use crate::{SeriesId, Timestamp, Value};

/// Metadata attached to a sample describing where it came from, e.g., a user edit or an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub source: String,
}

impl Annotation {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// A single recorded value of a series
///
/// A `value` of `None` is only produced by the query engine, to represent a boundary where no
/// value was in effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub series_id: SeriesId,
    pub timestamp: Timestamp,
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
}

impl Sample {
    pub fn new(series_id: SeriesId, timestamp: Timestamp, value: impl Into<Value>) -> Self {
        Self {
            series_id,
            timestamp,
            value: Some(value.into()),
            annotation: None,
        }
    }

    /// A sample carrying no value
    pub fn null(series_id: SeriesId, timestamp: Timestamp) -> Self {
        Self {
            series_id,
            timestamp,
            value: None,
            annotation: None,
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    /// The same sample moved to a different timestamp
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_keeps_payload() {
        let s = Sample::new(SeriesId::new(1), 10, 1.5).with_annotation(Annotation::new("import"));
        let moved = s.clone().with_timestamp(20);
        assert_eq!(moved.timestamp, 20);
        assert_eq!(moved.value, s.value);
        assert_eq!(moved.annotation, s.annotation);
    }

    #[test]
    fn annotation_is_omitted_when_absent() {
        let json = serde_json::to_string(&Sample::null(SeriesId::new(3), 5)).unwrap();
        assert_eq!(json, r#"{"series_id":3,"timestamp":5,"value":null}"#);
    }
}
