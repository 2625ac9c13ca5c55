use pointstore_types::{SeriesId, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

/// What the point configuration layer knows about the data point that owns a series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesInfo {
    pub series_id: SeriesId,
    /// Externally visible identifier of the data point
    pub name: String,
    pub value_type: ValueType,
}

/// Looks up the data point that owns a series
///
/// This is served by the relational configuration store in a full deployment.
pub trait SeriesRegistry: Debug + Send + Sync {
    fn series_info(&self, series_id: SeriesId) -> Option<SeriesInfo>;
}

/// A registry over a fixed set of series
#[derive(Debug, Default, Clone)]
pub struct StaticSeriesRegistry {
    series: HashMap<SeriesId, SeriesInfo>,
}

impl StaticSeriesRegistry {
    pub fn new(series: impl IntoIterator<Item = SeriesInfo>) -> Self {
        Self {
            series: series.into_iter().map(|s| (s.series_id, s)).collect(),
        }
    }

    pub fn insert(&mut self, info: SeriesInfo) {
        self.series.insert(info.series_id, info);
    }
}

impl SeriesRegistry for StaticSeriesRegistry {
    fn series_info(&self, series_id: SeriesId) -> Option<SeriesInfo> {
        self.series.get(&series_id).cloned()
    }
}
