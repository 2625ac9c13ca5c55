//! Ordering, indexing and limit properties that hold for any data.

use pointstore_query::{BookendEvent, BookendQuery, LatestQuery, RangeQuery, bookend, latest, range};
use pointstore_test_helpers::FixtureReader;
use pointstore_types::SeriesId;
use proptest::prelude::*;
use std::collections::HashMap;

fn reader(series: &[Vec<i64>]) -> (FixtureReader, Vec<SeriesId>) {
    let mut reader = FixtureReader::new();
    let mut ids = vec![];
    for (i, timestamps) in series.iter().enumerate() {
        let id = SeriesId::new(i as u32 + 1);
        reader = reader.with_series(id, timestamps);
        ids.push(id);
    }
    (reader, ids)
}

fn series_strategy() -> impl Strategy<Value = Vec<Vec<i64>>> {
    prop::collection::vec(prop::collection::vec(0i64..100, 0..24), 1..5)
}

fn per_series_counts(ids: impl Iterator<Item = SeriesId>) -> HashMap<SeriesId, usize> {
    let mut counts = HashMap::new();
    for id in ids {
        *counts.entry(id).or_default() += 1;
    }
    counts
}

proptest! {
    #[test]
    fn latest_properties(
        series in series_strategy(),
        end in 0i64..110,
        order_by_series in any::<bool>(),
        limit in proptest::option::of(0usize..12),
    ) {
        let (reader, ids) = reader(&series);
        let query = LatestQuery::new(ids.clone(), end, order_by_series, limit).unwrap();
        let rows: Vec<_> = latest(&reader, &query).unwrap().map(Result::unwrap).collect();

        for (i, row) in rows.iter().enumerate() {
            prop_assert_eq!(row.index, i as u64);
            prop_assert!(row.sample.timestamp < end);
        }
        let counts = per_series_counts(rows.iter().map(|r| r.sample.series_id));
        if order_by_series {
            if let Some(limit) = limit {
                prop_assert!(counts.values().all(|c| *c <= limit));
            }
        } else {
            prop_assert!(rows.windows(2).all(|w| w[0].sample.timestamp >= w[1].sample.timestamp));
            if let Some(limit) = limit {
                prop_assert!(rows.len() <= limit);
            }
        }
        if limit.is_none() {
            let expected: usize = series.iter().map(|s| s.iter().filter(|t| **t < end).count()).sum();
            prop_assert_eq!(rows.len(), expected);
        }
    }

    #[test]
    fn range_properties(
        series in series_strategy(),
        from in 0i64..100,
        span in 0i64..60,
        order_by_series in any::<bool>(),
        limit in proptest::option::of(0usize..12),
    ) {
        let (reader, ids) = reader(&series);
        let to = from + span;
        let query = RangeQuery::new(ids.clone(), from, to, order_by_series, limit).unwrap();
        let rows: Vec<_> = range(&reader, &query).unwrap().map(Result::unwrap).collect();

        for (i, row) in rows.iter().enumerate() {
            prop_assert_eq!(row.index, i as u64);
            prop_assert!(from <= row.sample.timestamp && row.sample.timestamp < to);
        }
        let counts = per_series_counts(rows.iter().map(|r| r.sample.series_id));
        if order_by_series {
            if let Some(limit) = limit {
                prop_assert!(counts.values().all(|c| *c <= limit));
            }
            // series appear as contiguous groups in query order
            let mut groups: Vec<SeriesId> = rows.iter().map(|r| r.sample.series_id).collect();
            groups.dedup();
            let mut expected = ids.clone();
            expected.retain(|id| groups.contains(id));
            prop_assert_eq!(groups, expected);
        } else {
            prop_assert!(rows.windows(2).all(|w| w[0].sample.timestamp <= w[1].sample.timestamp));
            if let Some(limit) = limit {
                prop_assert!(rows.len() <= limit);
            }
        }
    }

    #[test]
    fn bookend_properties(
        series in series_strategy(),
        from in 0i64..100,
        span in 0i64..60,
        order_by_series in any::<bool>(),
        limit in proptest::option::of(0usize..12),
    ) {
        let (reader, ids) = reader(&series);
        let to = from + span;
        let query = BookendQuery::new(ids.clone(), from, to, order_by_series, limit).unwrap();
        let events: Vec<_> = bookend(&reader, &query).unwrap().map(Result::unwrap).collect();

        for (i, event) in events.iter().enumerate() {
            prop_assert_eq!(event.index(), i as u64);
        }

        // firsts lead in query order
        let firsts: Vec<_> = events.iter().take(ids.len()).collect();
        prop_assert!(firsts.iter().all(|e| matches!(e, BookendEvent::First { .. })), "all leading events are First");
        prop_assert_eq!(firsts.iter().map(|e| e.sample().series_id).collect::<Vec<_>>(), ids.clone());
        prop_assert!(firsts.iter().all(|e| e.sample().timestamp == from));

        let lasts: Vec<_> = events.iter().filter(|e| matches!(e, BookendEvent::Last { .. })).collect();
        prop_assert_eq!(lasts.iter().map(|e| e.sample().series_id).collect::<Vec<_>>(), ids.clone());
        prop_assert!(lasts.iter().all(|e| e.sample().timestamp == to));

        let rows: Vec<_> = events.iter().filter(|e| matches!(e, BookendEvent::Row { .. })).collect();
        prop_assert!(rows.iter().all(|e| from < e.sample().timestamp && e.sample().timestamp < to));

        // every row precedes the last of its series
        for (pos, event) in events.iter().enumerate() {
            if matches!(event, BookendEvent::Row { .. }) {
                let id = event.sample().series_id;
                prop_assert!(events[pos..].iter().any(|e| matches!(e, BookendEvent::Last { .. }) && e.sample().series_id == id), "row precedes Last of its series");
            }
        }

        let counts = per_series_counts(rows.iter().map(|e| e.sample().series_id));
        if order_by_series {
            if let Some(limit) = limit {
                prop_assert!(counts.values().all(|c| *c <= limit));
            }
        } else {
            prop_assert!(rows.windows(2).all(|w| w[0].sample().timestamp <= w[1].sample().timestamp));
            if let Some(limit) = limit {
                prop_assert!(rows.len() <= limit);
            }
        }
    }
}
