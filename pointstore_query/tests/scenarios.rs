//! End to end query scenarios over the in-memory backend.

use pointstore_backend::{InMemoryBackend, SeriesWriter};
use pointstore_query::{BookendEvent, BookendQuery, LatestQuery, bookend, latest, query_bookend};
use pointstore_test_helpers::{numeric_samples, regular_samples};
use pointstore_types::SeriesId;
use std::convert::Infallible;

const MINUTE: i64 = 60 * 1000;
const DAY: i64 = 24 * 60 * MINUTE;
/// 2024-01-01T00:00:00Z
const START: i64 = 1_704_067_200_000;
const END: i64 = START + 30 * DAY;
const PER_SERIES: usize = (30 * DAY / (5 * MINUTE)) as usize;

const A: SeriesId = SeriesId::new(1);
const B: SeriesId = SeriesId::new(2);

/// Two series sampled every five minutes for thirty days, the second with three extra samples
/// before the start
fn thirty_days() -> InMemoryBackend {
    let backend = InMemoryBackend::new();
    for id in [A, B] {
        backend
            .write_samples(id, regular_samples(id, START, END, 5 * MINUTE))
            .unwrap();
    }
    backend
        .write_samples(B, numeric_samples(B, &[START - 3 * DAY, START - 2 * DAY, START - DAY]))
        .unwrap();
    backend
}

#[test_log::test]
fn latest_over_thirty_days() {
    let backend = thirty_days();
    let query = LatestQuery::new([A, B], END, false, None).unwrap();
    let rows: Vec<_> = latest(&backend, &query)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(rows.len(), 2 * PER_SERIES + 3);
    assert!(rows.windows(2).all(|w| w[0].sample.timestamp >= w[1].sample.timestamp));
    assert!(rows.iter().enumerate().all(|(i, r)| r.index == i as u64));
    assert_eq!(rows.last().unwrap().sample.timestamp, START - 3 * DAY);
}

#[test_log::test]
fn bookend_limited_per_series() {
    let backend = thirty_days();
    let query = BookendQuery::new([A, B], START - 1, END, true, Some(20)).unwrap();
    let events: Vec<_> = bookend(&backend, &query)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    for id in [A, B] {
        let rows = events
            .iter()
            .filter(|e| matches!(e, BookendEvent::Row { .. }) && e.sample().series_id == id)
            .count();
        assert_eq!(rows, 20);
    }
    let lasts: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, BookendEvent::Last { .. }))
        .collect();
    assert_eq!(lasts.len(), 2);
    assert!(lasts.iter().all(|e| e.is_bookend() && e.sample().timestamp == END));

    // series A has nothing before START, B carries its last early sample
    let firsts: Vec<_> = events.iter().take(2).collect();
    assert_eq!(firsts[0].sample().value, None);
    assert_eq!(
        firsts[1].sample().value.as_ref().and_then(|v| v.as_f64()),
        Some((START - DAY) as f64)
    );
}

#[test_log::test]
fn cancelling_inside_first_events_stops_everything() {
    let backend = thirty_days();
    let query = BookendQuery::new([A, B], START, END, false, None).unwrap();
    let mut seen = vec![];
    let err = query_bookend(&backend, &query, |event| {
        let stop = matches!(event, BookendEvent::First { .. }) && event.sample().series_id == A;
        seen.push(event);
        if stop { Err("stop") } else { Ok(()) }
    })
    .unwrap_err();
    assert!(matches!(err, pointstore_query::Error::Cancelled(_)));
    assert_eq!(seen.len(), 1);
}

#[test_log::test]
fn cancelling_inside_rows_suppresses_lasts() {
    let backend = thirty_days();
    let query = BookendQuery::new([A, B], START, START + DAY, true, None).unwrap();
    let mut seen = vec![];
    let result = query_bookend(&backend, &query, |event| {
        let stop = matches!(event, BookendEvent::Row { .. }) && event.index() == 10;
        seen.push(event);
        if stop { Err("stop") } else { Ok(()) }
    });
    assert!(result.is_err());
    assert_eq!(seen.len(), 11);
    assert!(!seen.iter().any(|e| matches!(e, BookendEvent::Last { .. })));
}

#[test_log::test]
fn cancelling_inside_lasts_stops_later_lasts() {
    let backend = thirty_days();
    let query = BookendQuery::new([A, B], START, START + DAY, false, None).unwrap();
    let mut seen = vec![];
    let err = query_bookend(&backend, &query, |event| {
        let stop = matches!(event, BookendEvent::Last { .. });
        seen.push(event);
        if stop { Err("stop") } else { Ok(()) }
    })
    .unwrap_err();
    assert!(matches!(err, pointstore_query::Error::Cancelled(_)));

    let lasts: Vec<_> = seen
        .iter()
        .filter(|e| matches!(e, BookendEvent::Last { .. }))
        .collect();
    assert_eq!(lasts.len(), 1);
    assert_eq!(lasts[0].sample().series_id, A);
    assert_eq!(seen.len(), 2 + 2 * 287 + 1);
}

#[test_log::test]
fn full_delivery_count_matches() {
    let backend = thirty_days();
    let query = BookendQuery::new([A, B], START, START + DAY, false, None).unwrap();
    let delivered = query_bookend(&backend, &query, |_| Ok::<_, Infallible>(())).unwrap();
    // a day holds 288 samples per series, the one at START becomes the first value
    assert_eq!(delivered, 2 + 2 * 287 + 2);
}
