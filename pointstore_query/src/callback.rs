//! Callback driven variants of the queries.
//!
//! Each function runs the query to completion and hands every event to the callback in delivery
//! order. The callback cancels the query by returning an error; nothing is delivered after that and
//! the error is returned as [`Error::Cancelled`]. On success the number of delivered events is
//! returned.

use crate::{
    BookendEvent, BookendQuery, BoxError, Error, LatestQuery, RangeQuery, Result, Row, bookend,
    latest, range,
};
use pointstore_backend::SeriesReader;
use tracing::debug;

fn drive<T, F, E>(events: impl Iterator<Item = Result<T>>, mut callback: F) -> Result<u64>
where
    F: FnMut(T) -> Result<(), E>,
    E: Into<BoxError>,
{
    let mut delivered = 0;
    for event in events {
        if let Err(e) = callback(event?) {
            let e = e.into();
            debug!(delivered, error = %e, "query cancelled by callback");
            return Err(Error::Cancelled(e));
        }
        delivered += 1;
    }
    Ok(delivered)
}

pub fn query_latest<R, F, E>(reader: &R, query: &LatestQuery, callback: F) -> Result<u64>
where
    R: SeriesReader + ?Sized,
    F: FnMut(Row) -> Result<(), E>,
    E: Into<BoxError>,
{
    drive(latest(reader, query)?, callback)
}

pub fn query_range<R, F, E>(reader: &R, query: &RangeQuery, callback: F) -> Result<u64>
where
    R: SeriesReader + ?Sized,
    F: FnMut(Row) -> Result<(), E>,
    E: Into<BoxError>,
{
    drive(range(reader, query)?, callback)
}

pub fn query_bookend<R, F, E>(reader: &R, query: &BookendQuery, callback: F) -> Result<u64>
where
    R: SeriesReader + ?Sized,
    F: FnMut(BookendEvent) -> Result<(), E>,
    E: Into<BoxError>,
{
    drive(bookend(reader, query)?, callback)
}
