use crate::{Error, Result};
use pointstore_backend::{SeriesReader, SeriesWriter};
use pointstore_types::{Direction, SeriesId, Timestamp};
use tracing::trace;

/// What a single copy pass moved
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CopyOutcome {
    pub samples: u64,
    /// Timestamp of the newest sample copied, `None` if nothing was copied
    pub last_timestamp: Option<Timestamp>,
}

/// Copy the samples of a series from `source` to `destination`, in batches of `batch_size`
///
/// With `from` set only samples at or after it are copied. The sample at `from` itself is copied
/// again, which is harmless because writes overwrite equal timestamps, and guarantees that a
/// sample written at the same timestamp as the previous pass ended on is not missed.
pub fn copy_series<S, D>(
    source: &S,
    destination: &D,
    series_id: SeriesId,
    from: Option<Timestamp>,
    batch_size: usize,
) -> Result<CopyOutcome>
where
    S: SeriesReader + ?Sized,
    D: SeriesWriter + ?Sized,
{
    let batch_size = batch_size.max(1);
    let read_error = |source| Error::Read { series_id, source };
    let cursor = source
        .seek(series_id, from.unwrap_or(Timestamp::MIN), Direction::Ascending)
        .map_err(read_error)?;

    let mut outcome = CopyOutcome {
        samples: 0,
        last_timestamp: None,
    };
    let mut batch = Vec::with_capacity(batch_size);
    let flush = |batch: &mut Vec<_>, outcome: &mut CopyOutcome| -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let samples = std::mem::replace(batch, Vec::with_capacity(batch_size));
        let count = samples.len() as u64;
        destination
            .write_samples(series_id, samples)
            .map_err(|source| Error::Write {
                series_id,
                backend: "primary",
                source,
            })?;
        outcome.samples += count;
        trace!(%series_id, count, "copied batch");
        Ok(())
    };

    for sample in cursor {
        let sample = sample.map_err(read_error)?;
        outcome.last_timestamp = Some(sample.timestamp);
        batch.push(sample);
        if batch.len() >= batch_size {
            flush(&mut batch, &mut outcome)?;
        }
    }
    flush(&mut batch, &mut outcome)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pointstore_backend::InMemoryBackend;
    use pointstore_test_helpers::{FaultyBackend, seed_series};
    use pretty_assertions::assert_eq;

    const S: SeriesId = SeriesId::new(4);

    fn timestamps(backend: &InMemoryBackend) -> Vec<i64> {
        backend.samples(S).iter().map(|s| s.timestamp).collect()
    }

    #[test_log::test]
    fn full_copy_in_batches() {
        let source = InMemoryBackend::new();
        seed_series(&source, S, &[1, 2, 3, 4, 5, 6, 7]);
        let destination = InMemoryBackend::new();

        let outcome = copy_series(&source, &destination, S, None, 3).unwrap();
        assert_eq!(
            outcome,
            CopyOutcome {
                samples: 7,
                last_timestamp: Some(7),
            }
        );
        assert_eq!(timestamps(&destination), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn catch_up_copy_includes_its_start() {
        let source = InMemoryBackend::new();
        seed_series(&source, S, &[1, 2, 3]);
        let destination = InMemoryBackend::new();
        let first = copy_series(&source, &destination, S, None, 10).unwrap();

        seed_series(&source, S, &[4, 5]);
        let second = copy_series(&source, &destination, S, first.last_timestamp, 10).unwrap();
        assert_eq!(second.samples, 3);
        assert_eq!(second.last_timestamp, Some(5));
        assert_eq!(timestamps(&destination), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn copying_again_changes_nothing() {
        let source = InMemoryBackend::new();
        seed_series(&source, S, &[10, 20, 30]);
        let destination = InMemoryBackend::new();
        copy_series(&source, &destination, S, None, 2).unwrap();
        let before = destination.samples(S);

        copy_series(&source, &destination, S, None, 2).unwrap();
        copy_series(&source, &destination, S, Some(20), 2).unwrap();
        assert_eq!(destination.samples(S), before);
    }

    #[test]
    fn empty_series() {
        let outcome =
            copy_series(&InMemoryBackend::new(), &InMemoryBackend::new(), S, None, 5).unwrap();
        assert_eq!(outcome.samples, 0);
        assert_eq!(outcome.last_timestamp, None);
    }

    #[test]
    fn errors_name_the_failing_side() {
        let source = FaultyBackend::new();
        seed_series(&source, S, &[1]);
        source.fail_reads(S, 1);
        let err = copy_series(&source, &InMemoryBackend::new(), S, None, 5).unwrap_err();
        assert!(matches!(err, Error::Read { series_id, .. } if series_id == S));

        let destination = FaultyBackend::new();
        destination.fail_writes(S, 1);
        let err = copy_series(&source, &destination, S, None, 5).unwrap_err();
        assert!(matches!(err, Error::Write { backend: "primary", .. }));
    }
}
