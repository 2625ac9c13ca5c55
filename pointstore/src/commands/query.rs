use super::common::{FleetConfig, SeparatedList};
use clap::{Parser, ValueEnum};
use pointstore_backend::InMemoryBackend;
use pointstore_clap_blocks::logging::LoggingConfig;
use pointstore_query::{BookendQuery, LatestQuery, RangeQuery};
use pointstore_types::{SeriesId, Timestamp};
use serde::Serialize;
use std::io::{self, Write};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("generating the fleet failed: {0}")]
    Fleet(#[from] pointstore_backend::Error),

    #[error(transparent)]
    Query(#[from] pointstore_query::Error),

    #[error("query task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Parser)]
#[clap(visible_alias = "q")]
pub(crate) struct Config {
    #[clap(flatten)]
    fleet: FleetConfig,

    #[clap(flatten)]
    pub(crate) logging_config: LoggingConfig,

    /// The kind of query to run
    #[clap(value_enum, long = "mode", short = 'm', default_value_t = QueryMode::Range)]
    mode: QueryMode,

    /// Series to query, every series of the fleet if not set
    #[clap(long = "series-ids")]
    series_ids: Option<SeparatedList<u32>>,

    /// Inclusive start of the range, the start of the fleet's history if not set
    #[clap(long = "from")]
    from: Option<Timestamp>,

    /// Exclusive end of the range, the end of the fleet's history if not set
    ///
    /// A latest query returns the newest sample before this timestamp.
    #[clap(long = "to")]
    to: Option<Timestamp>,

    /// Deliver the samples of one series after another instead of in timestamp order
    #[clap(long = "order-by-series")]
    order_by_series: bool,

    /// Maximum number of rows to deliver
    #[clap(long = "limit")]
    limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QueryMode {
    Latest,
    Range,
    Bookend,
}

pub(crate) async fn command(config: Config) -> Result<()> {
    tokio::task::spawn_blocking(move || run(config, &mut io::stdout().lock())).await??;
    Ok(())
}

fn run(config: Config, out: &mut impl Write) -> Result<u64> {
    let fleet = config.fleet;
    let mode = config.mode;
    let backend = InMemoryBackend::new();
    fleet.populate(&backend)?;

    let series_ids = match config.series_ids {
        Some(ids) => ids.into_iter().map(SeriesId::new).collect(),
        None => fleet.series_ids(),
    };
    let from = config.from.unwrap_or(fleet.start);
    let to = config.to.unwrap_or_else(|| fleet.end());

    let delivered = match mode {
        QueryMode::Latest => {
            let query = LatestQuery::new(series_ids, to, config.order_by_series, config.limit)?;
            pointstore_query::query_latest(&backend, &query, print_json(out))?
        }
        QueryMode::Range => {
            let query =
                RangeQuery::new(series_ids, from, to, config.order_by_series, config.limit)?;
            pointstore_query::query_range(&backend, &query, print_json(out))?
        }
        QueryMode::Bookend => {
            let query =
                BookendQuery::new(series_ids, from, to, config.order_by_series, config.limit)?;
            pointstore_query::query_bookend(&backend, &query, print_json(out))?
        }
    };
    info!(?mode, delivered, "query finished");
    Ok(delivered)
}

/// A query callback writing every event as a line of JSON
///
/// A failed write, such as a closed pipe, cancels the query.
fn print_json<T: Serialize>(out: &mut impl Write) -> impl FnMut(T) -> io::Result<()> + '_ {
    move |event| {
        serde_json::to_writer(&mut *out, &event)?;
        out.write_all(b"\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const START: &str = "1704067200000";

    fn query(args: &[&str]) -> (u64, Vec<serde_json::Value>) {
        let config = Config::try_parse_from(
            ["query", "--series", "3", "--interval", "1h", "--start", START]
                .into_iter()
                .chain(args.iter().copied()),
        )
        .unwrap();
        let mut out = Vec::new();
        let delivered = run(config, &mut out).unwrap();
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        (delivered, lines)
    }

    #[test]
    fn latest() {
        let (delivered, lines) = query(&["--mode", "latest"]);
        assert_eq!(delivered, 3);
        for line in &lines {
            assert_eq!(line["sample"]["timestamp"], 1_704_067_200_000_i64 + 23 * 3_600_000);
        }
    }

    #[test]
    fn range_of_selected_series() {
        let to = (1_704_067_200_000_i64 + 2 * 3_600_000).to_string();
        let (delivered, lines) = query(&["--series-ids", "1,2", "--to", &to]);
        assert_eq!(delivered, 4);
        let indexes = lines.iter().map(|l| l["index"].clone()).collect::<Vec<_>>();
        assert_eq!(indexes, vec![0, 1, 2, 3]);
    }

    #[test]
    fn limited_bookend() {
        let (delivered, lines) = query(&[
            "--mode",
            "bookend",
            "--series-ids",
            "2",
            "--limit",
            "3",
        ]);
        assert_eq!(delivered, 5);
        let events = lines
            .iter()
            .map(|l| l["event"].as_str().unwrap().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(events, vec!["first", "row", "row", "row", "last"]);
        assert_eq!(lines[4]["is_bookend"], true);
    }

    #[test]
    fn invalid_range_is_rejected() {
        let config = Config::try_parse_from(["query", "--from", "10", "--to", "5"]).unwrap();
        assert!(matches!(
            run(config, &mut Vec::<u8>::new()),
            Err(Error::Query(_))
        ));
    }
}
