//! Config for the tokio runtime the commands run on.

use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Tokio runtime type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TokioRuntimeType {
    /// Current-thread runtime.
    CurrentThread,

    /// Multi-thread runtime.
    #[default]
    MultiThread,
}

/// CLI config for the runtime.
///
/// Migration workers are tasks on the runtime threads, while every series copy and every query
/// runs on the blocking pool.
#[derive(Debug, Clone, Copy, clap::Parser)]
pub struct TokioIoConfig {
    /// Set the maximum number of runtime threads to use.
    ///
    /// Defaults to the number of logical cores on the system.
    #[clap(long = "num-io-threads", env = "POINTSTORE_NUM_IO_THREADS", action)]
    pub num_threads: Option<NonZeroUsize>,

    /// Tokio runtime type.
    #[clap(
        long = "io-runtime-type",
        env = "POINTSTORE_IO_RUNTIME_TYPE",
        default_value_t = TokioRuntimeType::default(),
        value_enum,
        action
    )]
    pub runtime_type: TokioRuntimeType,

    /// Limit for the threads of the blocking pool, which runs series copies and queries.
    #[clap(
        long = "max-blocking-threads",
        env = "POINTSTORE_MAX_BLOCKING_THREADS",
        action
    )]
    pub max_blocking_threads: Option<NonZeroUsize>,
}

impl TokioIoConfig {
    /// Creates the tokio runtime builder.
    pub fn builder(&self) -> Result<tokio::runtime::Builder, std::io::Error> {
        // NOTE: no log macros will work here!
        //
        // The subscriber is installed once the runtime is running, use eprintln!() instead.

        let mut builder = match self.runtime_type {
            TokioRuntimeType::CurrentThread => tokio::runtime::Builder::new_current_thread(),
            TokioRuntimeType::MultiThread => tokio::runtime::Builder::new_multi_thread(),
        };
        builder.enable_all();

        let thread_counter = Arc::new(AtomicUsize::new(1));
        builder.thread_name_fn(move || {
            format!(
                "pointstore-{}",
                thread_counter.fetch_add(1, Ordering::SeqCst)
            )
        });

        if self.runtime_type == TokioRuntimeType::MultiThread {
            let num_threads = match self.num_threads {
                None => std::thread::available_parallelism()?,
                Some(n) => n,
            };
            builder.worker_threads(num_threads.get());
        }

        if let Some(n) = self.max_blocking_threads {
            builder.max_blocking_threads(n.get());
        }

        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashSet;

    fn runtime(args: &[&str]) -> tokio::runtime::Runtime {
        TokioIoConfig::try_parse_from(std::iter::once("cli").chain(args.iter().copied()))
            .unwrap()
            .builder()
            .unwrap()
            .build()
            .unwrap()
    }

    fn thread_name() -> String {
        std::thread::current().name().unwrap_or_default().to_owned()
    }

    #[test]
    fn workers_and_blocking_threads_are_named() {
        let rt = runtime(&["--num-io-threads", "2"]);
        let (worker, blocking) = rt.block_on(async {
            let worker = tokio::spawn(async { thread_name() }).await.unwrap();
            let blocking = tokio::task::spawn_blocking(thread_name).await.unwrap();
            (worker, blocking)
        });
        assert!(worker.starts_with("pointstore-"), "{worker}");
        assert!(blocking.starts_with("pointstore-"), "{blocking}");
    }

    #[test]
    fn blocking_pool_is_limited() {
        let rt = runtime(&["--max-blocking-threads", "1"]);
        let names = rt.block_on(async {
            let tasks = (0..4)
                .map(|_| tokio::task::spawn_blocking(thread_name))
                .collect::<Vec<_>>();
            let mut names = HashSet::new();
            for task in tasks {
                names.insert(task.await.unwrap());
            }
            names
        });
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn current_thread_runtime() {
        let config = TokioIoConfig::try_parse_from(["cli", "--io-runtime-type", "current-thread"])
            .unwrap();
        assert_eq!(config.runtime_type, TokioRuntimeType::CurrentThread);
        let rt = config.builder().unwrap().build().unwrap();
        assert_eq!(rt.block_on(async { 1 + 1 }), 2);
    }

    #[test]
    fn zero_threads_are_rejected() {
        assert!(TokioIoConfig::try_parse_from(["cli", "--num-io-threads", "0"]).is_err());
        assert!(TokioIoConfig::try_parse_from(["cli", "--max-blocking-threads", "0"]).is_err());
    }
}
