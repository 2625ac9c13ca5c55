//! Entrypoint of the pointstore binary

use dotenvy::dotenv;
use pointstore_clap_blocks::{logging::LoggingConfig, tokio::TokioIoConfig};

mod commands {
    pub(crate) mod common;
    pub(crate) mod migrate;
    pub(crate) mod query;
}

enum ReturnCode {
    Failure = 1,
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "pointstore",
    version,
    about = "Point value storage tools",
    long_about = r#"Point value storage tools

Examples:
    # Migrate a synthetic fleet of 1000 series between two backends
    pointstore migrate --series 1000 --days 7

    # Same, with debug logging and 16 concurrent copies
    pointstore migrate -vv --series 1000 --migration-threads 16

    # Print the bookends of two series as JSON lines
    pointstore query --mode bookend --series 1,2 --limit 10
"#
)]
struct Config {
    #[clap(flatten)]
    runtime_config: TokioIoConfig,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Migrate a synthetic fleet from a secondary to a primary backend under live writes
    Migrate(commands::migrate::Config),

    /// Run a latest, range or bookend query over a synthetic fleet
    Query(commands::query::Config),
}

fn main() -> Result<(), std::io::Error> {
    // load all environment variables from .env before doing anything
    load_dotenv();

    let config: Config = clap::Parser::parse();

    let tokio_runtime = config.runtime_config.builder()?.build()?;

    tokio_runtime.block_on(async move {
        fn handle_init_logs(config: &LoggingConfig) {
            if let Err(e) = config.install_global_subscriber(LoggingConfig::DEFAULT_LOG_FILTER) {
                eprintln!("Initializing logs failed: {e}");
                std::process::exit(ReturnCode::Failure as _);
            }
        }

        match config.command {
            None => println!("command required, -h/--help for help"),
            Some(Command::Migrate(config)) => {
                handle_init_logs(&config.logging_config);
                if let Err(e) = commands::migrate::command(config).await {
                    eprintln!("Migrate command failed: {e:#}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
            Some(Command::Query(config)) => {
                handle_init_logs(&config.logging_config);
                if let Err(e) = commands::query::command(config).await {
                    eprintln!("Query command failed: {e:#}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
        }
    });

    Ok(())
}

/// Source the .env file before initialising the Config struct - this sets
/// any envs in the file, which the Config struct then uses.
///
/// Precedence is given to existing env variables.
fn load_dotenv() {
    match dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            // a missing env file is not an error
        }
        Err(e) => {
            eprintln!("FATAL Error loading config from: {e}");
            eprintln!("Aborting");
            std::process::exit(1);
        }
    };
}
