//! Configuration blocks shared by the `pointstore` commands.
//!
//! Every block is a `clap` argument group that can be flattened into a command, with an
//! environment variable fallback for each flag.

pub mod logging;
pub mod migration;
pub mod tokio;
