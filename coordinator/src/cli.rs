use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[clap(name = "coordinator", version)]
pub struct Cli {
    /// Path to the fleet config JSON file.
    #[clap(long, value_name = "CONFIG")]
    pub file: PathBuf,

    /// Experiment label, recorded in logs and the performance record store.
    #[clap(long, default_value = "default")]
    pub experiment: String,

    /// Allocation approach label (e.g. "auction", "round-robin"), recorded
    /// alongside the experiment name; the coordinator only implements the
    /// auction approach, but the flag is kept so batch-run scripts that
    /// iterate over approaches don't need a coordinator-specific branch.
    #[clap(long, default_value = "auction")]
    pub approach: String,
}
