use std::path::PathBuf;

use clap::Parser;


#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file with networks, contracts and fetch settings
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    pub config: String,

    /// Sqlite database to backfill
    #[arg(long = "db", value_name = "FILE", default_value = "nft_metadata.db")]
    pub database: PathBuf,

    /// Skip the on-disk event log cache and rescan the chain
    #[arg(long)]
    pub no_cache: bool,

    /// Whether the logs should be structured in JSON format
    #[arg(long)]
    pub json_log: bool,
}
