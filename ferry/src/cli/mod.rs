// CLI argument parsing and definitions

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use ferry_sync::cache::DEFAULT_CACHE_CAPACITY;
use ferry_sync::retry::{RetryPolicy, DEFAULT_ATTEMPTS};

#[derive(Debug, Clone, Parser)]
#[command(name = "ferry")]
#[command(about = "Mirror upstream container image tags into a private registry")]
#[command(version)]
pub struct Args {
    /// Items file listing the repositories to mirror
    #[arg(short, long, default_value = "items.yml")]
    pub config: PathBuf,

    /// Directory holding one sync ledger per repository
    #[arg(long, default_value = "history")]
    pub history_dir: PathBuf,

    /// Only sync the named repository (repeatable)
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,

    /// List and plan every repository without pulling or pushing
    #[arg(long)]
    pub dry_run: bool,

    /// Stop after the first repository that fails
    #[arg(long)]
    pub fail_fast: bool,

    /// Attempts for each pull and push
    #[arg(long, default_value_t = DEFAULT_ATTEMPTS, value_name = "N")]
    pub retry_attempts: u32,

    /// Seconds to wait between attempts
    #[arg(long, default_value_t = 10, value_name = "SECS")]
    pub retry_delay: u64,

    /// Pulled images kept locally before the oldest is removed
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY, value_name = "N")]
    pub cache_capacity: usize,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,
}

impl Args {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_secs(self.retry_delay))
    }
}
