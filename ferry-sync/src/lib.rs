//! Incremental mirroring of upstream tags into the target registry.
//!
//! The pieces run in this order for each repository:
//!
//! 1. [`planner::plan`] diffs the upstream listing against the [`Ledger`]
//! 2. [`TransferExecutor`] pulls, tags, pushes and records each planned tag,
//!    keeping recently pulled images in a [`PullCache`]

pub mod cache;
pub mod docker;
pub mod executor;
pub mod ledger;
pub mod planner;
pub mod retry;
pub mod runtime;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cache::{PullCache, DEFAULT_CACHE_CAPACITY};
pub use docker::DockerCli;
pub use executor::TransferExecutor;
pub use ledger::Ledger;
pub use planner::{plan, Plan};
pub use retry::RetryPolicy;
pub use runtime::{ContainerRuntime, PushEvent, PushEvents};
