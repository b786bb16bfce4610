use std::collections::HashSet;

use ferry_config::RepositoryConfig;
use ferry_core::error::{FerryError, Result};
use ferry_source::record::sort_newest_first;
use ferry_source::TagRecord;
use tracing::debug;

/// What a repository run will transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Source tags surviving the exclusion filter and the tag limit.
    pub candidates: Vec<TagRecord>,
    /// Candidates not yet in the ledger with the same digest, newest first.
    pub transfers: Vec<TagRecord>,
}

impl Plan {
    pub fn latest(&self) -> Option<&TagRecord> {
        self.candidates.first()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}

/// Diff a newest-first source listing against the ledger.
///
/// Excluded tags are dropped first. A tag listed with several digests keeps
/// only its newest one. The listing is then cut to `repo.tag_limit`, and every
/// candidate whose (tag, digest) is already recorded is removed. A tag whose
/// digest changed upstream is planned again.
pub fn plan(repo: &RepositoryConfig, source: &[TagRecord], ledger: &[TagRecord]) -> Result<Plan> {
    if source.is_empty() {
        return Err(FerryError::EmptySource(repo.name.clone()));
    }

    let mut newest = source.to_vec();
    sort_newest_first(&mut newest);
    let mut seen = HashSet::new();
    let candidates: Vec<TagRecord> = newest
        .into_iter()
        .filter(|record| !repo.is_excluded(&record.tag))
        .filter(|record| seen.insert(record.tag.clone()))
        .take(repo.tag_limit)
        .collect();

    let mut transfers: Vec<TagRecord> = candidates
        .iter()
        .filter(|candidate| !ledger.iter().any(|synced| synced.same_identity(candidate)))
        .cloned()
        .collect();
    sort_newest_first(&mut transfers);

    debug!(
        repo = %repo.name,
        source = source.len(),
        candidates = candidates.len(),
        transfers = transfers.len(),
        "Planned sync"
    );
    Ok(Plan {
        candidates,
        transfers,
    })
}
