use std::collections::HashSet;

use chrono::{DateTime, Utc};

/// Digest placeholder for images the upstream listed without one.
pub const UNKNOWN_DIGEST: &str = "unknown";

/// One tag as seen upstream (or as recorded in the history ledger).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub tag: String,
    pub digest: String,
    pub updated_at: DateTime<Utc>,
}

impl TagRecord {
    pub fn new(tag: impl Into<String>, digest: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            tag: tag.into(),
            digest: digest.into(),
            updated_at,
        }
    }

    pub fn has_known_digest(&self) -> bool {
        self.digest != UNKNOWN_DIGEST
    }

    /// Same tag pointing at the same manifest. Unknown digests never match,
    /// so such tags are always considered changed.
    pub fn same_identity(&self, other: &TagRecord) -> bool {
        self.has_known_digest() && self.tag == other.tag && self.digest == other.digest
    }
}

/// Stable sort, most recently updated first.
pub fn sort_newest_first(records: &mut [TagRecord]) {
    records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

/// Newest-first order with duplicate (tag, digest) pairs removed.
pub fn finalize(mut records: Vec<TagRecord>) -> Vec<TagRecord> {
    sort_newest_first(&mut records);
    let mut seen = HashSet::new();
    records.retain(|record| seen.insert((record.tag.clone(), record.digest.clone())));
    records
}
