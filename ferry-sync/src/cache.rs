use std::collections::VecDeque;

use ferry_core::error::Result;
use tracing::{debug, warn};

use crate::runtime::ContainerRuntime;

pub const DEFAULT_CACHE_CAPACITY: usize = 6;

/// Recently pulled source images kept on the host so that pulls of related
/// tags can reuse their layers. Oldest entries are removed first.
#[derive(Debug)]
pub struct PullCache {
    capacity: usize,
    entries: VecDeque<String>,
}

impl Default for PullCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl PullCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Track a freshly pulled image; once the cache reaches capacity the
    /// oldest image is removed from the host.
    pub fn admit<R: ContainerRuntime>(&mut self, reference: String, runtime: &R) -> Result<()> {
        self.entries.retain(|entry| *entry != reference);
        self.entries.push_back(reference);

        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.entries.pop_front() {
                debug!(image = %oldest, queued = self.entries.len(), "Evicting cached image");
                runtime.remove_image(&oldest)?;
            }
        }
        Ok(())
    }

    /// Remove every cached image. The cache is empty afterwards even if some
    /// removals failed; the first failure is returned.
    pub fn drain<R: ContainerRuntime>(&mut self, runtime: &R) -> Result<()> {
        let mut first_error = None;
        while let Some(reference) = self.entries.pop_front() {
            debug!(image = %reference, remaining = self.entries.len(), "Cleaning cached image");
            if let Err(e) = runtime.remove_image(&reference) {
                warn!(image = %reference, error = %e, "Failed to remove cached image");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
