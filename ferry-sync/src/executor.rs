//! Per-tag transfer: pull → tag → push → remove, then record in the ledger.

use std::time::Instant;

use ferry_config::{RegistryAuth, RepositoryConfig};
use ferry_core::error::{FerryError, Result};
use ferry_core::Interrupt;
use ferry_source::timestamp::format_ledger;
use ferry_source::TagRecord;
use tracing::{debug, info, warn};

use crate::cache::PullCache;
use crate::ledger::Ledger;
use crate::retry::RetryPolicy;
use crate::runtime::{ContainerRuntime, PushEvent};

/// Owns everything one transfer run mutates besides the ledger: the runtime
/// handle, the target credentials and the pull cache.
pub struct TransferExecutor<R> {
    runtime: R,
    auth: RegistryAuth,
    retry: RetryPolicy,
    cache: PullCache,
    interrupt: Interrupt,
    transferred: usize,
}

impl<R: ContainerRuntime> TransferExecutor<R> {
    pub fn new(runtime: R, auth: RegistryAuth) -> Self {
        Self {
            runtime,
            auth,
            retry: RetryPolicy::default(),
            cache: PullCache::default(),
            interrupt: Interrupt::new(),
            transferred: 0,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = PullCache::new(capacity);
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn cache(&self) -> &PullCache {
        &self.cache
    }

    /// Tags fully transferred by the most recent [`run`](Self::run).
    pub fn transferred(&self) -> usize {
        self.transferred
    }

    /// Transfer `transfers` in order, recording each one in `ledger` as soon as
    /// it is pushed. The first failure aborts the remaining tags. The pull
    /// cache is drained before returning, whatever the outcome.
    pub fn run(
        &mut self,
        repo: &RepositoryConfig,
        transfers: &[TagRecord],
        ledger: &mut Ledger,
    ) -> Result<usize> {
        self.transferred = 0;
        let outcome = self.transfer_all(repo, transfers, ledger);
        let drained = self.cache.drain(&self.runtime);

        match (outcome, drained) {
            (Ok(()), Ok(())) => Ok(self.transferred),
            (Ok(()), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup)) => {
                warn!(repo = %repo.name, error = %cleanup, "Cache cleanup also failed");
                Err(e)
            }
        }
    }

    fn transfer_all(
        &mut self,
        repo: &RepositoryConfig,
        transfers: &[TagRecord],
        ledger: &mut Ledger,
    ) -> Result<()> {
        let total = transfers.len();
        for (index, record) in transfers.iter().enumerate() {
            self.interrupt.check()?;
            self.transfer_one(repo, record, index + 1, total, ledger)?;
            self.transferred += 1;
        }
        Ok(())
    }

    fn transfer_one(
        &mut self,
        repo: &RepositoryConfig,
        record: &TagRecord,
        number: usize,
        total: usize,
        ledger: &mut Ledger,
    ) -> Result<()> {
        let source = repo.source_image(&record.tag);
        let target = repo.target_image(&record.tag);
        let started = Instant::now();

        info!(tag = %record.tag, "({}/{}) {}:{}", number, total, repo.name, record.tag);
        info!(
            tag = %record.tag,
            digest = %record.digest,
            updated_at = %format_ledger(&record.updated_at),
            "Image update"
        );

        info!(image = %source, "Pull image");
        self.retry
            .run(&self.interrupt, "pull", || self.runtime.pull(&source))?;

        if let Err(e) = self.publish(&source, &target) {
            self.discard(&source, &target);
            return Err(e);
        }

        if let Err(e) = ledger.record(record.clone()) {
            self.discard_source(&source);
            return Err(e);
        }
        self.cache.admit(source, &self.runtime)?;

        info!(tag = %record.tag, elapsed = ?started.elapsed(), "Execution time");
        Ok(())
    }

    /// Tag the pulled image as `target`, push it, and drop the local target tag.
    fn publish(&self, source: &str, target: &str) -> Result<()> {
        self.interrupt.check()?;
        info!(image = %target, "Tag image");
        self.runtime.tag(source, target)?;

        info!(image = %target, "Push image");
        self.retry
            .run(&self.interrupt, "push", || self.push_once(target))?;

        self.runtime.remove_image(target)
    }

    fn push_once(&self, target: &str) -> Result<()> {
        let events = self.runtime.push(target, &self.auth)?;
        for event in events {
            self.interrupt.check()?;
            match event {
                PushEvent::Progress(line) => debug!(image = %target, "{}", line),
                PushEvent::Failure(message) => {
                    return Err(FerryError::Transfer(format!("push {}: {}", target, message)));
                }
                PushEvent::Done => return Ok(()),
            }
        }
        Err(FerryError::Transfer(format!(
            "push {}: output ended before completion",
            target
        )))
    }

    /// Best-effort removal of images left behind by a failed transfer.
    fn discard(&self, source: &str, target: &str) {
        if let Err(e) = self.runtime.remove_image(target) {
            debug!(image = %target, error = %e, "Target tag not removed");
        }
        self.discard_source(source);
    }

    /// Remove a pulled image the cache does not own.
    fn discard_source(&self, source: &str) {
        if self.cache.entries().any(|cached| cached == source) {
            return;
        }
        if let Err(e) = self.runtime.remove_image(source) {
            debug!(image = %source, error = %e, "Pulled image not removed");
        }
    }
}
