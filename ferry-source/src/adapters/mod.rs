//! Per-registry tag listing.
//!
//! Each registry kind has its own module that turns upstream JSON into
//! [`TagRecord`]s; [`TagSource`] picks the module from the repository's
//! [`RegistryKind`] and applies the common ordering/dedup rules.

mod docker_hub;
mod gcr;
mod quay;

use std::time::Duration;

use ferry_config::{RegistryKind, RepositoryConfig};
use ferry_core::error::{FerryError, Result};
use ferry_core::Interrupt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::fetch::JsonFetcher;
use crate::record::{finalize, TagRecord};

#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Items requested per page from paginated APIs.
    pub page_size: u32,
    /// Hard stop for paginated APIs.
    pub max_pages: u32,
    /// Pause between Docker Hub page requests.
    pub hub_page_delay: Duration,
    /// Architecture whose digest represents a Docker Hub tag.
    pub architecture: String,
    /// Docker Hub images for this OS are skipped.
    pub excluded_os: String,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 100,
            hub_page_delay: Duration::from_secs(1),
            architecture: "amd64".to_string(),
            excluded_os: "windows".to_string(),
        }
    }
}

/// A page of a paginated tag API.
trait Page: DeserializeOwned {
    type Item;

    /// Items on this page, and whether the upstream says more pages follow.
    fn into_items(self) -> (Vec<Self::Item>, bool);
}

pub struct TagSource<F> {
    fetcher: F,
    options: SourceOptions,
    interrupt: Interrupt,
}

impl<F: JsonFetcher> TagSource<F> {
    pub fn new(fetcher: F, options: SourceOptions) -> Self {
        Self {
            fetcher,
            options,
            interrupt: Interrupt::new(),
        }
    }

    /// Make page delays wake up on interruption.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    /// List every tag of `repo`, newest first, without duplicate (tag, digest) pairs.
    pub fn list_tags(&self, repo: &RepositoryConfig) -> Result<Vec<TagRecord>> {
        info!(repo = %repo.name, source = %repo.domain, kind = %repo.kind, "Listing source tags");
        let records = match repo.kind {
            RegistryKind::ManifestIndexed => gcr::list(self, repo)?,
            RegistryKind::PageNumbered => quay::list(self, repo)?,
            RegistryKind::ArchFiltered => docker_hub::list(self, repo)?,
        };
        let records = finalize(records);
        debug!(repo = %repo.name, count = records.len(), "Source listing complete");
        Ok(records)
    }

    fn fetch<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.interrupt.check()?;
        decode(self.fetcher.get_json(url)?, url)
    }

    /// Request pages 1, 2, ... until one comes back empty or the upstream
    /// reports no further pages.
    fn collect_pages<P, U>(&self, url_for_page: U, delay: Duration) -> Result<Vec<P::Item>>
    where
        P: Page,
        U: Fn(u32) -> String,
    {
        let mut items = Vec::new();
        for page in 1..=self.options.max_pages {
            if page > 1 && !delay.is_zero() {
                self.interrupt.sleep(delay)?;
            }

            let (batch, more) = self.fetch::<P>(&url_for_page(page))?.into_items();
            if batch.is_empty() {
                info!(page, "Reached the last page");
                break;
            }
            info!(page, count = batch.len(), "Fetched tag page");
            items.extend(batch);

            if !more {
                break;
            }
        }
        Ok(items)
    }
}

fn decode<T: DeserializeOwned>(value: Value, url: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| FerryError::Source(format!("Unexpected response from {}: {}", url, e)))
}

fn required_namespace(repo: &RepositoryConfig) -> Result<&str> {
    repo.namespace.as_deref().ok_or_else(|| {
        FerryError::Config(format!(
            "{}: source '{}' needs a namespace segment",
            repo.name, repo.source_ref
        ))
    })
}
