//! gcr-style listing: one `tags/list` response whose `manifest` map is keyed
//! by digest. Only the first tag of each manifest is used.

use std::collections::BTreeMap;

use ferry_config::RepositoryConfig;
use ferry_core::error::Result;
use serde::Deserialize;

use super::TagSource;
use crate::fetch::JsonFetcher;
use crate::record::TagRecord;
use crate::timestamp::RawTimestamp;

#[derive(Debug, Deserialize)]
struct TagList {
    manifest: BTreeMap<String, ManifestInfo>,
}

#[derive(Debug, Deserialize)]
struct ManifestInfo {
    tag: Vec<String>,
    #[serde(rename = "timeUploadedMs")]
    time_uploaded_ms: RawTimestamp,
}

fn tags_url(repo: &RepositoryConfig) -> String {
    match &repo.namespace {
        Some(namespace) => format!(
            "https://{}/v2/{}/{}/tags/list",
            repo.domain, namespace, repo.name
        ),
        None => format!("https://{}/v2/{}/tags/list", repo.domain, repo.name),
    }
}

pub(super) fn list<F: JsonFetcher>(
    source: &TagSource<F>,
    repo: &RepositoryConfig,
) -> Result<Vec<TagRecord>> {
    let listing: TagList = source.fetch(&tags_url(repo))?;

    let mut records = Vec::with_capacity(listing.manifest.len());
    for (digest, info) in listing.manifest {
        let Some(tag) = info.tag.into_iter().next() else {
            continue;
        };
        records.push(TagRecord::new(tag, digest, info.time_uploaded_ms.normalize()?));
    }
    Ok(records)
}
