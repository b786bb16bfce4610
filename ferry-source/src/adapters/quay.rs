//! quay-style listing: numbered pages of tags, each carrying its manifest digest.

use ferry_config::RepositoryConfig;
use ferry_core::error::Result;
use serde::Deserialize;

use super::{required_namespace, Page, TagSource};
use crate::fetch::JsonFetcher;
use crate::record::TagRecord;
use crate::timestamp::{epoch_zero, RawTimestamp};

#[derive(Debug, Deserialize)]
struct TagPage {
    tags: Vec<QuayTag>,
    #[serde(default)]
    has_additional: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct QuayTag {
    name: String,
    manifest_digest: String,
    #[serde(default)]
    start_ts: Option<RawTimestamp>,
}

impl Page for TagPage {
    type Item = QuayTag;

    fn into_items(self) -> (Vec<QuayTag>, bool) {
        (self.tags, self.has_additional.unwrap_or(true))
    }
}

pub(super) fn list<F: JsonFetcher>(
    source: &TagSource<F>,
    repo: &RepositoryConfig,
) -> Result<Vec<TagRecord>> {
    let namespace = required_namespace(repo)?;
    let page_size = source.options().page_size;
    let url_for_page = |page: u32| {
        format!(
            "https://{}/api/v1/repository/{}/{}/tag/?limit={}&page={}&onlyActiveTags=true",
            repo.domain, namespace, repo.name, page_size, page
        )
    };

    let tags = source.collect_pages::<TagPage, _>(url_for_page, std::time::Duration::ZERO)?;

    tags.into_iter()
        .map(|tag| {
            let updated_at = match tag.start_ts {
                Some(raw) => raw.normalize()?,
                None => epoch_zero(),
            };
            Ok(TagRecord::new(tag.name, tag.manifest_digest, updated_at))
        })
        .collect()
}
