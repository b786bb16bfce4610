//! Docker Hub listing: numbered pages of tags, each with a list of
//! per-platform images. A tag yields one record per image of the wanted
//! architecture; images without a digest get [`UNKNOWN_DIGEST`].

use ferry_config::RepositoryConfig;
use ferry_core::error::Result;
use serde::Deserialize;

use super::{Page, TagSource};
use crate::fetch::JsonFetcher;
use crate::record::{TagRecord, UNKNOWN_DIGEST};
use crate::timestamp::{epoch_zero, RawTimestamp};

const API_HOST: &str = "hub.docker.com";
const DEFAULT_NAMESPACE: &str = "library";

#[derive(Debug, Deserialize)]
struct TagPage {
    results: Vec<HubTag>,
    /// Absent means "unknown"; an explicit `null` ends pagination.
    #[serde(default = "unknown_next")]
    next: Option<String>,
}

fn unknown_next() -> Option<String> {
    Some(String::new())
}

#[derive(Debug, Deserialize)]
struct HubTag {
    name: String,
    last_updated: Option<RawTimestamp>,
    images: Vec<HubImage>,
}

#[derive(Debug, Deserialize)]
struct HubImage {
    architecture: String,
    #[serde(default)]
    os: Option<String>,
    #[serde(default)]
    digest: Option<String>,
}

impl Page for TagPage {
    type Item = HubTag;

    fn into_items(self) -> (Vec<HubTag>, bool) {
        (self.results, self.next.is_some())
    }
}

pub(super) fn list<F: JsonFetcher>(
    source: &TagSource<F>,
    repo: &RepositoryConfig,
) -> Result<Vec<TagRecord>> {
    let options = source.options();
    let namespace = repo.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
    let url_for_page = |page: u32| {
        format!(
            "https://{}/v2/repositories/{}/{}/tags?page_size={}&page={}",
            API_HOST, namespace, repo.name, options.page_size, page
        )
    };

    let tags = source.collect_pages::<TagPage, _>(url_for_page, options.hub_page_delay)?;

    let mut records = Vec::new();
    for tag in tags {
        let updated_at = match &tag.last_updated {
            Some(raw) => raw.normalize()?,
            None => epoch_zero(),
        };
        for image in &tag.images {
            if image.architecture != options.architecture
                || image.os.as_deref() == Some(options.excluded_os.as_str())
            {
                continue;
            }
            let digest = image.digest.as_deref().unwrap_or(UNKNOWN_DIGEST);
            records.push(TagRecord::new(tag.name.clone(), digest, updated_at));
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::super::fake::*;
    use super::*;
    use ferry_core::FerryError;
    use serde_json::json;

    fn page_url(page: u32) -> String {
        format!(
            "https://hub.docker.com/v2/repositories/library/nginx/tags?page_size=100&page={}",
            page
        )
    }

    #[test]
    fn test_filters_architecture_and_os() {
        let fetcher = CannedFetcher::default()
            .with(
                &page_url(1),
                json!({
                    "next": "https://hub.docker.com/...page=2",
                    "results": [
                        {
                            "name": "1.25",
                            "last_updated": "2023-06-01T10:00:00.123456Z",
                            "images": [
                                {"architecture": "amd64", "os": "linux", "digest": "sha256:amd"},
                                {"architecture": "arm64", "os": "linux", "digest": "sha256:arm"},
                                {"architecture": "amd64", "os": "windows", "digest": "sha256:win"}
                            ]
                        },
                        {
                            "name": "1.24",
                            "last_updated": null,
                            "images": [{"architecture": "amd64", "os": "linux"}]
                        }
                    ]
                }),
            )
            .with(&page_url(2), json!({"next": null, "results": []}));
        let source = TagSource::new(&fetcher, options());

        let records = source
            .list_tags(&repo("nginx", "docker.io/library/"))
            .expect("listing should succeed");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tag, "1.25");
        assert_eq!(records[0].digest, "sha256:amd");
        assert_eq!(records[1].tag, "1.24");
        assert_eq!(records[1].digest, UNKNOWN_DIGEST);
        assert_eq!(records[1].updated_at, epoch_zero());
    }

    #[test]
    fn test_null_next_ends_pagination() {
        let fetcher = CannedFetcher::default().with(
            &page_url(1),
            json!({
                "next": null,
                "results": [{
                    "name": "latest",
                    "last_updated": "2023-06-01T10:00:00.000000Z",
                    "images": [{"architecture": "amd64", "os": "linux", "digest": "sha256:a"}]
                }]
            }),
        );
        let source = TagSource::new(&fetcher, options());

        source
            .list_tags(&repo("nginx", "docker.io/library/"))
            .expect("listing should succeed");
        assert_eq!(fetcher.requests.borrow().as_slice(), &[page_url(1)]);
    }

    #[test]
    fn test_missing_images_is_fatal() {
        let fetcher = CannedFetcher::default().with(
            &page_url(1),
            json!({"results": [{"name": "latest", "last_updated": null}]}),
        );
        let source = TagSource::new(&fetcher, options());

        let err = source
            .list_tags(&repo("nginx", "docker.io/library/"))
            .expect_err("missing images should fail");
        assert!(matches!(err, FerryError::Source(_)));
    }
}
