use std::fmt;

use ferry_core::error::{FerryError, Result};

use crate::items::ItemSpec;

/// Tags containing any of these are built for Windows hosts and never synced.
pub const PLATFORM_EXCLUSIONS: &[&str] = &["windowsservercore", "nanoserver"];

/// Shape of the upstream tag API, chosen once from the source host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    /// gcr-style: one `tags/list` response indexed by manifest digest.
    ManifestIndexed,
    /// quay-style: numbered pages of tags with a manifest digest each.
    PageNumbered,
    /// Docker Hub-style: numbered pages of tags with per-architecture images.
    ArchFiltered,
}

impl RegistryKind {
    /// Hosts are matched by substring, most specific first.
    const HOSTS: &'static [(&'static str, RegistryKind)] = &[
        ("quay.io", RegistryKind::PageNumbered),
        ("docker.io", RegistryKind::ArchFiltered),
        ("registry.k8s.io", RegistryKind::ManifestIndexed),
        ("gcr.io", RegistryKind::ManifestIndexed),
    ];

    pub fn detect(domain: &str) -> Option<Self> {
        Self::HOSTS
            .iter()
            .find(|(host, _)| domain.contains(host))
            .map(|(_, kind)| *kind)
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistryKind::ManifestIndexed => "manifest-indexed",
            RegistryKind::PageNumbered => "page-numbered",
            RegistryKind::ArchFiltered => "arch-filtered",
        };
        f.write_str(name)
    }
}

/// A repository to mirror, resolved from its items-file entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub name: String,
    pub source_ref: String,
    pub target_ref: String,
    pub tag_limit: usize,
    pub exclude: Vec<String>,
    /// Registry host of the source.
    pub domain: String,
    /// Path segment preceding the repository name, if any.
    pub namespace: Option<String>,
    pub kind: RegistryKind,
}

impl RepositoryConfig {
    pub fn resolve(name: &str, spec: &ItemSpec) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(FerryError::Config("Repository name cannot be empty".to_string()));
        }

        let source_ref = normalize_ref(&spec.source);
        let target_ref = normalize_ref(&spec.target);
        if source_ref.is_empty() {
            return Err(FerryError::Config(format!("{}: source is empty", name)));
        }
        if target_ref.is_empty() {
            return Err(FerryError::Config(format!("{}: target is empty", name)));
        }

        let mut segments = source_ref.split('/');
        let domain = segments.next().unwrap_or_default().to_string();
        let namespace = segments.last().map(str::to_string);

        let kind = RegistryKind::detect(&domain).ok_or_else(|| {
            FerryError::Config(format!(
                "{}: unsupported sync source '{}'",
                name, spec.source
            ))
        })?;

        Ok(Self {
            name: name.to_string(),
            source_ref,
            target_ref,
            tag_limit: spec.tag.limit,
            exclude: spec.tag.exclude.clone(),
            domain,
            namespace,
            kind,
        })
    }

    /// Fully-qualified source image reference for `tag`.
    pub fn source_image(&self, tag: &str) -> String {
        format!("{}/{}:{}", self.source_ref, self.name, tag)
    }

    /// Fully-qualified target image reference for `tag`.
    pub fn target_image(&self, tag: &str) -> String {
        format!("{}/{}:{}", self.target_ref, self.name, tag)
    }

    /// Registry host pushes go to.
    pub fn target_registry(&self) -> &str {
        self.target_ref.split('/').next().unwrap_or(&self.target_ref)
    }

    /// Whether `tag` is excluded by the platform denylist or the per-repo list.
    pub fn is_excluded(&self, tag: &str) -> bool {
        PLATFORM_EXCLUSIONS.iter().any(|marker| tag.contains(marker))
            || self.exclude.iter().any(|marker| tag.contains(marker.as_str()))
    }
}

fn normalize_ref(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::TagPolicy;

    fn spec(source: &str) -> ItemSpec {
        ItemSpec {
            source: source.to_string(),
            target: "registry.example.com/mirror/".to_string(),
            tag: TagPolicy {
                limit: 5,
                exclude: vec![],
            },
        }
    }

    #[test]
    fn test_resolve_single_segment_source_has_no_namespace() {
        let repo = RepositoryConfig::resolve("coredns", &spec("k8s.gcr.io/")).expect("should resolve");
        assert_eq!(repo.domain, "k8s.gcr.io");
        assert_eq!(repo.namespace, None);
        assert_eq!(repo.kind, RegistryKind::ManifestIndexed);
    }

    #[test]
    fn test_resolve_namespaced_sources() {
        let quay = RepositoryConfig::resolve("etcd", &spec("quay.io/coreos/")).expect("should resolve");
        assert_eq!(quay.domain, "quay.io");
        assert_eq!(quay.namespace.as_deref(), Some("coreos"));
        assert_eq!(quay.kind, RegistryKind::PageNumbered);

        let hub = RepositoryConfig::resolve("nginx", &spec("docker.io/library")).expect("should resolve");
        assert_eq!(hub.namespace.as_deref(), Some("library"));
        assert_eq!(hub.kind, RegistryKind::ArchFiltered);
    }

    #[test]
    fn test_resolve_rejects_unknown_host() {
        let err = RepositoryConfig::resolve("app", &spec("ghcr.io/acme/")).expect_err("should fail");
        assert!(matches!(err, FerryError::Config(msg) if msg.contains("unsupported")));
    }

    #[test]
    fn test_image_references() {
        let repo = RepositoryConfig::resolve("etcd", &spec("quay.io/coreos/")).expect("should resolve");
        assert_eq!(repo.source_image("v3.5.0"), "quay.io/coreos/etcd:v3.5.0");
        assert_eq!(repo.target_image("v3.5.0"), "registry.example.com/mirror/etcd:v3.5.0");
        assert_eq!(repo.target_registry(), "registry.example.com");
    }

    #[test]
    fn test_exclusions_cover_platform_and_repo_markers() {
        let mut item = spec("docker.io/library/");
        item.tag.exclude = vec!["-rc".to_string()];
        let repo = RepositoryConfig::resolve("golang", &item).expect("should resolve");

        assert!(repo.is_excluded("1.21-nanoserver"));
        assert!(repo.is_excluded("1.21-windowsservercore-ltsc2022"));
        assert!(repo.is_excluded("1.22-rc1"));
        assert!(!repo.is_excluded("1.21-alpine"));
    }
}
