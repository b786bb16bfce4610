use std::path::Path;

use ferry_core::error::{FerryError, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, info};

/// Repository name → sync settings, in file order.
pub type Items = IndexMap<String, ItemSpec>;

/// One entry of the items file.
///
/// ```yaml
/// coredns:
///   source: k8s.gcr.io/
///   target: registry.example.com/mirror/
///   tag:
///     limit: 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemSpec {
    pub source: String,
    pub target: String,
    pub tag: TagPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagPolicy {
    /// Keep only the most recent `limit` tags.
    pub limit: usize,
    /// Extra substrings; tags containing any of them are never synced.
    #[serde(default)]
    pub exclude: Vec<String>,
}

pub fn load_items(path: &Path) -> Result<Items> {
    info!(path = %path.display(), "Loading items file");
    let contents = std::fs::read_to_string(path).map_err(|e| {
        FerryError::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_items(&contents)
}

pub fn parse_items(contents: &str) -> Result<Items> {
    // An empty document deserializes to unit, not to an empty map.
    if contents.trim().is_empty() {
        return Ok(Items::new());
    }
    let items: Items = serde_yaml_ng::from_str(contents)
        .map_err(|e| FerryError::Config(format!("Invalid items file: {}", e)))?;
    debug!(count = items.len(), "Parsed items file");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
coredns:
  source: k8s.gcr.io/
  target: registry.example.com/mirror/
  tag:
    limit: 10
prometheus:
  source: quay.io/prometheus/
  target: registry.example.com/mirror/
  tag:
    limit: 5
    exclude: ["-rc"]
nginx:
  source: docker.io/library/
  target: registry.example.com/mirror/
  tag:
    limit: 3
"#;

    #[test]
    fn test_parse_items_preserves_file_order() {
        let items = parse_items(SAMPLE).expect("should parse sample");
        let names: Vec<&str> = items.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["coredns", "prometheus", "nginx"]);
        assert_eq!(items["coredns"].tag.limit, 10);
        assert!(items["coredns"].tag.exclude.is_empty());
        assert_eq!(items["prometheus"].tag.exclude, vec!["-rc".to_string()]);
    }

    #[test]
    fn test_parse_items_rejects_missing_limit() {
        let yaml = "coredns:\n  source: k8s.gcr.io/\n  target: r.example.com/\n  tag: {}\n";
        let err = parse_items(yaml).expect_err("missing limit should fail");
        assert!(matches!(err, FerryError::Config(_)));
    }

    #[test]
    fn test_empty_file_has_no_items() {
        assert!(parse_items("  \n").expect("should parse").is_empty());
    }

    #[test]
    fn test_load_items_from_disk() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let path = temp_dir.path().join("items.yml");
        fs::write(&path, SAMPLE).expect("should write items");

        let items = load_items(&path).expect("should load items");
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_load_items_missing_file_is_config_error() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let err = load_items(&temp_dir.path().join("nope.yml")).expect_err("should fail");
        assert!(matches!(err, FerryError::Config(_)));
    }
}
