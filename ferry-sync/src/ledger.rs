//! Per-repository history of synced tags.
//!
//! One text file per (domain, repository), newest first, one record per line:
//!
//! ```text
//! 2023-06-01 10:00:00\t\tsha256:abc...\t\t1.25
//! ```
//!
//! A tag appears at most once. The file is rewritten in full (via a temporary
//! file and rename) after every successful transfer.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ferry_core::error::{FerryError, Result};
use ferry_source::record::sort_newest_first;
use ferry_source::timestamp::{format_ledger, parse_ledger};
use ferry_source::TagRecord;
use tracing::debug;

pub const FIELD_DELIMITER: &str = "\t\t";

#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    records: Vec<TagRecord>,
}

impl Ledger {
    /// Location of the ledger for `name` mirrored from `domain`.
    pub fn path_for(dir: &Path, domain: &str, name: &str) -> PathBuf {
        dir.join(format!("{}__{}.txt", domain, name))
    }

    /// Load the ledger, treating a missing file as empty history.
    pub fn load(dir: &Path, domain: &str, name: &str) -> Result<Self> {
        Self::load_from_path(Self::path_for(dir, domain, name))
    }

    pub fn load_from_path(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No local history file");
            return Ok(Self {
                path,
                records: Vec::new(),
            });
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            FerryError::Ledger(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut records = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                parse_line(line).map_err(|e| {
                    FerryError::Ledger(format!("{}:{}: {}", path.display(), index + 1, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        sort_newest_first(&mut records);
        let mut seen = HashSet::new();
        records.retain(|record| seen.insert(record.tag.clone()));

        debug!(path = %path.display(), count = records.len(), "Loaded local history");
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[TagRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, tag: &str) -> Option<&TagRecord> {
        self.records.iter().find(|record| record.tag == tag)
    }

    /// Replace any entry for `record.tag` with `record` and persist the ledger.
    pub fn record(&mut self, record: TagRecord) -> Result<()> {
        self.records.retain(|existing| existing.tag != record.tag);
        self.records.push(record);
        sort_newest_first(&mut self.records);
        self.persist()
    }

    /// Atomically overwrite the ledger file with the current records.
    pub fn persist(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| {
            FerryError::Ledger(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let mut temp_file = tempfile::Builder::new()
            .prefix(".ledger-")
            .suffix(".tmp")
            .tempfile_in(&dir)?;
        for record in &self.records {
            writeln!(temp_file, "{}", format_line(record))?;
        }
        temp_file.as_file().sync_all()?;

        temp_file.persist(&self.path).map_err(|e| {
            FerryError::Ledger(format!(
                "Failed to move ledger into place at {}: {}",
                self.path.display(),
                e.error
            ))
        })?;

        debug!(path = %self.path.display(), count = self.records.len(), "Wrote local history");
        Ok(())
    }
}

pub fn format_line(record: &TagRecord) -> String {
    [
        format_ledger(&record.updated_at).as_str(),
        record.digest.as_str(),
        record.tag.as_str(),
    ]
    .join(FIELD_DELIMITER)
}

pub fn parse_line(line: &str) -> Result<TagRecord> {
    let fields: Vec<&str> = line.trim_end_matches('\r').split(FIELD_DELIMITER).collect();
    let [timestamp, digest, tag] = fields.as_slice() else {
        return Err(FerryError::Ledger(format!(
            "expected 3 fields, found {}",
            fields.len()
        )));
    };
    if tag.is_empty() {
        return Err(FerryError::Ledger("empty tag".to_string()));
    }
    Ok(TagRecord::new(*tag, *digest, parse_ledger(timestamp)?))
}
