//! Finding baseline management for tracking accepted findings that should
//! not trigger CI failures. Baselines are stored as JSON files with
//! fingerprint-based O(1) lookup.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::findings::{Finding, Severity};

const SCHEMA_VERSION: &str = "1.0.0";

/// A single baselined finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub fingerprint: String,
    pub rule_id: String,
    pub file_path: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A set of baselined finding entries with fast fingerprint lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Baseline {
    pub schema_version: String,
    pub entries: Vec<Entry>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Baseline {
    pub fn new() -> Self {
        Baseline {
            schema_version: SCHEMA_VERSION.to_string(),
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Reads a baseline file from `path`. A missing file yields an empty
    /// baseline with no error.
    pub fn load(path: &Path) -> Result<Baseline> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Baseline::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading baseline {}", path.display()))
            }
        };

        let mut baseline: Baseline = serde_json::from_slice(&data)
            .with_context(|| format!("parsing baseline {}", path.display()))?;
        baseline.build_index();
        Ok(baseline)
    }

    /// Writes the baseline to `path` using a temp file in the same directory
    /// followed by an atomic rename. Parent directories are created as
    /// needed; on failure the temp file is removed.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.schema_version = SCHEMA_VERSION.to_string();

        let mut data =
            serde_json::to_vec_pretty(self).context("serializing baseline")?;
        data.push(b'\n');

        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating baseline directory {}", dir.display()))?;
        }

        let dir = dir.unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::Builder::new()
            .prefix(".baseline-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        tmp.write_all(&data).context("writing temp baseline file")?;
        // persist() renames atomically; on error the temp file is dropped
        // and removed.
        tmp.persist(path)
            .with_context(|| format!("renaming baseline file to {}", path.display()))?;
        Ok(())
    }

    /// Returns the matching baseline entry for a finding, or `None`. Entries
    /// whose `expires_at` is in the past relative to `now` do not match, so
    /// the finding reappears as new.
    pub fn match_finding(&self, finding: &Finding, now: DateTime<Utc>) -> Option<&Entry> {
        let entry = self
            .index
            .get(&finding.fingerprint)
            .and_then(|&i| self.entries.get(i))?;
        if let Some(expires_at) = entry.expires_at {
            if now > expires_at {
                return None;
            }
        }
        Some(entry)
    }

    /// Appends an entry and updates the index.
    pub fn add(&mut self, entry: Entry) {
        self.index
            .insert(entry.fingerprint.clone(), self.entries.len());
        self.entries.push(entry);
    }

    /// Removes entries whose fingerprints are absent from the current
    /// findings (stale or resolved). Returns the number removed.
    pub fn prune(&mut self, current: &[Finding]) -> usize {
        let active: std::collections::HashSet<&str> =
            current.iter().map(|f| f.fingerprint.as_str()).collect();

        let before = self.entries.len();
        self.entries
            .retain(|e| active.contains(e.fingerprint.as_str()));
        self.build_index();
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries whose `expires_at` is in the past.
    pub fn expired_count(&self, now: DateTime<Utc>) -> usize {
        self.entries
            .iter()
            .filter(|e| e.expires_at.is_some_and(|exp| now > exp))
            .count()
    }

    fn build_index(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.fingerprint.clone(), i))
            .collect();
    }
}

/// The conventional baseline file location within a project.
pub fn default_path(root: &Path) -> PathBuf {
    root.join(".nox").join("baseline.json")
}

/// Creates baseline entries from a snapshot of findings, stamped with the
/// given creation time.
pub fn from_findings(findings: &[Finding], now: DateTime<Utc>) -> Vec<Entry> {
    findings
        .iter()
        .map(|f| Entry {
            fingerprint: f.fingerprint.clone(),
            rule_id: f.rule_id.clone(),
            file_path: f.location.file_path.clone(),
            severity: f.severity,
            reason: None,
            owner: None,
            created_at: now,
            expires_at: None,
        })
        .collect()
}
