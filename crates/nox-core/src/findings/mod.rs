//! Canonical finding model shared by every analyzer and pipeline stage.
//!
//! Analyzers produce [`Finding`] values which are collected into a
//! [`FindingSet`] for deduplication, deterministic ordering, and status
//! reconciliation (suppressions, baseline, VEX) before policy evaluation.

pub mod fingerprint;

pub use fingerprint::compute_fingerprint;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Severity of a finding, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Numeric rank used for threshold comparisons. Lower = more severe.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// How certain the analyzer is that the finding is a true positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Disposition of a finding relative to suppressions, the baseline, and VEX.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    New,
    Suppressed,
    Baselined,
    VexNotAffected,
    VexUnderInvestigation,
    VexFixed,
}

impl Status {
    /// True if the finding should still be reported: not suppressed,
    /// baselined, or excluded via VEX. `under_investigation` stays active.
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            Status::Suppressed | Status::Baselined | Status::VexNotAffected | Status::VexFixed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::New => "new",
            Status::Suppressed => "suppressed",
            Status::Baselined => "baselined",
            Status::VexNotAffected => "vex_not_affected",
            Status::VexUnderInvestigation => "vex_under_investigation",
            Status::VexFixed => "vex_fixed",
        }
    }
}

/// Where a finding was detected within a source file. Maps directly to the
/// SARIF physicalLocation / region model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
}

/// A single security observation produced by an analyzer. Immutable after
/// creation except for `status`, which the reconciliation stages update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    pub confidence: Confidence,
    pub location: Location,
    pub message: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub status: Status,
}

/// Ordered, deduplicated collection of findings. The primary data structure
/// passed between pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct FindingSet {
    items: Vec<Finding>,
}

impl FindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a finding. If the fingerprint is empty, one is computed from
    /// the rule ID, location, and message so every member is addressable.
    pub fn add(&mut self, mut finding: Finding) {
        if finding.fingerprint.is_empty() {
            finding.fingerprint =
                compute_fingerprint(&finding.rule_id, &finding.location, &finding.message);
        }
        self.items.push(finding);
    }

    /// Removes findings sharing a fingerprint, keeping the first occurrence
    /// in insertion order.
    pub fn deduplicate(&mut self) {
        let mut seen = HashSet::with_capacity(self.items.len());
        self.items.retain(|f| seen.insert(f.fingerprint.clone()));
    }

    /// Orders findings by rule ID, then file path, then start line. Guarantees
    /// stable, reproducible output regardless of analyzer emission order.
    pub fn sort_deterministic(&mut self) {
        self.items.sort_by(|a, b| {
            a.rule_id
                .cmp(&b.rule_id)
                .then_with(|| a.location.file_path.cmp(&b.location.file_path))
                .then_with(|| a.location.start_line.cmp(&b.location.start_line))
        });
    }

    /// Removes all findings whose rule ID matches any of the given IDs.
    pub fn remove_by_rule_ids(&mut self, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        let disabled: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.items.retain(|f| !disabled.contains(f.rule_id.as_str()));
    }

    /// Removes findings matching both the given rule IDs AND any of the given
    /// path patterns, enabling granular exclusions such as disabling VULN
    /// rules only under node_modules.
    pub fn remove_by_rule_ids_and_paths(&mut self, rule_ids: &[String], paths: &[String]) {
        if rule_ids.is_empty() && paths.is_empty() {
            return;
        }
        let rule_set: HashSet<&str> = rule_ids.iter().map(String::as_str).collect();
        self.items.retain(|f| {
            let rule_hit = !rule_ids.is_empty() && rule_set.contains(f.rule_id.as_str());
            let path_hit = !paths.is_empty() && matches_any_pattern(&f.location.file_path, paths);
            // Drop only when both dimensions match.
            !(rule_hit && path_hit)
        });
    }

    /// Changes the severity for all findings with the given rule ID.
    pub fn override_severity(&mut self, rule_id: &str, severity: Severity) {
        for f in &mut self.items {
            if f.rule_id == rule_id {
                f.severity = severity;
            }
        }
    }

    /// Changes the severity of findings matching any of the given rule
    /// patterns (wildcard support) AND any of the given path patterns.
    pub fn override_severity_by_rule_patterns_and_paths(
        &mut self,
        rule_patterns: &[String],
        path_patterns: &[String],
        severity: Severity,
    ) {
        for f in &mut self.items {
            if matches_rule_patterns(&f.rule_id, rule_patterns)
                && matches_any_pattern(&f.location.file_path, path_patterns)
            {
                f.severity = severity;
            }
        }
    }

    /// Sets the status of the finding at the given index. Out-of-range
    /// indexes are ignored.
    pub fn set_status(&mut self, index: usize, status: Status) {
        if let Some(f) = self.items.get_mut(index) {
            f.status = status;
        }
    }

    /// Counts findings grouped by status.
    pub fn count_by_status(&self) -> BTreeMap<Status, usize> {
        let mut counts = BTreeMap::new();
        for f in &self.items {
            *counts.entry(f.status).or_insert(0) += 1;
        }
        counts
    }

    /// Returns clones of findings that are still reportable.
    pub fn active_findings(&self) -> Vec<Finding> {
        self.items
            .iter()
            .filter(|f| f.status.is_active())
            .cloned()
            .collect()
    }

    pub fn findings(&self) -> &[Finding] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// True if the path matches any of the glob-style patterns. Patterns are
/// tried against the full path, the basename, and path segments so that both
/// `*.lock` and `node_modules/**` behave as users expect.
pub(crate) fn matches_any_pattern(path: &str, patterns: &[String]) -> bool {
    for pattern in patterns {
        if let Ok(p) = glob::Pattern::new(pattern) {
            if p.matches(path) {
                return true;
            }
            if let Some(base) = path.rsplit('/').next() {
                if p.matches(base) {
                    return true;
                }
            }
        }
        if let Some(rest) = pattern.strip_prefix('*') {
            if path.ends_with(rest) {
                return true;
            }
        }
        if matches_path_segments(path, pattern) {
            return true;
        }
    }
    false
}

/// Segment-wise match: each pattern component must match the corresponding
/// path component, with `*` and `**` matching anything. The pattern may be a
/// prefix of the path.
fn matches_path_segments(path: &str, pattern: &str) -> bool {
    let path_parts: Vec<&str> = path.split('/').collect();
    let pattern_parts: Vec<&str> = pattern.split('/').collect();

    if pattern_parts.len() > path_parts.len() {
        return false;
    }

    for (i, part) in pattern_parts.iter().enumerate() {
        if *part == "*" || *part == "**" {
            continue;
        }
        match glob::Pattern::new(part) {
            Ok(p) if p.matches(path_parts[i]) => {}
            _ => return false,
        }
    }
    true
}

/// Rule ID wildcard matching: exact, `PREFIX*`, or `*MID*`.
fn matches_rule_patterns(rule_id: &str, patterns: &[String]) -> bool {
    for pattern in patterns {
        if rule_id == pattern {
            return true;
        }
        if let Some(stripped) = pattern.strip_prefix('*') {
            if let Some(mid) = stripped.strip_suffix('*') {
                if rule_id.contains(mid) {
                    return true;
                }
            }
        }
        if let Some(prefix) = pattern.strip_suffix('*') {
            if !prefix.is_empty() && rule_id.starts_with(prefix) {
                return true;
            }
        }
    }
    false
}
