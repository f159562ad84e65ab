//! OpenVEX document parsing and application to findings.
//!
//! VEX (Vulnerability Exploitability eXchange) lets projects communicate the
//! real-world status of vulnerabilities in their products. When a VEX
//! document marks a CVE as `not_affected`, the corresponding finding's
//! status is updated so it no longer counts toward policy failures.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::findings::{Finding, FindingSet, Status as FindingStatus};

/// VEX status values per the OpenVEX specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotAffected,
    Affected,
    Fixed,
    UnderInvestigation,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NotAffected => "not_affected",
            Status::Affected => "affected",
            Status::Fixed => "fixed",
            Status::UnderInvestigation => "under_investigation",
        }
    }
}

/// A single VEX statement declaring the status of a vulnerability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    #[serde(rename = "vulnerability")]
    pub vulnerability_id: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_statement: Option<String>,
}

/// A simplified OpenVEX document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

/// Reads and parses a VEX document from the given path.
pub fn load_vex(path: &Path) -> Result<Document> {
    let data = std::fs::read(path)
        .with_context(|| format!("reading VEX document {}", path.display()))?;
    serde_json::from_slice(&data)
        .with_context(|| format!("parsing VEX document {}", path.display()))
}

/// Matches VEX statements to findings by vulnerability ID in the finding's
/// metadata and updates their status accordingly. Only dependency
/// vulnerability findings (`VULN-` rules) with a `vuln_id` or `aliases`
/// metadata key are eligible. Returns the number of findings updated.
///
/// An `affected` statement is deliberately a no-op: the finding stays active.
pub fn apply_vex(set: &mut FindingSet, doc: &Document) -> usize {
    if doc.statements.is_empty() {
        return 0;
    }

    let statements: HashMap<String, &Statement> = doc
        .statements
        .iter()
        .map(|s| (s.vulnerability_id.to_uppercase(), s))
        .collect();

    let mut applied = 0;
    let updates: Vec<(usize, FindingStatus)> = set
        .findings()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.rule_id.starts_with("VULN-"))
        .filter_map(|(i, f)| {
            // The first identifier with a statement wins; later aliases are
            // never consulted, so an `affected` statement on the primary ID
            // pins the finding active even if an alias says otherwise.
            let stmt = collect_vuln_ids(f)
                .into_iter()
                .find_map(|id| statements.get(&id.to_uppercase()))?;
            match stmt.status {
                Status::NotAffected => Some((i, FindingStatus::VexNotAffected)),
                Status::UnderInvestigation => Some((i, FindingStatus::VexUnderInvestigation)),
                Status::Fixed => Some((i, FindingStatus::VexFixed)),
                // Affected changes nothing about triage state.
                Status::Affected => None,
            }
        })
        .collect();

    for (i, status) in updates {
        set.set_status(i, status);
        applied += 1;
    }
    applied
}

/// A human-readable summary of the VEX document.
pub fn summary(doc: &Document) -> String {
    let mut counts: HashMap<Status, usize> = HashMap::new();
    for stmt in &doc.statements {
        *counts.entry(stmt.status).or_insert(0) += 1;
    }
    let mut parts: Vec<String> = counts
        .iter()
        .map(|(status, count)| format!("{count} {}", status.as_str()))
        .collect();
    parts.sort();
    format!(
        "VEX: {} statements ({})",
        doc.statements.len(),
        parts.join(", ")
    )
}

/// Extracts all vulnerability identifiers from a finding's metadata: the
/// primary `vuln_id` followed by the comma-separated `aliases` list.
fn collect_vuln_ids(f: &Finding) -> Vec<String> {
    let mut ids = Vec::new();
    if let Some(vuln_id) = f.metadata.get("vuln_id") {
        if !vuln_id.is_empty() {
            ids.push(vuln_id.clone());
        }
    }
    if let Some(aliases) = f.metadata.get("aliases") {
        for alias in aliases.split(',') {
            let alias = alias.trim();
            if !alias.is_empty() {
                ids.push(alias.to_string());
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{Confidence, Location, Severity};
    use std::collections::BTreeMap;

    fn vuln_finding(rule_id: &str, metadata: &[(&str, &str)]) -> Finding {
        Finding {
            rule_id: rule_id.to_string(),
            severity: Severity::High,
            confidence: Confidence::High,
            location: Location {
                file_path: "package-lock.json".to_string(),
                start_line: 1,
                ..Default::default()
            },
            message: "vulnerable dependency".to_string(),
            fingerprint: String::new(),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            status: FindingStatus::New,
        }
    }

    fn doc(statements: Vec<Statement>) -> Document {
        Document {
            statements,
            ..Default::default()
        }
    }

    fn stmt(id: &str, status: Status) -> Statement {
        Statement {
            vulnerability_id: id.to_string(),
            status,
            justification: None,
            impact_statement: None,
            action_statement: None,
        }
    }

    #[test]
    fn alias_match_sets_not_affected() {
        let mut set = FindingSet::new();
        set.add(vuln_finding("VULN-001", &[("aliases", "CVE-2024-1234")]));

        let applied = apply_vex(&mut set, &doc(vec![stmt("CVE-2024-1234", Status::NotAffected)]));
        assert_eq!(applied, 1);
        assert_eq!(set.findings()[0].status, FindingStatus::VexNotAffected);
    }

    #[test]
    fn non_vuln_rules_are_never_touched() {
        let mut set = FindingSet::new();
        set.add(vuln_finding("SEC-001", &[("vuln_id", "CVE-2024-1234")]));

        let applied = apply_vex(&mut set, &doc(vec![stmt("CVE-2024-1234", Status::NotAffected)]));
        assert_eq!(applied, 0);
        assert_eq!(set.findings()[0].status, FindingStatus::New);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut set = FindingSet::new();
        set.add(vuln_finding("VULN-001", &[("vuln_id", "cve-2024-1234")]));

        let applied = apply_vex(&mut set, &doc(vec![stmt("CVE-2024-1234", Status::Fixed)]));
        assert_eq!(applied, 1);
        assert_eq!(set.findings()[0].status, FindingStatus::VexFixed);
    }

    #[test]
    fn first_matching_identifier_wins() {
        let mut set = FindingSet::new();
        set.add(vuln_finding(
            "VULN-001",
            &[("vuln_id", "GHSA-xxxx"), ("aliases", "CVE-2024-1234, CVE-2024-5678")],
        ));

        let applied = apply_vex(
            &mut set,
            &doc(vec![
                stmt("GHSA-xxxx", Status::UnderInvestigation),
                stmt("CVE-2024-1234", Status::NotAffected),
            ]),
        );
        assert_eq!(applied, 1);
        assert_eq!(
            set.findings()[0].status,
            FindingStatus::VexUnderInvestigation
        );
    }

    #[test]
    fn affected_on_primary_id_shadows_alias_statements() {
        let mut set = FindingSet::new();
        set.add(vuln_finding(
            "VULN-001",
            &[("vuln_id", "CVE-2024-0001"), ("aliases", "GHSA-yyyy")],
        ));

        // The primary ID resolves to `affected`, which terminates the
        // candidate search: the alias's not_affected must not clear it.
        let applied = apply_vex(
            &mut set,
            &doc(vec![
                stmt("CVE-2024-0001", Status::Affected),
                stmt("GHSA-yyyy", Status::NotAffected),
            ]),
        );
        assert_eq!(applied, 0);
        assert_eq!(set.findings()[0].status, FindingStatus::New);
    }

    #[test]
    fn affected_status_is_a_no_op() {
        let mut set = FindingSet::new();
        set.add(vuln_finding("VULN-001", &[("vuln_id", "CVE-2024-1234")]));

        let applied = apply_vex(&mut set, &doc(vec![stmt("CVE-2024-1234", Status::Affected)]));
        assert_eq!(applied, 0);
        assert_eq!(set.findings()[0].status, FindingStatus::New);
        assert!(set.findings()[0].status.is_active());
    }

    #[test]
    fn empty_document_is_a_no_op() {
        let mut set = FindingSet::new();
        set.add(vuln_finding("VULN-001", &[("vuln_id", "CVE-2024-1234")]));
        assert_eq!(apply_vex(&mut set, &doc(vec![])), 0);
    }

    #[test]
    fn finding_without_vuln_metadata_is_skipped() {
        let mut set = FindingSet::new();
        set.add(vuln_finding("VULN-001", &[]));
        let applied = apply_vex(&mut set, &doc(vec![stmt("CVE-2024-1234", Status::Fixed)]));
        assert_eq!(applied, 0);
    }

    #[test]
    fn load_parses_openvex_subset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vex.json");
        std::fs::write(
            &path,
            r#"{
                "@context": "https://openvex.dev/ns/v0.2.0",
                "@id": "https://example.com/vex-1",
                "author": "security@example.com",
                "timestamp": "2025-01-01T00:00:00Z",
                "statements": [
                    {"vulnerability": "CVE-2024-1234", "status": "not_affected",
                     "justification": "vulnerable_code_not_present"}
                ]
            }"#,
        )
        .unwrap();

        let doc = load_vex(&path).unwrap();
        assert_eq!(doc.author.as_deref(), Some("security@example.com"));
        assert_eq!(doc.statements.len(), 1);
        assert_eq!(doc.statements[0].status, Status::NotAffected);
        assert_eq!(
            doc.statements[0].justification.as_deref(),
            Some("vulnerable_code_not_present")
        );
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let err = load_vex(Path::new("/nonexistent/vex.json")).unwrap_err();
        assert!(err.to_string().contains("reading VEX document"));
    }

    #[test]
    fn summary_counts_statements() {
        let d = doc(vec![
            stmt("CVE-1", Status::NotAffected),
            stmt("CVE-2", Status::NotAffected),
            stmt("CVE-3", Status::Fixed),
        ]);
        let s = summary(&d);
        assert!(s.contains("3 statements"));
        assert!(s.contains("2 not_affected"));
        assert!(s.contains("1 fixed"));
    }
}
