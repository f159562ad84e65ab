//! Inline suppression detection for nox findings.
//!
//! Developers can suppress specific rules by adding comments like:
//!
//! ```text
//! // nox:ignore SEC-001 -- false positive in test
//! # nox:ignore SEC-001,SEC-002
//! <!-- nox:ignore AI-001 -->
//! /* nox:ignore IAC-001 */
//! -- nox:ignore DEP-001 -- known issue expires:2025-12-31
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

/// A single inline suppression directive found in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suppression {
    pub rule_ids: Vec<String>,
    pub file_path: String,
    /// The 1-based line the suppression applies to.
    pub line: u32,
    pub reason: String,
    /// Expiry at UTC midnight of the `expires:YYYY-MM-DD` date, if present.
    pub expires: Option<DateTime<Utc>>,
}

impl Suppression {
    /// True if this suppression applies to the given rule and line,
    /// considering expiration against the supplied clock.
    pub fn matches_finding(&self, rule_id: &str, line: u32, now: DateTime<Utc>) -> bool {
        if self.line != line {
            return false;
        }
        if let Some(expires) = self.expires {
            if now > expires {
                return false;
            }
        }
        self.rule_ids.iter().any(|id| id == rule_id)
    }
}

const DIRECTIVE_PATTERN: &str =
    r"(?://|#|--|/\*|<!--)\s*nox:ignore\s+([\w-]+(?:,[\w-]+)*)\s*(?:--\s*(.*))?";

/// Scans file content for `nox:ignore` directives and returns all
/// suppressions found. Each suppression targets either the same line
/// (trailing comment) or the next non-blank, non-suppression line.
pub fn scan_for_suppressions(content: &str, file_path: &str) -> Vec<Suppression> {
    let directive_re = Regex::new(DIRECTIVE_PATTERN).unwrap();
    let expires_re = Regex::new(r"expires:(\d{4}-\d{2}-\d{2})").unwrap();

    let lines: Vec<&str> = content.lines().collect();
    let mut result = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let line_num = (i + 1) as u32;
        let Some(caps) = directive_re.captures(line) else {
            continue;
        };

        let rule_ids: Vec<String> = caps[1].split(',').map(str::to_string).collect();
        let mut reason = caps
            .get(2)
            .map(|m| m.as_str().trim())
            .unwrap_or_default()
            .to_string();

        // Strip closing comment markers from the reason.
        reason = reason
            .trim_end_matches("*/")
            .trim_end_matches("-->")
            .trim()
            .to_string();

        // Extract an expiry date from the reason. A token matching the shape
        // but failing calendar validation is dropped without an error.
        let mut expires = None;
        if let Some(em) = expires_re.captures(&reason) {
            if let Ok(date) = NaiveDate::parse_from_str(&em[1], "%Y-%m-%d") {
                expires = date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
            }
            reason = expires_re.replace_all(&reason, "").trim().to_string();
        }

        // A directive-only line applies to the next non-blank line; a
        // trailing comment applies to the same line.
        let target_line = if is_only_comment(line.trim()) {
            next_non_blank_line(&lines, i, &directive_re)
        } else {
            line_num
        };

        result.push(Suppression {
            rule_ids,
            file_path: file_path.to_string(),
            line: target_line,
            reason,
            expires,
        });
    }

    result
}

/// True if the line consists entirely of a comment.
fn is_only_comment(trimmed: &str) -> bool {
    ["//", "#", "--", "/*", "<!--"]
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
}

/// Returns the 1-based line number of the next non-blank line after index
/// `i`, skipping chained suppression-only comment lines. If none exists,
/// returns `i + 2` (the line immediately after the comment).
fn next_non_blank_line(lines: &[&str], i: usize, directive_re: &Regex) -> u32 {
    for (j, line) in lines.iter().enumerate().skip(i + 1) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_only_comment(trimmed) && directive_re.is_match(trimmed) {
            continue;
        }
        return (j + 1) as u32;
    }
    (i + 2) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn standalone_directive_targets_next_line() {
        let content = "// nox:ignore SEC-001 -- false positive\nvar secret = \"x\"\n";
        let sups = scan_for_suppressions(content, "main.go");
        assert_eq!(sups.len(), 1);
        assert_eq!(sups[0].rule_ids, vec!["SEC-001"]);
        assert_eq!(sups[0].line, 2);
        assert_eq!(sups[0].reason, "false positive");
    }

    #[test]
    fn trailing_directive_targets_same_line() {
        let content = "var x = 1 // nox:ignore SEC-001\n";
        let sups = scan_for_suppressions(content, "main.go");
        assert_eq!(sups.len(), 1);
        assert_eq!(sups[0].line, 1);
        assert!(sups[0].reason.is_empty());
    }

    #[test]
    fn multiple_rule_ids_split_on_comma() {
        let content = "# nox:ignore SEC-001,SEC-002,IAC-003\npassword: x\n";
        let sups = scan_for_suppressions(content, "config.yaml");
        assert_eq!(sups.len(), 1);
        assert_eq!(sups[0].rule_ids, vec!["SEC-001", "SEC-002", "IAC-003"]);
        assert_eq!(sups[0].line, 2);
    }

    #[test]
    fn all_comment_syntaxes_recognized() {
        for content in [
            "// nox:ignore SEC-001\ncode\n",
            "# nox:ignore SEC-001\ncode\n",
            "-- nox:ignore SEC-001\ncode\n",
            "/* nox:ignore SEC-001 */\ncode\n",
            "<!-- nox:ignore SEC-001 -->\ncode\n",
        ] {
            let sups = scan_for_suppressions(content, "f");
            assert_eq!(sups.len(), 1, "failed for: {content:?}");
            assert_eq!(sups[0].line, 2, "failed for: {content:?}");
        }
    }

    #[test]
    fn closing_markers_stripped_from_reason() {
        let sups = scan_for_suppressions("/* nox:ignore SEC-001 -- reviewed */\ncode\n", "f");
        assert_eq!(sups[0].reason, "reviewed");

        let sups = scan_for_suppressions("<!-- nox:ignore AI-001 -- html note -->\ncode\n", "f");
        assert_eq!(sups[0].reason, "html note");
    }

    #[test]
    fn skips_blank_and_chained_suppression_lines() {
        let content = "// nox:ignore SEC-001\n// nox:ignore SEC-002\n\nvar x = 1\n";
        let sups = scan_for_suppressions(content, "f");
        assert_eq!(sups.len(), 2);
        assert_eq!(sups[0].line, 4);
        assert_eq!(sups[1].line, 4);
    }

    #[test]
    fn directive_at_eof_targets_following_line_number() {
        let sups = scan_for_suppressions("// nox:ignore SEC-001\n", "f");
        assert_eq!(sups.len(), 1);
        assert_eq!(sups[0].line, 2);
    }

    #[test]
    fn expiry_parsed_and_stripped_from_reason() {
        let content = "-- nox:ignore DEP-001 -- temporary fix expires:2025-12-31\nselect 1\n";
        let sups = scan_for_suppressions(content, "query.sql");
        assert_eq!(sups.len(), 1);
        assert_eq!(sups[0].reason, "temporary fix");
        let expires = sups[0].expires.expect("expiry should be parsed");
        assert_eq!(
            expires,
            Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn expiry_governs_matching() {
        let content = "-- nox:ignore DEP-001 -- temporary fix expires:2025-12-31\nselect 1\n";
        let sup = &scan_for_suppressions(content, "query.sql")[0];

        let before = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(sup.matches_finding("DEP-001", 2, before));
        assert!(!sup.matches_finding("DEP-001", 2, after));
    }

    #[test]
    fn malformed_expiry_shape_is_left_in_reason() {
        let content = "// nox:ignore SEC-001 -- expires:soon\ncode\n";
        let sups = scan_for_suppressions(content, "f");
        assert!(sups[0].expires.is_none());
        assert_eq!(sups[0].reason, "expires:soon");
    }

    #[test]
    fn invalid_calendar_date_records_no_expiry() {
        let content = "// nox:ignore SEC-001 -- expires:2025-13-99\ncode\n";
        let sups = scan_for_suppressions(content, "f");
        assert!(sups[0].expires.is_none());
    }

    #[test]
    fn matches_finding_checks_rule_and_line() {
        let content = "var x = 1 // nox:ignore SEC-001,SEC-002\n";
        let sup = &scan_for_suppressions(content, "f")[0];
        let now = Utc::now();

        assert!(sup.matches_finding("SEC-001", 1, now));
        assert!(sup.matches_finding("SEC-002", 1, now));
        assert!(!sup.matches_finding("SEC-003", 1, now));
        assert!(!sup.matches_finding("SEC-001", 2, now));
    }

    #[test]
    fn no_directives_yields_empty() {
        assert!(scan_for_suppressions("fn main() {}\n// regular comment\n", "f").is_empty());
    }
}
