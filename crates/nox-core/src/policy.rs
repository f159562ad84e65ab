//! Policy evaluation: turns a reconciled finding set into a pass/fail/warn
//! decision for CI gating. Evaluation never errors; with no threshold
//! configured, any new finding fails (zero-tolerance default).

use serde::{Deserialize, Serialize};

use crate::findings::{Finding, Severity, Status};

/// Controls how baselined findings affect policy evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineMode {
    /// Baselined findings count toward failure.
    Strict,
    /// Baselined findings produce warnings only.
    Warn,
    /// Baselined findings are ignored entirely.
    #[default]
    Off,
}

/// Policy evaluation parameters, typically loaded from project config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub fail_on: Option<Severity>,
    #[serde(default)]
    pub warn_on: Option<Severity>,
    #[serde(default)]
    pub baseline_mode: BaselineMode,
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone)]
pub struct PolicyResult {
    pub pass: bool,
    pub exit_code: i32,
    pub new: Vec<Finding>,
    pub baselined: Vec<Finding>,
    pub warnings: Vec<String>,
    pub summary: String,
}

/// Applies policy rules to the given findings and returns the result.
pub fn evaluate(cfg: &PolicyConfig, all: &[Finding]) -> PolicyResult {
    let mut new = Vec::new();
    let mut baselined = Vec::new();
    for f in all {
        if f.status == Status::Baselined {
            baselined.push(f.clone());
        } else {
            new.push(f.clone());
        }
    }

    let mut pass = true;

    // New findings against the fail threshold.
    match cfg.fail_on {
        Some(threshold) => {
            if let Some(max_new) = max_severity(&new) {
                if meets_threshold(max_new, threshold) {
                    pass = false;
                }
            }
        }
        None => {
            if !new.is_empty() {
                pass = false;
            }
        }
    }

    let mut warnings = Vec::new();

    // Baselined findings per mode.
    match cfg.baseline_mode {
        BaselineMode::Strict => match cfg.fail_on {
            Some(threshold) => {
                if let Some(max_baselined) = max_severity(&baselined) {
                    if meets_threshold(max_baselined, threshold) {
                        pass = false;
                    }
                }
            }
            None => {
                if !baselined.is_empty() {
                    pass = false;
                }
            }
        },
        BaselineMode::Warn => {
            if !baselined.is_empty() {
                warnings.push(format!(
                    "{} baselined finding(s) still present",
                    baselined.len()
                ));
            }
        }
        BaselineMode::Off => {}
    }

    // Warn band: meets warn_on but not fail_on, so the bands are disjoint.
    if let Some(warn_on) = cfg.warn_on {
        for f in &new {
            let fails = cfg
                .fail_on
                .is_some_and(|fail_on| meets_threshold(f.severity, fail_on));
            if meets_threshold(f.severity, warn_on) && !fails {
                warnings.push(format!(
                    "warning: {} finding {} in {}",
                    f.severity, f.rule_id, f.location.file_path
                ));
            }
        }
    }

    let mut parts = vec![format!("{} new", new.len())];
    if !baselined.is_empty() {
        parts.push(format!("{} baselined", baselined.len()));
    }
    let verdict = if pass { "pass" } else { "fail" };
    let summary = format!("policy: {verdict} ({})", parts.join(", "));

    PolicyResult {
        pass,
        exit_code: if pass { 0 } else { 1 },
        new,
        baselined,
        warnings,
        summary,
    }
}

/// True if `severity` is at or above `threshold` (lower rank = more severe).
pub fn meets_threshold(severity: Severity, threshold: Severity) -> bool {
    severity.rank() <= threshold.rank()
}

fn max_severity(findings: &[Finding]) -> Option<Severity> {
    findings.iter().map(|f| f.severity).min_by_key(|s| s.rank())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{Confidence, Location};
    use std::collections::BTreeMap;

    fn finding(severity: Severity, status: Status) -> Finding {
        Finding {
            rule_id: "SEC-001".to_string(),
            severity,
            confidence: Confidence::High,
            location: Location {
                file_path: "main.go".to_string(),
                start_line: 1,
                ..Default::default()
            },
            message: "msg".to_string(),
            fingerprint: "fp".to_string(),
            metadata: BTreeMap::new(),
            status,
        }
    }

    #[test]
    fn fail_on_high_fails_for_critical() {
        let cfg = PolicyConfig {
            fail_on: Some(Severity::High),
            ..Default::default()
        };
        let result = evaluate(&cfg, &[finding(Severity::Critical, Status::New)]);
        assert!(!result.pass);
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn fail_on_high_passes_for_medium() {
        let cfg = PolicyConfig {
            fail_on: Some(Severity::High),
            ..Default::default()
        };
        let result = evaluate(&cfg, &[finding(Severity::Medium, Status::New)]);
        assert!(result.pass);
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn no_findings_passes() {
        let result = evaluate(&PolicyConfig::default(), &[]);
        assert!(result.pass);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.summary, "policy: pass (0 new)");
    }

    #[test]
    fn no_threshold_means_any_new_finding_fails() {
        let result = evaluate(&PolicyConfig::default(), &[finding(Severity::Info, Status::New)]);
        assert!(!result.pass);
    }

    #[test]
    fn baseline_off_ignores_baselined() {
        let result = evaluate(
            &PolicyConfig::default(),
            &[finding(Severity::Critical, Status::Baselined)],
        );
        assert!(result.pass);
        assert_eq!(result.baselined.len(), 1);
        assert!(result.new.is_empty());
    }

    #[test]
    fn baseline_strict_folds_into_fail_check() {
        let cfg = PolicyConfig {
            fail_on: Some(Severity::High),
            baseline_mode: BaselineMode::Strict,
            ..Default::default()
        };
        let result = evaluate(&cfg, &[finding(Severity::Critical, Status::Baselined)]);
        assert!(!result.pass);

        // Below threshold, strict baselined findings still pass.
        let result = evaluate(&cfg, &[finding(Severity::Low, Status::Baselined)]);
        assert!(result.pass);
    }

    #[test]
    fn baseline_strict_without_threshold_fails_on_any() {
        let cfg = PolicyConfig {
            baseline_mode: BaselineMode::Strict,
            ..Default::default()
        };
        let result = evaluate(&cfg, &[finding(Severity::Info, Status::Baselined)]);
        assert!(!result.pass);
    }

    #[test]
    fn baseline_warn_never_fails_but_warns() {
        let cfg = PolicyConfig {
            fail_on: Some(Severity::Critical),
            baseline_mode: BaselineMode::Warn,
            ..Default::default()
        };
        let result = evaluate(&cfg, &[finding(Severity::Critical, Status::Baselined)]);
        assert!(result.pass);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("1 baselined finding"));
    }

    #[test]
    fn warn_band_is_disjoint_from_fail_band() {
        let cfg = PolicyConfig {
            fail_on: Some(Severity::High),
            warn_on: Some(Severity::Medium),
            ..Default::default()
        };
        let result = evaluate(
            &cfg,
            &[
                finding(Severity::Critical, Status::New),
                finding(Severity::Medium, Status::New),
            ],
        );
        assert!(!result.pass);
        // Only the medium finding warns; the critical one is in the fail band.
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("medium"));
    }

    #[test]
    fn summary_reports_counts_and_verdict() {
        let cfg = PolicyConfig {
            fail_on: Some(Severity::Critical),
            ..Default::default()
        };
        let result = evaluate(
            &cfg,
            &[
                finding(Severity::Low, Status::New),
                finding(Severity::High, Status::Baselined),
            ],
        );
        assert!(result.pass);
        assert_eq!(result.summary, "policy: pass (1 new, 1 baselined)");
    }

    #[test]
    fn threshold_comparison_uses_rank() {
        assert!(meets_threshold(Severity::Critical, Severity::High));
        assert!(meets_threshold(Severity::High, Severity::High));
        assert!(!meets_threshold(Severity::Medium, Severity::High));
    }
}
