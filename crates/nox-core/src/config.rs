//! Project-level configuration loaded from `nox.toml` at the scan root.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::findings::Severity;
use crate::policy::PolicyConfig;

/// Top-level `nox.toml` configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub policy: PolicySettings,
}

/// Controls which files are scanned and how rules behave.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Glob patterns excluded from scanning (e.g., ["vendor/**", "*.lock"]).
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub rules: RulesConfig,
    /// Conditional severity overrides scoped by rule and path patterns.
    #[serde(default)]
    pub conditional_severity: Vec<ConditionalSeverity>,
}

/// Disables rules or overrides their severity globally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub disable: Vec<String>,
    #[serde(default)]
    pub severity_override: HashMap<String, Severity>,
}

/// Severity override applied when both a rule pattern and a path pattern
/// match (e.g., downgrade all VULN-* findings in node_modules to info).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalSeverity {
    pub rules: Vec<String>,
    pub paths: Vec<String>,
    pub severity: Severity,
}

/// Pass/fail thresholds and baseline/VEX locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySettings {
    #[serde(default)]
    pub fail_on: Option<Severity>,
    #[serde(default)]
    pub warn_on: Option<Severity>,
    #[serde(default)]
    pub baseline_mode: Option<crate::policy::BaselineMode>,
    #[serde(default)]
    pub baseline_path: Option<String>,
    #[serde(default)]
    pub vex_path: Option<String>,
}

impl PolicySettings {
    /// True if any policy knob is set; an all-default block means "no policy
    /// evaluation requested".
    pub fn is_configured(&self) -> bool {
        self.fail_on.is_some() || self.warn_on.is_some() || self.baseline_mode.is_some()
    }

    pub fn to_policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            fail_on: self.fail_on,
            warn_on: self.warn_on,
            baseline_mode: self.baseline_mode.unwrap_or_default(),
        }
    }
}

/// Reads `nox.toml` from `root`. A missing file yields the default config
/// with no error.
pub fn load_scan_config(root: &Path) -> Result<ScanConfig> {
    let path = root.join("nox.toml");

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ScanConfig::default()),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };

    toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}
