mod display;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use nox_core::analyzers::secrets::SecretsAnalyzer;
use nox_core::analyzers::Analyzer;
use nox_core::baseline::{self, Baseline};
use nox_core::config::{load_scan_config, ScanConfig};
use nox_core::findings::Severity;
use nox_core::policy::{BaselineMode, PolicyConfig};
use nox_core::scan::{self, ScanOptions, ScanResult};
use nox_core::{discover_files, git, WalkHistoryOptions};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "nox",
    version,
    about = "nox — static security scanner with baseline and VEX support",
    long_about = "Scan source trees for secrets and vulnerabilities, track accepted findings in a baseline, reconcile against VEX documents, and gate CI on policy."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory tree and evaluate policy
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Scan staged (index) file contents instead of the working tree
        #[arg(long)]
        staged: bool,

        /// Restrict findings to files changed since this ref
        #[arg(long, value_name = "REF")]
        diff_base: Option<String>,

        /// Baseline file (default: .nox/baseline.json under the scan root)
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// OpenVEX document to reconcile vulnerability findings against
        #[arg(long)]
        vex: Option<PathBuf>,

        /// Fail when a new finding at or above this severity exists
        #[arg(long, value_name = "SEVERITY")]
        fail_on: Option<Severity>,

        /// Warn for findings at or above this severity (below fail-on)
        #[arg(long, value_name = "SEVERITY")]
        warn_on: Option<Severity>,

        /// How baselined findings count: strict, warn, or off
        #[arg(long, value_name = "MODE")]
        baseline_mode: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Manage the accepted-findings baseline
    Baseline {
        #[command(subcommand)]
        command: BaselineCommands,
    },

    /// Replay the scan across commit history
    History {
        /// Repository to walk
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Maximum commits to traverse, counted from the oldest
        #[arg(long)]
        max_depth: Option<usize>,

        /// Branch to walk (default: HEAD)
        #[arg(long)]
        branch: Option<String>,

        /// Only walk commits after this SHA (exclusive)
        #[arg(long, value_name = "SHA")]
        since: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum BaselineCommands {
    /// Snapshot current findings into the baseline file
    Create {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Baseline file to write
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show baseline entries and expiry state
    Show {
        /// Directory containing the baseline
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Baseline file to read
        #[arg(long)]
        baseline: Option<PathBuf>,
    },

    /// Drop baseline entries no longer matched by any current finding
    Prune {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Baseline file to rewrite
        #[arg(long)]
        baseline: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            path,
            staged,
            diff_base,
            baseline,
            vex,
            fail_on,
            warn_on,
            baseline_mode,
            format,
        } => cmd_scan(
            &path,
            staged,
            diff_base.as_deref(),
            baseline,
            vex,
            fail_on,
            warn_on,
            baseline_mode.as_deref(),
            &format,
        ),
        Commands::Baseline { command } => match command {
            BaselineCommands::Create { path, output } => cmd_baseline_create(&path, output),
            BaselineCommands::Show { path, baseline } => cmd_baseline_show(&path, baseline),
            BaselineCommands::Prune { path, baseline } => cmd_baseline_prune(&path, baseline),
        },
        Commands::History {
            path,
            max_depth,
            branch,
            since,
            format,
        } => cmd_history(&path, max_depth, branch, since, &format),
    }
}

fn parse_baseline_mode(s: &str) -> Result<BaselineMode> {
    match s {
        "strict" => Ok(BaselineMode::Strict),
        "warn" => Ok(BaselineMode::Warn),
        "off" => Ok(BaselineMode::Off),
        other => anyhow::bail!("unknown baseline mode '{other}' (expected strict, warn, or off)"),
    }
}

/// Policy from config, with CLI flags taking precedence.
fn resolve_policy(
    cfg: &ScanConfig,
    fail_on: Option<Severity>,
    warn_on: Option<Severity>,
    baseline_mode: Option<&str>,
) -> Result<PolicyConfig> {
    let mut policy = cfg.policy.to_policy_config();
    if fail_on.is_some() {
        policy.fail_on = fail_on;
    }
    if warn_on.is_some() {
        policy.warn_on = warn_on;
    }
    if let Some(mode) = baseline_mode {
        policy.baseline_mode = parse_baseline_mode(mode)?;
    }
    Ok(policy)
}

fn resolve_baseline_path(root: &Path, flag: Option<PathBuf>, cfg: &ScanConfig) -> PathBuf {
    flag.or_else(|| cfg.policy.baseline_path.as_ref().map(|p| root.join(p)))
        .unwrap_or_else(|| baseline::default_path(root))
}

fn scan_files(root: &Path, staged: bool, cfg: &ScanConfig) -> Result<Vec<nox_core::SourceFile>> {
    if staged {
        let repo = git::repo_root(root).context("locating git repository")?;
        scan::staged_source_files(&repo)
    } else {
        discover_files(root, &cfg.scan.exclude)
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_scan(
    path: &Path,
    staged: bool,
    diff_base: Option<&str>,
    baseline_flag: Option<PathBuf>,
    vex_flag: Option<PathBuf>,
    fail_on: Option<Severity>,
    warn_on: Option<Severity>,
    baseline_mode: Option<&str>,
    format: &str,
) -> Result<()> {
    let cfg = load_scan_config(path)?;
    let files = scan_files(path, staged, &cfg)?;

    let mut opts = ScanOptions::new(Utc::now());
    opts.baseline_path = Some(resolve_baseline_path(path, baseline_flag, &cfg));
    opts.vex_path = vex_flag.or_else(|| cfg.policy.vex_path.as_ref().map(|p| path.join(p)));
    opts.policy = Some(resolve_policy(&cfg, fail_on, warn_on, baseline_mode)?);

    let analyzer = SecretsAnalyzer::new();
    let analyzers: Vec<&dyn Analyzer> = vec![&analyzer];

    let result = match diff_base {
        Some(base) => {
            let repo = git::repo_root(path).context("locating git repository")?;
            let changed: HashSet<String> = git::changed_files(&repo, base, "HEAD")
                .with_context(|| format!("diffing against {base}"))?
                .into_iter()
                .collect();
            scan::run_diff_scan(&files, &analyzers, &cfg, &opts, &changed)?
        }
        None => scan::run_scan(&files, &analyzers, &cfg, &opts)?,
    };

    emit_scan_result(&result, format)?;

    if let Some(policy) = &result.policy {
        if !policy.pass {
            std::process::exit(policy.exit_code);
        }
    }
    Ok(())
}

fn emit_scan_result(result: &ScanResult, format: &str) -> Result<()> {
    match format {
        "json" => {
            let json = serde_json::to_string_pretty(result.findings.findings())?;
            println!("{json}");
        }
        _ => display::print_scan_report(result),
    }
    Ok(())
}

/// Runs the pipeline without a baseline so every surviving finding is
/// captured, then snapshots them into the baseline file.
fn cmd_baseline_create(path: &Path, output: Option<PathBuf>) -> Result<()> {
    let cfg = load_scan_config(path)?;
    let files = discover_files(path, &cfg.scan.exclude)?;
    let now = Utc::now();

    let analyzer = SecretsAnalyzer::new();
    let analyzers: Vec<&dyn Analyzer> = vec![&analyzer];
    let result = scan::run_scan(&files, &analyzers, &cfg, &ScanOptions::new(now))?;

    let baseline_path = resolve_baseline_path(path, output, &cfg);
    let mut b = Baseline::new();
    // Suppressed findings stay out: the inline directive already covers them.
    for entry in baseline::from_findings(&result.findings.active_findings(), now) {
        b.add(entry);
    }
    b.save(&baseline_path)
        .with_context(|| format!("writing baseline {}", baseline_path.display()))?;

    display::print_baseline_created(&baseline_path, b.len());
    Ok(())
}

fn cmd_baseline_show(path: &Path, baseline_flag: Option<PathBuf>) -> Result<()> {
    let cfg = load_scan_config(path)?;
    let baseline_path = resolve_baseline_path(path, baseline_flag, &cfg);
    let b = Baseline::load(&baseline_path)?;
    display::print_baseline(&baseline_path, &b, Utc::now());
    Ok(())
}

fn cmd_baseline_prune(path: &Path, baseline_flag: Option<PathBuf>) -> Result<()> {
    let cfg = load_scan_config(path)?;
    let files = discover_files(path, &cfg.scan.exclude)?;

    let analyzer = SecretsAnalyzer::new();
    let analyzers: Vec<&dyn Analyzer> = vec![&analyzer];
    let result = scan::run_scan(&files, &analyzers, &cfg, &ScanOptions::new(Utc::now()))?;

    let baseline_path = resolve_baseline_path(path, baseline_flag, &cfg);
    let mut b = Baseline::load(&baseline_path)?;
    let removed = b.prune(result.findings.findings());
    b.save(&baseline_path)?;

    display::print_baseline_pruned(&baseline_path, removed, b.len());
    Ok(())
}

fn cmd_history(
    path: &Path,
    max_depth: Option<usize>,
    branch: Option<String>,
    since: Option<String>,
    format: &str,
) -> Result<()> {
    let repo = git::repo_root(path).context("locating git repository")?;
    let cfg = load_scan_config(&repo)?;

    let analyzer = SecretsAnalyzer::new();
    let analyzers: Vec<&dyn Analyzer> = vec![&analyzer];
    let walk_opts = WalkHistoryOptions {
        max_depth,
        branch,
        since,
    };

    let result = scan::run_history_scan(
        &repo,
        &analyzers,
        &cfg,
        &ScanOptions::new(Utc::now()),
        &walk_opts,
    )?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(result.findings.findings())?;
            println!("{json}");
        }
        _ => display::print_history_report(&result),
    }
    Ok(())
}
