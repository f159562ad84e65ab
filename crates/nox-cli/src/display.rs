use chrono::{DateTime, Utc};
use colored::*;
use nox_core::baseline::Baseline;
use nox_core::findings::{Finding, Severity, Status};
use nox_core::scan::ScanResult;
use std::path::Path;

/// Print a full scan report to the terminal.
pub fn print_scan_report(result: &ScanResult) {
    println!();
    println!(
        "{}",
        format!(" nox v{} — Scan Results", env!("CARGO_PKG_VERSION")).bold()
    );
    println!();

    let findings = result.findings.findings();
    if findings.is_empty() {
        println!(" {} No findings. Clean scan!", "OK".green().bold());
        println!();
        return;
    }

    for finding in findings {
        print_finding(finding);
    }
    println!();

    println!(" {}", "=".repeat(60).dimmed());
    println!();
    println!(" {}", "Summary".bold().underline());

    for (status, count) in result.findings.count_by_status() {
        let label = match status {
            Status::New => "new".red().bold().to_string(),
            Status::Suppressed => "suppressed".dimmed().to_string(),
            Status::Baselined => "baselined".yellow().to_string(),
            Status::VexNotAffected => "vex: not affected".dimmed().to_string(),
            Status::VexUnderInvestigation => "vex: under investigation".yellow().to_string(),
            Status::VexFixed => "vex: fixed".dimmed().to_string(),
        };
        println!(" {} {count} {label}", "|-".dimmed());
    }
    if result.vex_applied > 0 {
        println!(
            " {} {} finding(s) reconciled via VEX",
            "|-".dimmed(),
            result.vex_applied
        );
    }

    if let Some(policy) = &result.policy {
        println!();
        for warning in &policy.warnings {
            println!(" {} {warning}", "WARN".yellow().bold());
        }
        let verdict = if policy.pass {
            policy.summary.green().to_string()
        } else {
            policy.summary.red().bold().to_string()
        };
        println!(" {verdict}");
    }
    println!();
}

/// Print findings discovered during a history walk, grouped with their
/// commit provenance.
pub fn print_history_report(result: &ScanResult) {
    println!();
    println!(
        "{}",
        format!(" nox v{} — History Scan", env!("CARGO_PKG_VERSION")).bold()
    );
    println!();

    let findings = result.findings.findings();
    if findings.is_empty() {
        println!(" {} No findings in commit history.", "OK".green().bold());
        println!();
        return;
    }

    for finding in findings {
        print_finding(finding);
        if let Some(sha) = finding.metadata.get("commit_sha") {
            let short = &sha[..sha.len().min(8)];
            let author = finding
                .metadata
                .get("commit_author")
                .map(String::as_str)
                .unwrap_or("unknown");
            let message = finding
                .metadata
                .get("commit_message")
                .map(String::as_str)
                .unwrap_or("");
            println!(
                "     {} {} by {} — {}",
                "commit".dimmed(),
                short.cyan(),
                author,
                message.dimmed()
            );
        }
    }
    println!();
    println!(
        " {} finding(s) across history. Rotate any real credentials: removing \
         them from the current tree does not remove them from git history.",
        findings.len().to_string().bold()
    );
    println!();
}

fn print_finding(finding: &Finding) {
    let severity_tag = match finding.severity {
        Severity::Critical => format!(" {} ", finding.severity.as_str().to_uppercase())
            .on_red()
            .white()
            .bold()
            .to_string(),
        Severity::High => format!(" {} ", finding.severity.as_str().to_uppercase())
            .on_yellow()
            .black()
            .bold()
            .to_string(),
        Severity::Medium => format!(" {} ", finding.severity.as_str().to_uppercase())
            .yellow()
            .to_string(),
        _ => format!(" {} ", finding.severity.as_str()).dimmed().to_string(),
    };

    let status_note = match finding.status {
        Status::New => String::new(),
        other => format!(" [{}]", other.as_str()).dimmed().to_string(),
    };

    println!(
        " {severity_tag} {} {}:{} — {}{status_note}",
        finding.rule_id.bold(),
        finding.location.file_path,
        finding.location.start_line,
        finding.message
    );
}

pub fn print_baseline_created(path: &Path, count: usize) {
    println!(
        " {} Baseline written to {} ({} entr{})",
        "OK".green().bold(),
        path.display(),
        count,
        if count == 1 { "y" } else { "ies" }
    );
}

pub fn print_baseline_pruned(path: &Path, removed: usize, remaining: usize) {
    println!(
        " {} Pruned {} stale entr{} from {} ({} remaining)",
        "OK".green().bold(),
        removed,
        if removed == 1 { "y" } else { "ies" },
        path.display(),
        remaining
    );
}

pub fn print_baseline(path: &Path, baseline: &Baseline, now: DateTime<Utc>) {
    println!();
    println!(" {}", format!("Baseline: {}", path.display()).bold());
    println!(
        " {} schema {}, {} entr{}",
        "|-".dimmed(),
        baseline.schema_version,
        baseline.len(),
        if baseline.len() == 1 { "y" } else { "ies" }
    );

    let expired = baseline.expired_count(now);
    if expired > 0 {
        println!(
            " {} {} entr{} expired",
            "|-".dimmed(),
            expired.to_string().yellow().bold(),
            if expired == 1 { "y has" } else { "ies have" }
        );
    }
    println!();

    for entry in &baseline.entries {
        let expiry = match entry.expires_at {
            Some(at) if now > at => format!(" (expired {})", at.format("%Y-%m-%d"))
                .red()
                .to_string(),
            Some(at) => format!(" (until {})", at.format("%Y-%m-%d"))
                .dimmed()
                .to_string(),
            None => String::new(),
        };
        println!(
            " {} {} {} {}{}",
            "|-".dimmed(),
            entry.rule_id.bold(),
            entry.file_path,
            &entry.fingerprint[..entry.fingerprint.len().min(12)].dimmed(),
            expiry
        );
        if let Some(reason) = &entry.reason {
            println!("      {}", reason.dimmed());
        }
    }
    println!();
}
