//! Commit-history traversal for historical secret discovery.
//!
//! Enumerates commits oldest-first with `git rev-list --reverse`, diffs each
//! commit against its parent, and hands full file contents to a callback.
//! Supports incremental walks via an exclusive `since` bookmark.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

use super::{run_git, run_git_bytes, split_lines, GitError};

/// Metadata for a single commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub author: String,
    pub email: String,
    pub date: DateTime<Utc>,
    pub message: String,
}

/// A single file change in a commit, with the full file content as it
/// existed at that commit.
#[derive(Debug, Clone)]
pub struct HistoryDiff {
    pub commit: CommitInfo,
    pub file_path: String,
    pub content: Vec<u8>,
}

/// Configures history traversal.
#[derive(Debug, Clone, Default)]
pub struct WalkHistoryOptions {
    /// Maximum commits to traverse, counted from the oldest.
    pub max_depth: Option<usize>,
    /// Branch to walk (default: HEAD).
    pub branch: Option<String>,
    /// Bookmark commit SHA: only commits reachable from the branch but not
    /// from this SHA are walked (exclusive), enabling incremental re-scans.
    pub since: Option<String>,
}

/// Traverses git history oldest-first and calls `callback` for each
/// added/copied/modified/renamed, non-binary file. Unreadable blobs
/// (submodules etc.) are skipped. An error from the callback aborts the
/// walk and is returned verbatim.
pub fn walk_history<F>(repo_root: &Path, opts: &WalkHistoryOptions, mut callback: F) -> Result<()>
where
    F: FnMut(HistoryDiff) -> Result<()>,
{
    let shas = list_commits(repo_root, opts).context("walk history: list commits")?;

    for sha in &shas {
        let info = commit_info(repo_root, sha)
            .with_context(|| format!("walk history: commit info {sha}"))?;

        let files = changed_files_for_commit(repo_root, sha)
            .with_context(|| format!("walk history: changed files {sha}"))?;

        for path in files {
            let Ok(content) = file_at_commit(repo_root, sha, &path) else {
                // Not a readable blob (submodule etc.); skip.
                continue;
            };

            // Binary content is out of scope for pattern scanning.
            if content.contains(&0) {
                continue;
            }

            callback(HistoryDiff {
                commit: info.clone(),
                file_path: path,
                content,
            })?;
        }
    }

    Ok(())
}

/// Commit SHAs in chronological order (oldest first). With `since`, only
/// commits reachable from the branch but not from the bookmark are listed.
/// An unknown revision (empty or unborn branch) yields an empty list.
fn list_commits(repo_root: &Path, opts: &WalkHistoryOptions) -> Result<Vec<String>, GitError> {
    let branch = opts.branch.as_deref().unwrap_or("HEAD");

    let mut args = vec!["rev-list", "--reverse", branch];
    let exclude;
    if let Some(since) = &opts.since {
        exclude = format!("^{since}");
        args.push(&exclude);
    }

    let out = match run_git(repo_root, &args) {
        Ok(out) => out,
        Err(GitError::UnknownRevision { .. }) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut shas = split_lines(&out);
    if let Some(max_depth) = opts.max_depth {
        shas.truncate(max_depth);
    }
    Ok(shas)
}

/// Retrieves metadata for a single commit via a formatted query. The record
/// separator byte cannot appear in commit subjects, so splitting is safe.
fn commit_info(repo_root: &Path, sha: &str) -> Result<CommitInfo> {
    const DELIM: char = '\x1e';
    let format = format!("--format=%H{DELIM}%an{DELIM}%ae{DELIM}%at{DELIM}%s");

    let out = run_git(repo_root, &["log", "-1", &format, sha])?;
    let trimmed = out.trim();
    let parts: Vec<&str> = trimmed.splitn(5, DELIM).collect();
    if parts.len() < 5 {
        anyhow::bail!("unexpected git log output: {trimmed:?}");
    }

    let ts: i64 = parts[3]
        .parse()
        .with_context(|| format!("parsing commit timestamp {:?}", parts[3]))?;
    let date = DateTime::<Utc>::from_timestamp(ts, 0)
        .with_context(|| format!("commit timestamp {ts} out of range"))?;

    Ok(CommitInfo {
        sha: parts[0].to_string(),
        author: parts[1].to_string(),
        email: parts[2].to_string(),
        date,
        message: parts[4].to_string(),
    })
}

/// Files added, copied, modified, or renamed in a commit (deletions
/// excluded). A root commit produces no output without `--root`, so retry
/// against the empty tree in that case.
fn changed_files_for_commit(repo_root: &Path, sha: &str) -> Result<Vec<String>, GitError> {
    let base_args = ["diff-tree", "--no-commit-id", "-r", "--diff-filter=ACMR", "-z"];

    let mut args: Vec<&str> = base_args.to_vec();
    args.push(sha);
    let mut out = run_git(repo_root, &args)?;

    if out.trim().is_empty() {
        let mut root_args = vec!["diff-tree", "--root"];
        root_args.extend(&base_args[1..]);
        root_args.push(sha);
        out = run_git(repo_root, &root_args)?;
    }

    Ok(parse_null_separated_paths(&out))
}

/// Extracts file paths from `git diff-tree -z` output, which interleaves
/// `:mode mode hash hash status` metadata records with path records.
fn parse_null_separated_paths(raw: &str) -> Vec<String> {
    let parts: Vec<&str> = raw.split('\0').collect();
    let mut paths = Vec::new();

    let mut i = 0;
    while i < parts.len() {
        let part = parts[i];
        if part.starts_with(':') {
            if let Some(path) = parts.get(i + 1).filter(|p| !p.is_empty()) {
                paths.push(path.to_string());
                i += 1;
            }
        }
        i += 1;
    }
    paths
}

/// Full content of a file at a specific commit.
fn file_at_commit(repo_root: &Path, sha: &str, path: &str) -> Result<Vec<u8>, GitError> {
    let spec = format!("{sha}:{path}");
    run_git_bytes(repo_root, &["show", &spec])
}
