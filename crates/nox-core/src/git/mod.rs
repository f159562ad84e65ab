//! Git operations via subprocess for diff, staged, and history workflows.
//!
//! Everything shells out to the `git` binary; no protocol logic lives here.
//! Errors are classified so callers can treat an unknown revision (empty or
//! unborn history) differently from a real subprocess failure.

pub mod history;

pub use history::{walk_history, CommitInfo, HistoryDiff, WalkHistoryOptions};

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Failure modes for git subprocess invocations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The revision does not exist: unborn branch, empty repository, or a
    /// bad ref. Callers walking history treat this as "no commits".
    #[error("unknown revision: git {args}")]
    UnknownRevision { args: String },

    #[error("git {args}: {stderr}")]
    CommandFailed { args: String, stderr: String },

    #[error("running git {args}: {source}")]
    Io {
        args: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected git output: {output:?}")]
    UnexpectedOutput { output: String },
}

/// Returns true if `path` is inside a git repository.
pub fn is_git_repo(path: &Path) -> bool {
    Command::new("git")
        .args(["-C"])
        .arg(path)
        .args(["rev-parse", "--is-inside-work-tree"])
        .output()
        .map(|out| out.status.success() && String::from_utf8_lossy(&out.stdout).trim() == "true")
        .unwrap_or(false)
}

/// Returns the top-level directory of the git repository containing `path`.
pub fn repo_root(path: &Path) -> Result<PathBuf, GitError> {
    let out = run_git(path, &["rev-parse", "--show-toplevel"])?;
    Ok(PathBuf::from(out.trim()))
}

/// Returns the current branch name.
pub fn current_branch(repo_root: &Path) -> Result<String, GitError> {
    let out = run_git(repo_root, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(out.trim().to_string())
}

/// Returns the files changed between `base` and `head`.
pub fn changed_files(repo_root: &Path, base: &str, head: &str) -> Result<Vec<String>, GitError> {
    let range = format!("{base}...{head}");
    let out = run_git(repo_root, &["diff", "--name-only", &range])?;
    Ok(split_lines(&out))
}

/// Returns the best common ancestor between two refs.
pub fn merge_base(repo_root: &Path, ref1: &str, ref2: &str) -> Result<String, GitError> {
    let out = run_git(repo_root, &["merge-base", ref1, ref2])?;
    Ok(out.trim().to_string())
}

/// Returns staged file paths (added, copied, modified, renamed) relative to
/// the repository root. Only index entries differing from HEAD are listed,
/// which is exactly what will be committed.
pub fn staged_files(repo_root: &Path) -> Result<Vec<String>, GitError> {
    let out = run_git(
        repo_root,
        &["diff", "--cached", "--name-only", "--diff-filter=ACMR"],
    )?;
    Ok(split_lines(&out))
}

/// Returns the staged (index) version of a file, so pre-commit hooks scan
/// exactly what will be committed rather than the working tree.
pub fn staged_content(repo_root: &Path, path: &str) -> Result<Vec<u8>, GitError> {
    let spec = format!(":{path}");
    run_git_bytes(repo_root, &["show", &spec])
}

pub(crate) fn run_git(dir: &Path, args: &[&str]) -> Result<String, GitError> {
    let out = run_git_bytes(dir, args)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

pub(crate) fn run_git_bytes(dir: &Path, args: &[&str]) -> Result<Vec<u8>, GitError> {
    let joined = args.join(" ");
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|source| GitError::Io {
            args: joined.clone(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("unknown revision") || stderr.contains("bad default revision") {
            return Err(GitError::UnknownRevision { args: joined });
        }
        return Err(GitError::CommandFailed {
            args: joined,
            stderr,
        });
    }

    Ok(output.stdout)
}

pub(crate) fn split_lines(s: &str) -> Vec<String> {
    s.trim()
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
