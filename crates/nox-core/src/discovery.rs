//! Scan-target discovery: enumerates candidate files under a root.

use anyhow::Result;
use std::path::Path;

use crate::findings::matches_any_pattern;

/// Directories never worth scanning.
const SKIP_DIRS: &[&str] = &[".git", ".nox", "node_modules", "target", "dist", "vendor"];

/// A file handed to analyzers: repo-relative path plus raw content.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the scan root, with `/` separators.
    pub path: String,
    pub content: Vec<u8>,
}

/// Recursively collects scannable files under `root`, skipping well-known
/// build/VCS directories, binary files, and anything matching `excludes`.
/// Results are sorted by path for reproducible scans.
pub fn discover_files(root: &Path, excludes: &[String]) -> Result<Vec<SourceFile>> {
    if !root.exists() {
        anyhow::bail!("path '{}' does not exist", root.display());
    }
    if !root.is_dir() {
        anyhow::bail!("'{}' is not a directory", root.display());
    }

    let mut files = Vec::new();
    walk(root, root, excludes, &mut files)?;
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn walk(root: &Path, dir: &Path, excludes: &[String], out: &mut Vec<SourceFile>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if path.is_dir() {
            if SKIP_DIRS.contains(&name.as_ref()) {
                continue;
            }
            walk(root, &path, excludes, out)?;
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace(std::path::MAIN_SEPARATOR, "/");

        if matches_any_pattern(&rel, excludes) {
            continue;
        }

        // Unreadable entries (dangling symlinks etc.) are skipped, not fatal.
        let Ok(content) = std::fs::read(&path) else {
            continue;
        };
        if content.contains(&0) {
            continue;
        }

        out.push(SourceFile { path: rel, content });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_text_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "bbb").unwrap();
        std::fs::write(dir.path().join("a.txt"), "aaa").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/c.txt"), "ccc").unwrap();

        let files = discover_files(dir.path(), &[]).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt", "sub/c.txt"]);
    }

    #[test]
    fn skips_vcs_dirs_and_binaries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config"), "x").unwrap();
        std::fs::write(dir.path().join("blob.bin"), [0u8, 1, 2]).unwrap();
        std::fs::write(dir.path().join("code.rs"), "fn main() {}").unwrap();

        let files = discover_files(dir.path(), &[]).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["code.rs"]);
    }

    #[test]
    fn honors_exclude_patterns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.rs"), "x").unwrap();
        std::fs::write(dir.path().join("drop.lock"), "x").unwrap();

        let files = discover_files(dir.path(), &["*.lock".to_string()]).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["keep.rs"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(discover_files(Path::new("/definitely/not/here"), &[]).is_err());
    }
}
