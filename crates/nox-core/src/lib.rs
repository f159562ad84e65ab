pub mod analyzers;
pub mod baseline;
pub mod config;
pub mod discovery;
pub mod findings;
pub mod git;
pub mod policy;
pub mod scan;
pub mod suppress;
pub mod vex;

pub use discovery::{discover_files, SourceFile};
pub use findings::{Confidence, Finding, FindingSet, Location, Severity, Status};
pub use git::{walk_history, CommitInfo, HistoryDiff, WalkHistoryOptions};
pub use policy::{BaselineMode, PolicyConfig, PolicyResult};
pub use scan::{run_diff_scan, run_history_scan, run_scan, ScanOptions, ScanResult};
