//! Analyzer interface consumed by the scan orchestrator.

pub mod secrets;

use crate::discovery::SourceFile;
use crate::findings::Finding;

/// A pattern-matching analyzer. Implementations examine one file at a time
/// and emit findings; the orchestrator owns merging, deduplication, and
/// reconciliation.
pub trait Analyzer {
    fn name(&self) -> &str;

    fn analyze(&self, file: &SourceFile) -> Vec<Finding>;
}
