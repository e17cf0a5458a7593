//! Preview and statistics reports.

use super::operation::{OperationKind, OperationResult};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// What the manager would do for one intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedOperation {
    pub kind: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Destination after conflict resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    /// Whether the call would leave the filesystem untouched.
    pub no_op: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts_resolved: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Dry-run report over a batch of intents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewReport {
    pub total_operations: usize,
    pub operations_by_type: BTreeMap<OperationKind, usize>,
    /// Destinations that are already occupied.
    pub potential_conflicts: Vec<String>,
    /// Intents that would fail validation.
    pub safety_warnings: Vec<String>,
    /// Intents that would go ahead, with resolved destinations.
    pub planned: Vec<PlannedOperation>,
}

impl PreviewReport {
    /// Whether every intent would pass validation.
    pub fn is_clean(&self) -> bool {
        self.safety_warnings.is_empty()
    }

    /// Print summary.
    pub fn print_summary(&self) {
        println!("{}", "[Preview]".bold().cyan());
        println!("  {} {}", "Operations:".bold(), self.total_operations);
        for (kind, count) in &self.operations_by_type {
            println!("    {:<12} {}", kind.to_string(), count);
        }

        if !self.planned.is_empty() {
            println!();
            for op in &self.planned {
                let target = match (&op.source, &op.destination) {
                    (Some(src), Some(dst)) => format!("{} -> {}", src.display(), dst.display()),
                    (Some(src), None) => src.display().to_string(),
                    (None, Some(dst)) => dst.display().to_string(),
                    (None, None) => String::new(),
                };
                let tag = if op.no_op { " (no change)".dimmed().to_string() } else { String::new() };
                println!("  {} {} {}{}", "[DRY RUN]".yellow(), op.kind, target, tag);
            }
        }

        if !self.potential_conflicts.is_empty() {
            println!();
            println!("{}", "[CONFLICTS]".bold().yellow());
            for conflict in &self.potential_conflicts {
                println!("  - {}", conflict);
            }
        }

        if !self.safety_warnings.is_empty() {
            println!();
            println!("{}", "[UNSAFE]".bold().red());
            for warning in &self.safety_warnings {
                println!("  - {}", warning);
            }
        }
    }
}

/// Aggregate counters over the session history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    pub total_operations: usize,
    pub successful_operations: usize,
    pub success_rate: f64,
    pub operations_by_type: BTreeMap<OperationKind, usize>,
    /// Operations recorded during the last hour.
    pub recent_operations: usize,
}

impl OperationStats {
    /// Print summary.
    pub fn print_summary(&self) {
        println!("{}", "[Session Stats]".bold().green());
        println!("  {} {}", "Recorded operations:".bold(), self.total_operations);
        println!("  {} {}", "Executed:".bold(), self.successful_operations);
        println!("  {} {}", "Last hour:".bold(), self.recent_operations);
        for (kind, count) in &self.operations_by_type {
            println!("    {:<12} {}", kind.to_string(), count);
        }
    }
}

/// Result of executing a batch of intents.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Per-intent results, in submission order.
    pub results: Vec<std::result::Result<OperationResult, crate::Error>>,
    /// Whether execution stopped at the first failure.
    pub stopped_early: bool,
}

impl BatchOutcome {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count()
    }

    pub fn is_success(&self) -> bool {
        self.error_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_report_default_is_clean() {
        let report = PreviewReport::default();
        assert!(report.is_clean());
        assert_eq!(report.total_operations, 0);
    }

    #[test]
    fn test_batch_outcome_counts() {
        let outcome = BatchOutcome {
            results: vec![
                Ok(OperationResult::ok(OperationKind::CreateDir, "created")),
                Err(crate::Error::other("boom")),
            ],
            stopped_early: true,
        };
        assert_eq!(outcome.success_count(), 1);
        assert_eq!(outcome.error_count(), 1);
        assert!(!outcome.is_success());
    }
}
