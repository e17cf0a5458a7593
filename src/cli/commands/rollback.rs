//! Rollback command implementation.
//!
//! Reads a journal file and reverses its operations to restore the original
//! state.

use crate::core::journal;
use crate::core::rollback::{check_conflicts, describe_rollback, RollbackStatus};
use crate::core::FileOperationManager;
use crate::{Error, Result};
use colored::Colorize;
use indicatif::ProgressBar;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Roll back a journal.
pub async fn rollback(manager: &mut FileOperationManager, journal_file: &Path, dry_run: bool) -> Result<()> {
    println!("{}", "[ROLLBACK] Rollback command".bold().cyan());
    println!();

    if !journal_file.exists() {
        return Err(Error::InvalidJournalFile(format!(
            "{} does not exist",
            journal_file.display()
        )));
    }

    println!("[INFO] Loading journal: {}", journal_file.display());
    let mut loaded = journal::load_journal(journal_file)?;

    println!("  {} {}", "Session:".bold(), loaded.session_id);
    println!("  {} {}", "Executed at:".bold(), loaded.executed_at);
    println!("  {} {}", "Safety level:".bold(), loaded.safety_level);
    println!("  {} {}", "Operations:".bold(), loaded.records.len());
    println!();

    let conflicts = check_conflicts(&loaded.records);
    if !conflicts.is_empty() {
        println!("{}", "[WARNING] Conflicts detected:".bold().yellow());
        for conflict in &conflicts {
            println!("  - {}", conflict);
        }
        println!();
    }

    if dry_run {
        println!("{}", "[DRY-RUN] Showing what would be done:".bold().yellow());
        for line in describe_rollback(&loaded.records) {
            println!("  {} {}", "[DRY RUN]".yellow(), line);
        }
        println!();
        println!("{}", "[OK] Dry run complete - no changes were made".green());
        return Ok(());
    }

    println!(
        "{}",
        "[WARNING] This will reverse all recorded operations!".bold().yellow()
    );
    println!();

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Rolling back {} operations", loaded.records.len()));
    let report = manager.rollback_operations(&loaded.records).await;
    spinner.finish_and_clear();

    report.print_summary();
    println!();

    // Keep only what is left to undo so the journal can be retried.
    let undone: HashSet<_> = report
        .outcomes
        .iter()
        .filter(|o| o.status == RollbackStatus::RolledBack)
        .map(|o| o.record_id)
        .collect();
    if !undone.is_empty() && !report.is_success() {
        loaded.records.retain(|r| !undone.contains(&r.id));
        journal::save_journal(&loaded, journal_file)?;
        println!(
            "[INFO] Journal updated with {} remaining operations",
            loaded.records.len()
        );
    }

    if report.is_success() {
        println!("{}", "[OK] Rollback completed successfully!".green());
        Ok(())
    } else {
        println!("{}", "[WARNING] Rollback completed with errors".yellow());
        Err(Error::other(format!(
            "{} operations could not be rolled back",
            report.error_count()
        )))
    }
}
