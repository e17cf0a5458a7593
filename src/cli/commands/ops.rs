//! Single operation commands: mkdir, mv, cp, rename, rm.
//!
//! Each command can write a journal with `--journal`, which `ocd rollback`
//! accepts like the journal of an applied plan.

use crate::core::journal;
use crate::core::FileOperationManager;
use crate::models::operation::OperationResult;
use crate::Result;
use colored::Colorize;
use std::path::Path;

pub async fn mkdir(
    manager: &mut FileOperationManager,
    path: &Path,
    parents: bool,
    exist_ok: bool,
    journal_path: Option<&Path>,
) -> Result<()> {
    let result = manager.create_directory(path, parents, exist_ok).await?;
    print_result(&result);
    save_journal(manager, &result, journal_path)
}

pub async fn mv(
    manager: &mut FileOperationManager,
    source: &Path,
    destination: &Path,
    resolve_conflicts: bool,
    journal_path: Option<&Path>,
) -> Result<()> {
    let result = manager.move_file(source, destination, resolve_conflicts).await?;
    print_result(&result);
    save_journal(manager, &result, journal_path)
}

pub async fn cp(
    manager: &mut FileOperationManager,
    source: &Path,
    destination: &Path,
    preserve_metadata: bool,
    journal_path: Option<&Path>,
) -> Result<()> {
    let result = manager.copy_file(source, destination, preserve_metadata).await?;
    print_result(&result);
    save_journal(manager, &result, journal_path)
}

pub async fn rename(
    manager: &mut FileOperationManager,
    path: &Path,
    new_name: &str,
    journal_path: Option<&Path>,
) -> Result<()> {
    let result = manager.rename_file(path, new_name).await?;
    print_result(&result);
    save_journal(manager, &result, journal_path)
}

pub async fn rm(
    manager: &mut FileOperationManager,
    path: &Path,
    force: bool,
    journal_path: Option<&Path>,
) -> Result<()> {
    let result = manager.delete_file(path, force).await?;
    print_result(&result);

    let backup = result
        .record_id
        .and_then(|id| manager.history().get(id))
        .and_then(|record| record.rollback.backup_path.as_ref());
    if let Some(backup) = backup {
        println!("  {} {}", "Backup:".bold(), backup.display());
    }
    save_journal(manager, &result, journal_path)
}

/// Write the session journal when one was asked for and something changed.
fn save_journal(
    manager: &FileOperationManager,
    result: &OperationResult,
    journal_path: Option<&Path>,
) -> Result<()> {
    let Some(path) = journal_path else {
        return Ok(());
    };
    if !result.mutated() {
        tracing::debug!("Nothing changed, no journal written to {:?}", path);
        return Ok(());
    }

    journal::save_journal(&manager.journal(), path)?;
    println!("  {} {}", "Journal:".bold(), path.display());
    println!(
        "  To undo: {}",
        format!("ocd rollback {}", path.display()).cyan()
    );
    Ok(())
}

/// Print an operation result with its resolved conflicts and warnings.
pub fn print_result(result: &OperationResult) {
    let tag = if result.mutated() {
        "[OK]".green()
    } else {
        "[SKIP]".yellow()
    };
    println!("{} {}", tag, result.message);

    for conflict in &result.conflicts_resolved {
        println!("  {} {}", "Conflict:".bold().yellow(), conflict);
    }
    for warning in &result.warnings {
        println!("  {} {}", "Warning:".bold().yellow(), warning);
    }
}
