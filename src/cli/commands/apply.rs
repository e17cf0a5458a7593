//! Apply command implementation.
//!
//! Reads a plan file of operation intents, executes them in order and writes
//! a journal that `ocd rollback` can reverse.

use crate::core::journal;
use crate::core::FileOperationManager;
use crate::{Error, Result};
use chrono::Utc;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

/// Apply a plan file.
pub async fn apply_plan(
    manager: &mut FileOperationManager,
    plan_file: &Path,
    dry_run: bool,
    journal_path: Option<&Path>,
    rollback_on_error: bool,
) -> Result<()> {
    println!("{}", "[EXEC] Applying plan...".bold().cyan());
    println!();

    if !plan_file.exists() {
        return Err(Error::InvalidPlanFile(format!(
            "{} does not exist",
            plan_file.display()
        )));
    }

    println!("[INFO] Loading plan: {}", plan_file.display());
    let plan = journal::load_plan(plan_file)?;

    if let Some(ref description) = plan.description {
        println!("  {} {}", "Description:".bold(), description);
    }
    println!("  {} {}", "Operations:".bold(), plan.operations.len());
    println!("  {} {}", "Safety level:".bold(), manager.profile().level);
    println!();

    // Previewing first also enforces the batch size limit before anything runs.
    let preview = manager.preview_operations(&plan.operations)?;
    if dry_run {
        preview.print_summary();
        println!();
        println!("{}", "[OK] Dry run complete - no changes were made".green());
        return Ok(());
    }

    if !preview.is_clean() {
        println!(
            "{}",
            format!(
                "[WARNING] {} operations will be rejected by safety checks",
                preview.safety_warnings.len()
            )
            .bold()
            .yellow()
        );
        println!();
    }

    let total = plan.operations.len();
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let mut failed = 0;
    let mut stopped = false;
    for (idx, intent) in plan.operations.iter().enumerate() {
        pb.set_message(format!("[{}/{}] {}", idx + 1, total, intent.kind()));
        pb.inc(1);

        match manager.execute(intent).await {
            Ok(result) => {
                for conflict in &result.conflicts_resolved {
                    pb.println(format!("  {} {}", "[CONFLICT]".yellow(), conflict));
                }
            }
            Err(e) => {
                failed += 1;
                pb.println(format!("  {} {}: {}", "[FAILED]".red(), intent, e));
                if rollback_on_error {
                    stopped = true;
                    break;
                }
            }
        }
    }
    pb.finish_with_message("Done!");
    println!();

    if stopped {
        println!(
            "{}",
            format!(
                "[ROLLBACK] Undoing {} executed operations...",
                manager.history().len()
            )
            .bold()
            .yellow()
        );
        let report = manager.rollback_all().await;
        report.print_summary();
        println!();
    }

    if !manager.history().is_empty() {
        let journal_path = journal_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_journal_path(plan_file));
        journal::save_journal(&manager.journal(), &journal_path)?;
        println!(
            "{} {}",
            "[OK] Journal saved to:".bold().green(),
            journal_path.display()
        );
        println!();
        println!("{}", "[Next Steps]".bold().yellow());
        println!(
            "  To undo changes: {}",
            format!("ocd rollback {}", journal_path.display()).cyan()
        );
        println!();
    }

    manager.get_operation_stats().print_summary();

    if failed > 0 {
        return Err(Error::other(format!("{} of {} operations failed", failed, total)));
    }
    Ok(())
}

/// `journal_<timestamp>.json` next to the plan file.
fn default_journal_path(plan_file: &Path) -> PathBuf {
    let filename = format!("journal_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
    plan_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.join(&filename))
        .unwrap_or_else(|| PathBuf::from(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_journal_path_next_to_plan() {
        let path = default_journal_path(Path::new("/data/plans/plan.json"));
        assert_eq!(path.parent(), Some(Path::new("/data/plans")));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("journal_"));
        assert!(name.ends_with(".json"));

        let bare = default_journal_path(Path::new("plan.json"));
        assert!(bare.parent().map_or(true, |p| p.as_os_str().is_empty()));
    }
}
