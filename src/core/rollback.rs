//! Rollback of recorded operations.
//!
//! Inverts records in reverse order:
//! - move/rename: move the item back, then restore anything it overwrote
//! - copy: delete the copy
//! - create_dir: remove the directory if it is still empty
//! - delete: restore from the backup taken before deletion
//!
//! Every path a rollback writes or removes is checked against the manager's
//! safety profile first, so a journal cannot steer data anywhere a forward
//! operation could not.
//!
//! Each record is handled independently; one failure does not stop the rest.
//! Records that were rolled back are dropped from the manager's history and
//! no new records are appended.

use crate::core::manager::{move_entry, FileOperationManager};
use crate::core::safety::PathAccess;
use crate::models::operation::{OperationKind, OperationRecord};
use crate::utils::fs as fsutil;
use crate::{Error, ErrorKind, Result};
use colored::Colorize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackStatus {
    RolledBack,
    /// Nothing to undo, or left in place with a warning.
    Skipped,
    Failed,
}

/// Outcome of rolling back one record.
#[derive(Debug, Clone)]
pub struct RollbackOutcome {
    pub record_id: Uuid,
    pub kind: OperationKind,
    pub path: PathBuf,
    pub status: RollbackStatus,
    pub message: String,
    /// Set for failures.
    pub error_kind: Option<ErrorKind>,
}

/// Result of a rollback run.
#[derive(Debug, Default)]
pub struct RollbackReport {
    /// Outcomes in the order they were processed (newest record first).
    pub outcomes: Vec<RollbackOutcome>,
}

impl RollbackReport {
    fn count(&self, status: RollbackStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn success_count(&self) -> usize {
        self.count(RollbackStatus::RolledBack)
    }

    pub fn skip_count(&self) -> usize {
        self.count(RollbackStatus::Skipped)
    }

    pub fn error_count(&self) -> usize {
        self.count(RollbackStatus::Failed)
    }

    /// Check if rollback was successful.
    pub fn is_success(&self) -> bool {
        self.error_count() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &RollbackOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == RollbackStatus::Failed)
    }

    /// Print summary.
    pub fn print_summary(&self) {
        println!("{}", "[Rollback Summary]".bold().green());
        println!("  {} {}", "Rolled back:".bold(), self.success_count());
        println!("  {} {}", "Skipped:".bold(), self.skip_count());
        println!("  {} {}", "Failed:".bold(), self.error_count());

        let skipped: Vec<_> = self
            .outcomes
            .iter()
            .filter(|o| o.status == RollbackStatus::Skipped)
            .collect();
        if !skipped.is_empty() {
            println!();
            println!("{}", "[SKIPPED]".bold().yellow());
            for outcome in skipped {
                println!("  - {}", outcome.message);
            }
        }

        if self.error_count() > 0 {
            println!();
            println!("{}", "[ERRORS]".bold().red());
            for outcome in self.failures() {
                println!("  - {}", outcome.message);
            }
        }
    }
}

enum Undo {
    Done(String),
    Skipped(String),
}

impl FileOperationManager {
    /// Roll back `records`, newest first.
    pub async fn rollback_operations(&mut self, records: &[OperationRecord]) -> RollbackReport {
        tracing::info!("Rolling back {} operations", records.len());

        let mut report = RollbackReport::default();
        let mut undone = HashSet::new();

        for record in records.iter().rev() {
            let (status, message, error_kind) = match self.rollback_record(record).await {
                Ok(Undo::Done(message)) => {
                    tracing::info!("{}", message);
                    undone.insert(record.id);
                    (RollbackStatus::RolledBack, message, None)
                }
                Ok(Undo::Skipped(message)) => {
                    tracing::warn!("{}", message);
                    (RollbackStatus::Skipped, message, None)
                }
                Err(e) => {
                    tracing::error!("Rollback operation failed: {}", e);
                    (RollbackStatus::Failed, e.to_string(), Some(e.kind()))
                }
            };

            report.outcomes.push(RollbackOutcome {
                record_id: record.id,
                kind: record.kind,
                path: record.subject().to_path_buf(),
                status,
                message,
                error_kind,
            });
        }

        self.history_mut().remove(&undone);
        report
    }

    /// Roll back the most recent `count` operations of this session.
    pub async fn rollback_last(&mut self, count: usize) -> RollbackReport {
        let records = self.history().last(count).to_vec();
        self.rollback_operations(&records).await
    }

    /// Roll back every operation of this session.
    pub async fn rollback_all(&mut self) -> RollbackReport {
        let records = self.history().records().to_vec();
        self.rollback_operations(&records).await
    }

    async fn rollback_record(&self, record: &OperationRecord) -> Result<Undo> {
        if !record.executed {
            return Ok(Undo::Skipped(format!(
                "{} was never executed, nothing to undo",
                record.kind
            )));
        }

        match record.kind {
            OperationKind::Move | OperationKind::Rename => self.undo_relocate(record).await,
            OperationKind::Copy => self.undo_copy(record).await,
            OperationKind::CreateDir => self.undo_create_dir(record),
            OperationKind::Delete => self.undo_delete(record).await,
        }
    }

    async fn undo_relocate(&self, record: &OperationRecord) -> Result<Undo> {
        let op = record.kind;
        let (source, destination) = record_paths(record)?;
        self.ensure_safe(op, destination, PathAccess::Mutate)?;
        self.ensure_safe(op, source, PathAccess::Mutate)?;
        if let Some(backup) = &record.rollback.backup_path {
            self.ensure_safe(op, backup, PathAccess::ReadContents)?;
        }

        if !fsutil::path_occupied(destination) {
            return Err(Error::rollback(
                op,
                destination,
                "item is no longer at its destination",
            ));
        }
        if fsutil::path_occupied(source) {
            return Err(Error::rollback(op, source, "original location is occupied"));
        }

        if let Some(parent) = source.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::rollback(op, source, e.to_string()))?;
        }

        let verify = self.options().verify_checksum;
        let (from, to) = (destination.to_path_buf(), source.to_path_buf());
        match fsutil::run_blocking(move || Ok(move_entry(&from, &to, verify))).await {
            Ok(Ok(_)) => {}
            Ok(Err(failure)) => return Err(Error::rollback(op, destination, failure.error.to_string())),
            Err(e) => return Err(Error::rollback(op, destination, e.to_string())),
        }

        let mut message = format!(
            "Moved back: {} -> {}",
            destination.display(),
            source.display()
        );

        if let Some(backup) = &record.rollback.backup_path {
            self.restore_backup(op, backup, destination).await.map_err(|e| {
                Error::rollback(
                    op,
                    destination,
                    format!("moved back, but the overwritten item was not restored: {}", e),
                )
            })?;
            message.push_str(&format!(" (restored previous {})", display_name(destination)));
        }

        fsutil::remove_empty_dirs(&self.safe_dirs(record.kind, &record.rollback.created_dirs));
        Ok(Undo::Done(message))
    }

    async fn undo_copy(&self, record: &OperationRecord) -> Result<Undo> {
        let op = record.kind;
        let destination = record
            .destination
            .as_deref()
            .ok_or_else(|| Error::rollback(op, record.subject(), "record has no destination"))?;
        self.ensure_safe(op, destination, PathAccess::Mutate)?;

        if !fsutil::path_occupied(destination) {
            return Ok(Undo::Skipped(format!(
                "Copy already removed: {}",
                destination.display()
            )));
        }

        let target = destination.to_path_buf();
        fsutil::run_blocking(move || fsutil::remove_entry(&target))
            .await
            .map_err(|e| Error::rollback(op, destination, e.to_string()))?;

        fsutil::remove_empty_dirs(&self.safe_dirs(record.kind, &record.rollback.created_dirs));
        Ok(Undo::Done(format!("Removed copy: {}", destination.display())))
    }

    fn undo_create_dir(&self, record: &OperationRecord) -> Result<Undo> {
        let op = record.kind;
        let path = record
            .destination
            .as_deref()
            .ok_or_else(|| Error::rollback(op, record.subject(), "record has no path"))?;
        self.ensure_safe(op, path, PathAccess::Mutate)?;

        if !fsutil::path_occupied(path) {
            return Ok(Undo::Skipped(format!(
                "Directory already removed: {}",
                path.display()
            )));
        }
        if !fsutil::is_real_dir(path) {
            return Err(Error::rollback(op, path, "path is no longer a directory"));
        }

        let dirs = if record.rollback.created_dirs.is_empty() {
            vec![path.to_path_buf()]
        } else {
            self.safe_dirs(op, &record.rollback.created_dirs)
        };
        let left = fsutil::remove_empty_dirs(&dirs);

        if left.iter().any(|d| d == path) {
            return Ok(Undo::Skipped(format!(
                "Directory not empty, left in place: {}",
                path.display()
            )));
        }
        Ok(Undo::Done(format!("Removed directory: {}", path.display())))
    }

    async fn undo_delete(&self, record: &OperationRecord) -> Result<Undo> {
        let op = record.kind;
        let path = record
            .source
            .as_deref()
            .ok_or_else(|| Error::rollback(op, record.subject(), "record has no path"))?;

        let Some(backup) = &record.rollback.backup_path else {
            return Err(Error::rollback(
                op,
                path,
                "no backup was taken, the deleted data cannot be restored",
            ));
        };
        self.ensure_safe(op, path, PathAccess::Mutate)?;
        self.ensure_safe(op, backup, PathAccess::ReadContents)?;
        if fsutil::path_occupied(path) {
            return Err(Error::rollback(op, path, "original location is occupied"));
        }

        self.restore_backup(op, backup, path)
            .await
            .map_err(|e| Error::rollback(op, path, e.to_string()))?;
        Ok(Undo::Done(format!(
            "Restored from backup: {}",
            path.display()
        )))
    }

    /// The created directories that may be removed under the safety profile.
    fn safe_dirs(&self, op: OperationKind, dirs: &[PathBuf]) -> Vec<PathBuf> {
        dirs.iter()
            .filter(|dir| match self.ensure_safe(op, dir, PathAccess::Mutate) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Leaving directory in place: {}", e);
                    false
                }
            })
            .cloned()
            .collect()
    }

    async fn restore_backup(&self, op: OperationKind, backup: &Path, original: &Path) -> Result<()> {
        let backups = self.backups().clone();
        let (from, to) = (backup.to_path_buf(), original.to_path_buf());
        fsutil::run_blocking(move || backups.restore(&from, &to))
            .await
            .map_err(|e| Error::filesystem(op, original, e))
    }
}

/// Problems a rollback of `records` would run into, without changing anything.
pub fn check_conflicts(records: &[OperationRecord]) -> Vec<String> {
    let mut conflicts = Vec::new();

    for record in records.iter().filter(|r| r.executed) {
        match record.kind {
            OperationKind::Move | OperationKind::Rename => {
                if let (Some(source), Some(destination)) = (&record.source, &record.destination) {
                    if !fsutil::path_occupied(destination) {
                        conflicts.push(format!("Not found at destination: {}", destination.display()));
                    }
                    if fsutil::path_occupied(source) {
                        conflicts.push(format!("Original location occupied: {}", source.display()));
                    }
                }
            }
            OperationKind::CreateDir => {
                if let Some(path) = &record.destination {
                    if fsutil::is_real_dir(path) && !fsutil::is_dir_empty(path).unwrap_or(false) {
                        conflicts.push(format!("Directory not empty: {}", path.display()));
                    }
                }
            }
            OperationKind::Delete => {
                if record.rollback.backup_path.is_none() {
                    conflicts.push(format!(
                        "No backup for deleted path: {}",
                        record.subject().display()
                    ));
                }
            }
            OperationKind::Copy => {}
        }
    }

    conflicts
}

/// Human readable description of how each record would be undone, newest
/// first.
pub fn describe_rollback(records: &[OperationRecord]) -> Vec<String> {
    records
        .iter()
        .rev()
        .filter(|r| r.executed)
        .map(|record| {
            let subject = record.subject().display();
            match record.kind {
                OperationKind::Move | OperationKind::Rename => match &record.source {
                    Some(source) => format!("move {} -> {}", subject, source.display()),
                    None => format!("move {} (missing original path)", subject),
                },
                OperationKind::Copy => format!("delete {}", subject),
                OperationKind::CreateDir => format!("rmdir {}", subject),
                OperationKind::Delete => match &record.rollback.backup_path {
                    Some(backup) => format!("restore {} from {}", subject, backup.display()),
                    None => format!("restore {} (no backup)", subject),
                },
            }
        })
        .collect()
}

fn record_paths(record: &OperationRecord) -> Result<(&Path, &Path)> {
    match (&record.source, &record.destination) {
        (Some(source), Some(destination)) => Ok((source.as_path(), destination.as_path())),
        _ => Err(Error::rollback(
            record.kind,
            record.subject(),
            "record is missing its source or destination",
        )),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
