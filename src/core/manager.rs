//! File operation manager.
//!
//! The only component allowed to mutate the filesystem. Every call goes
//! through the same steps:
//! - validate paths against the safety profile
//! - resolve naming conflicts
//! - back up whatever is about to be destroyed (profile permitting)
//! - perform the mutation
//! - append an [`OperationRecord`] to the session history
//!
//! The first two steps are shared with [`FileOperationManager::preview_operations`],
//! so a dry run reports exactly what execution would do against the current
//! filesystem state.
//!
//! All mutating methods take `&mut self`. The manager holds no locks and must
//! not be shared between concurrent callers without external synchronization.

use crate::core::backup::BackupManager;
use crate::core::conflict::ConflictResolver;
use crate::core::history::OperationHistory;
use crate::core::safety::{self, PathAccess, SafetyVerdict};
use crate::models::config::DEFAULT_MAX_BATCH_SIZE;
use crate::models::journal::Journal;
use crate::models::operation::{OperationIntent, OperationKind, OperationRecord, OperationResult};
use crate::models::report::{BatchOutcome, OperationStats, PlannedOperation, PreviewReport};
use crate::models::safety::{SafetyLevel, SafetyProfile};
use crate::utils::fs as fsutil;
use crate::utils::hash;
use crate::{Error, ErrorKind, Result};
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Largest batch accepted by `execute_batch` and `preview_operations`.
    pub max_batch_size: usize,
    /// Whether to verify checksums when a move has to copy data.
    pub verify_checksum: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            verify_checksum: true,
        }
    }
}

/// What a validated intent will do.
#[derive(Debug)]
enum Step {
    /// Nothing to change; the call succeeds without a record.
    Skip { path: PathBuf, message: String },
    CreateDir {
        path: PathBuf,
        parents: bool,
        exist_ok: bool,
    },
    /// Move or rename.
    Relocate {
        source: PathBuf,
        destination: PathBuf,
        requested: PathBuf,
        resolve_conflicts: bool,
        overwrite: bool,
    },
    Copy {
        source: PathBuf,
        destination: PathBuf,
        requested: PathBuf,
        preserve_metadata: bool,
    },
    Delete {
        path: PathBuf,
        force: bool,
        was_directory: bool,
    },
}

/// A validated, conflict-resolved intent, ready to commit or to report.
#[derive(Debug)]
struct Prepared {
    kind: OperationKind,
    step: Step,
    old_name: Option<String>,
    new_name: Option<String>,
    created_dirs: Vec<PathBuf>,
    conflicts_resolved: Vec<String>,
    warnings: Vec<String>,
}

impl Prepared {
    fn new(kind: OperationKind, step: Step) -> Self {
        Self {
            kind,
            step,
            old_name: None,
            new_name: None,
            created_dirs: Vec::new(),
            conflicts_resolved: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn skip(kind: OperationKind, path: &Path, message: String) -> Self {
        Self::new(
            kind,
            Step::Skip {
                path: path.to_path_buf(),
                message,
            },
        )
    }

    fn to_planned(&self) -> PlannedOperation {
        let (source, destination) = match &self.step {
            Step::Skip { path, .. } => (Some(path.clone()), None),
            Step::CreateDir { path, .. } => (None, Some(path.clone())),
            Step::Relocate {
                source,
                destination,
                ..
            }
            | Step::Copy {
                source,
                destination,
                ..
            } => (Some(source.clone()), Some(destination.clone())),
            Step::Delete { path, .. } => (Some(path.clone()), None),
        };

        PlannedOperation {
            kind: self.kind,
            source,
            destination,
            no_op: matches!(self.step, Step::Skip { .. }),
            conflicts_resolved: self.conflicts_resolved.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

/// How a move was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MoveMethod {
    Rename,
    CopyDelete,
}

impl MoveMethod {
    fn as_str(&self) -> &'static str {
        match self {
            MoveMethod::Rename => "rename",
            MoveMethod::CopyDelete => "copy+delete",
        }
    }
}

/// A failed move. `partial` is set when the data now exists at both ends.
#[derive(Debug)]
pub(crate) struct MoveFailure {
    pub error: io::Error,
    pub partial: bool,
}

/// Safe file operation manager.
pub struct FileOperationManager {
    profile: SafetyProfile,
    options: ManagerOptions,
    resolver: ConflictResolver,
    backups: BackupManager,
    history: OperationHistory,
    session_id: Uuid,
}

impl FileOperationManager {
    /// Create a manager with default options.
    pub fn new(profile: SafetyProfile) -> Self {
        Self::with_options(profile, ManagerOptions::default())
    }

    /// Create a manager for one of the built-in safety levels.
    pub fn with_level(level: SafetyLevel) -> Self {
        Self::new(SafetyProfile::for_level(level))
    }

    /// Create a manager with custom options.
    pub fn with_options(profile: SafetyProfile, options: ManagerOptions) -> Self {
        let session_id = Uuid::new_v4();
        tracing::debug!(
            "File operation manager ready (session {}, {} safety)",
            session_id,
            profile.level
        );
        Self {
            profile,
            options,
            resolver: ConflictResolver::new(),
            backups: BackupManager::new(),
            history: OperationHistory::new(),
            session_id,
        }
    }

    pub fn profile(&self) -> &SafetyProfile {
        &self.profile
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Records executed in this session, oldest first.
    pub fn history(&self) -> &OperationHistory {
        &self.history
    }

    /// Forget the session history. Nothing on disk is touched.
    pub fn clear_history(&mut self) {
        tracing::info!("Clearing {} recorded operations", self.history.len());
        self.history.clear();
    }

    pub(crate) fn history_mut(&mut self) -> &mut OperationHistory {
        &mut self.history
    }

    pub(crate) fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn get_operation_stats(&self) -> OperationStats {
        self.history.stats()
    }

    /// Snapshot of the history suitable for saving to disk.
    pub fn journal(&self) -> Journal {
        Journal {
            version: "1.0".to_string(),
            session_id: self.session_id.to_string(),
            safety_level: self.profile.level,
            executed_at: Utc::now().to_rfc3339(),
            records: self.history.records().to_vec(),
        }
    }

    /// Create a directory. An existing directory is a success when
    /// `exist_ok` is set.
    pub async fn create_directory(
        &mut self,
        path: &Path,
        parents: bool,
        exist_ok: bool,
    ) -> Result<OperationResult> {
        self.execute(&OperationIntent::CreateDir {
            path: path.to_path_buf(),
            parents,
            exist_ok,
        })
        .await
    }

    /// Move a file or directory, renaming on conflict unless
    /// `resolve_conflicts` is false.
    pub async fn move_file(
        &mut self,
        source: &Path,
        destination: &Path,
        resolve_conflicts: bool,
    ) -> Result<OperationResult> {
        self.execute(&OperationIntent::Move {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            resolve_conflicts,
        })
        .await
    }

    /// Rename in place. `new_name` is reduced to a bare file name, so the
    /// result always stays in the original parent directory.
    pub async fn rename_file(&mut self, path: &Path, new_name: &str) -> Result<OperationResult> {
        self.execute(&OperationIntent::Rename {
            path: path.to_path_buf(),
            new_name: new_name.to_string(),
        })
        .await
    }

    /// Copy a file or directory tree. Conflicts are always resolved by
    /// renaming.
    pub async fn copy_file(
        &mut self,
        source: &Path,
        destination: &Path,
        preserve_metadata: bool,
    ) -> Result<OperationResult> {
        self.execute(&OperationIntent::Copy {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            preserve_metadata,
        })
        .await
    }

    /// Delete a file or directory tree. Deleting a missing path succeeds
    /// without a record.
    pub async fn delete_file(&mut self, path: &Path, force: bool) -> Result<OperationResult> {
        self.execute(&OperationIntent::Delete {
            path: path.to_path_buf(),
            force,
        })
        .await
    }

    /// Execute a single intent.
    pub async fn execute(&mut self, intent: &OperationIntent) -> Result<OperationResult> {
        let prepared = match self.prepare(intent) {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::warn!("Rejected {}: {}", intent, e);
                return Err(e);
            }
        };

        let result = self.commit(prepared).await;
        if let Err(ref e) = result {
            tracing::error!("Operation failed: {} - {}", intent, e);
        }
        result
    }

    /// Execute intents in order. With `stop_on_error`, the first failure ends
    /// the batch; otherwise every intent is attempted.
    pub async fn execute_batch(
        &mut self,
        intents: &[OperationIntent],
        stop_on_error: bool,
    ) -> Result<BatchOutcome> {
        self.check_batch_size(intents.len())?;
        tracing::info!("Executing {} operations", intents.len());

        let mut outcome = BatchOutcome::default();
        for (idx, intent) in intents.iter().enumerate() {
            tracing::debug!("Execute [{}/{}]: {}", idx + 1, intents.len(), intent);
            let result = self.execute(intent).await;
            let failed = result.is_err();
            outcome.results.push(result);

            if failed && stop_on_error {
                outcome.stopped_early = idx + 1 < intents.len();
                break;
            }
        }

        tracing::info!(
            "Batch finished: {} succeeded, {} failed",
            outcome.success_count(),
            outcome.error_count()
        );
        Ok(outcome)
    }

    /// Report what executing `intents` would do, without touching anything.
    pub fn preview_operations(&self, intents: &[OperationIntent]) -> Result<PreviewReport> {
        self.check_batch_size(intents.len())?;

        let mut report = PreviewReport {
            total_operations: intents.len(),
            ..PreviewReport::default()
        };

        for intent in intents {
            *report.operations_by_type.entry(intent.kind()).or_insert(0) += 1;

            if let Some(conflict) = occupied_target(intent) {
                report
                    .potential_conflicts
                    .push(format!("File exists: {}", conflict.display()));
            }

            match self.prepare(intent) {
                Ok(prepared) => report.planned.push(prepared.to_planned()),
                Err(e) => report
                    .safety_warnings
                    .push(format!("Unsafe operation: {}: {}", intent, e)),
            }
        }

        tracing::debug!(
            "Preview: {} operations, {} conflicts, {} warnings",
            report.total_operations,
            report.potential_conflicts.len(),
            report.safety_warnings.len()
        );
        Ok(report)
    }

    /// Whether the intent's paths pass the safety profile.
    ///
    /// Only safety is judged here; a missing source or an occupied
    /// destination is left to execution. Errors mean the check itself could
    /// not be carried out.
    pub fn validate_operation(&self, intent: &OperationIntent) -> Result<bool> {
        match self.check_safety(intent) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::Validation => {
                tracing::debug!("Validation failed for {}: {}", intent, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn check_batch_size(&self, size: usize) -> Result<()> {
        if size > self.options.max_batch_size {
            return Err(Error::BatchTooLarge {
                size,
                limit: self.options.max_batch_size,
            });
        }
        Ok(())
    }

    pub(crate) fn ensure_safe(&self, op: OperationKind, path: &Path, access: PathAccess) -> Result<()> {
        let verdict = safety::check_path(path, &self.profile, access)
            .map_err(|e| Error::filesystem(op, path, e))?;
        match verdict {
            SafetyVerdict::Safe => Ok(()),
            SafetyVerdict::Unsafe(reason) => Err(Error::validation(op, path, reason)),
        }
    }

    fn check_safety(&self, intent: &OperationIntent) -> Result<()> {
        let op = intent.kind();
        match intent {
            OperationIntent::CreateDir { path, .. } => self.ensure_safe(op, path, PathAccess::Mutate),
            OperationIntent::Move {
                source,
                destination,
                ..
            } => {
                self.ensure_safe(op, source, PathAccess::Mutate)?;
                self.ensure_safe(op, destination, PathAccess::Mutate)
            }
            OperationIntent::Copy {
                source,
                destination,
                ..
            } => {
                self.ensure_safe(op, source, PathAccess::ReadContents)?;
                self.ensure_safe(op, destination, PathAccess::Mutate)
            }
            OperationIntent::Rename { path, new_name } => {
                let (target, _) = rename_target(path, new_name)?;
                self.ensure_safe(op, path, PathAccess::Mutate)?;
                self.ensure_safe(op, &target, PathAccess::Mutate)
            }
            OperationIntent::Delete { path, .. } => {
                if self.profile.block_deletes {
                    return Err(Error::PermissionDenied {
                        op,
                        path: path.clone(),
                        reason: format!("deletes are blocked under {} safety", self.profile.level),
                    });
                }
                let access = if self.profile.require_backup {
                    PathAccess::ReadContents
                } else {
                    PathAccess::Mutate
                };
                self.ensure_safe(op, path, access)
            }
        }
    }

    /// Validate and resolve an intent without mutating anything.
    fn prepare(&self, intent: &OperationIntent) -> Result<Prepared> {
        self.check_safety(intent)?;

        match intent {
            OperationIntent::CreateDir {
                path,
                parents,
                exist_ok,
            } => self.prepare_create_dir(path, *parents, *exist_ok),
            OperationIntent::Move {
                source,
                destination,
                resolve_conflicts,
            } => self.prepare_relocate(OperationKind::Move, source, destination, *resolve_conflicts),
            OperationIntent::Copy {
                source,
                destination,
                preserve_metadata,
            } => self.prepare_copy(source, destination, *preserve_metadata),
            OperationIntent::Rename { path, new_name } => self.prepare_rename(path, new_name),
            OperationIntent::Delete { path, force } => self.prepare_delete(path, *force),
        }
    }

    fn prepare_create_dir(&self, path: &Path, parents: bool, exist_ok: bool) -> Result<Prepared> {
        let op = OperationKind::CreateDir;

        if fsutil::path_occupied(path) {
            if path.is_dir() && exist_ok {
                return Ok(Prepared::skip(
                    op,
                    path,
                    format!("Directory already exists: {}", path.display()),
                ));
            }
            return Err(Error::PathConflict {
                op,
                path: path.to_path_buf(),
            });
        }

        if !parents {
            let parent_missing = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .is_some_and(|p| !p.is_dir());
            if parent_missing {
                return Err(Error::validation(op, path, "parent directory does not exist"));
            }
        }

        let mut prepared = Prepared::new(
            op,
            Step::CreateDir {
                path: path.to_path_buf(),
                parents,
                exist_ok,
            },
        );
        prepared.created_dirs = fsutil::missing_ancestors(path);
        Ok(prepared)
    }

    fn prepare_relocate(
        &self,
        op: OperationKind,
        source: &Path,
        destination: &Path,
        resolve_conflicts: bool,
    ) -> Result<Prepared> {
        if !fsutil::path_occupied(source) {
            return Err(Error::SourceNotFound {
                op,
                path: source.to_path_buf(),
            });
        }

        let source_abs = fsutil::normalize_lexically(source).map_err(|e| Error::filesystem(op, source, e))?;
        let destination_abs =
            fsutil::normalize_lexically(destination).map_err(|e| Error::filesystem(op, destination, e))?;

        if source_abs == destination_abs {
            return Ok(Prepared::skip(
                op,
                source,
                format!("Already in place: {}", source.display()),
            ));
        }
        if fsutil::is_real_dir(source) && fsutil::is_within(&destination_abs, &source_abs) {
            return Err(Error::validation(
                op,
                destination,
                "cannot move a directory into itself",
            ));
        }

        let mut final_destination = destination.to_path_buf();
        let mut overwrite = false;
        let mut conflicts_resolved = Vec::new();
        let mut warnings = Vec::new();

        if fsutil::path_occupied(destination) {
            if resolve_conflicts {
                final_destination = self.resolver.resolve(destination);
                conflicts_resolved.push(format!(
                    "Renamed to {} to avoid conflict",
                    display_name(&final_destination)
                ));
            } else if self.profile.prevent_overwrite
                || fsutil::is_real_dir(destination)
                || fsutil::is_real_dir(source)
            {
                return Err(Error::PathConflict {
                    op,
                    path: destination.to_path_buf(),
                });
            } else {
                if self.profile.require_backup {
                    self.ensure_safe(op, destination, PathAccess::ReadContents)?;
                } else {
                    warnings.push("No backup will be taken of the overwritten file".to_string());
                }
                overwrite = true;
                warnings.push(format!("Overwriting existing {}", destination.display()));
            }
        }

        let mut prepared = Prepared::new(
            op,
            Step::Relocate {
                source: source.to_path_buf(),
                destination: final_destination.clone(),
                requested: destination.to_path_buf(),
                resolve_conflicts,
                overwrite,
            },
        );
        prepared.created_dirs = parent_dirs_to_create(&final_destination);
        prepared.conflicts_resolved = conflicts_resolved;
        prepared.warnings = warnings;
        Ok(prepared)
    }

    fn prepare_rename(&self, path: &Path, new_name: &str) -> Result<Prepared> {
        let (target, clean_name) = rename_target(path, new_name)?;
        let mut prepared = self.prepare_relocate(OperationKind::Rename, path, &target, true)?;

        prepared.old_name = path.file_name().map(|n| n.to_string_lossy().to_string());
        prepared.new_name = Some(match &prepared.step {
            Step::Relocate { destination, .. } => display_name(destination),
            _ => clean_name.clone(),
        });
        if clean_name != new_name {
            prepared.warnings.push(format!(
                "New name sanitized from '{}' to '{}'",
                new_name, clean_name
            ));
        }
        Ok(prepared)
    }

    fn prepare_copy(&self, source: &Path, destination: &Path, preserve_metadata: bool) -> Result<Prepared> {
        let op = OperationKind::Copy;

        if !fsutil::path_occupied(source) {
            return Err(Error::SourceNotFound {
                op,
                path: source.to_path_buf(),
            });
        }

        if fsutil::is_real_dir(source) {
            let source_abs = fsutil::normalize_lexically(source).map_err(|e| Error::filesystem(op, source, e))?;
            let destination_abs =
                fsutil::normalize_lexically(destination).map_err(|e| Error::filesystem(op, destination, e))?;
            if fsutil::is_within(&destination_abs, &source_abs) && source_abs != destination_abs {
                return Err(Error::validation(
                    op,
                    destination,
                    "cannot copy a directory into itself",
                ));
            }
        }

        let final_destination = self.resolver.resolve(destination);
        let mut conflicts_resolved = Vec::new();
        if final_destination != destination {
            conflicts_resolved.push(format!(
                "Renamed to {} to avoid conflict",
                display_name(&final_destination)
            ));
        }

        let mut prepared = Prepared::new(
            op,
            Step::Copy {
                source: source.to_path_buf(),
                destination: final_destination.clone(),
                requested: destination.to_path_buf(),
                preserve_metadata,
            },
        );
        prepared.created_dirs = parent_dirs_to_create(&final_destination);
        prepared.conflicts_resolved = conflicts_resolved;
        Ok(prepared)
    }

    fn prepare_delete(&self, path: &Path, force: bool) -> Result<Prepared> {
        let op = OperationKind::Delete;

        if !fsutil::path_occupied(path) {
            return Ok(Prepared::skip(
                op,
                path,
                format!("Nothing to delete, {} does not exist", path.display()),
            ));
        }

        let mut prepared = Prepared::new(
            op,
            Step::Delete {
                path: path.to_path_buf(),
                force,
                was_directory: fsutil::is_real_dir(path),
            },
        );
        if !self.profile.require_backup {
            prepared
                .warnings
                .push("No backup will be taken; this delete cannot be rolled back".to_string());
        }
        Ok(prepared)
    }

    /// Perform a prepared step and record it.
    async fn commit(&mut self, prepared: Prepared) -> Result<OperationResult> {
        let Prepared {
            kind,
            step,
            old_name,
            new_name,
            created_dirs,
            conflicts_resolved,
            warnings,
        } = prepared;

        let mut record = OperationRecord::new(kind);
        record.old_name = old_name;
        record.new_name = new_name;

        let message = match step {
            Step::Skip { path, message } => {
                tracing::debug!("{}", message);
                let mut result = OperationResult::ok(kind, message);
                match kind {
                    OperationKind::CreateDir => result.destination = Some(path),
                    _ => result.source = Some(path),
                }
                result.warnings = warnings;
                return Ok(result);
            }

            Step::CreateDir {
                path,
                parents,
                exist_ok,
            } => {
                record = record
                    .with_destination(&path)
                    .with_metadata("parents", parents)
                    .with_metadata("exist_ok", exist_ok);

                let target = path.clone();
                fsutil::run_blocking(move || {
                    if parents {
                        fs::create_dir_all(&target)
                    } else {
                        fs::create_dir(&target)
                    }
                })
                .await
                .map_err(|e| failure(kind, &path, None, &created_dirs, e))?;

                record.rollback.created = true;
                format!("Directory created: {}", path.display())
            }

            Step::Relocate {
                source,
                destination,
                requested,
                resolve_conflicts,
                overwrite,
            } => {
                record = record
                    .with_source(&source)
                    .with_destination(&destination)
                    .with_metadata("requested_destination", requested.display().to_string())
                    .with_metadata("resolve_conflicts", resolve_conflicts);

                self.ensure_parent(kind, &destination, &created_dirs).await?;
                if overwrite && self.profile.require_backup {
                    let backup = self.backup(kind, &destination, &created_dirs).await?;
                    record.rollback.backup_path = Some(backup);
                }
                record.rollback.prior_existed = Some(overwrite || !conflicts_resolved.is_empty());

                let method = self.relocate(kind, &source, &destination, &created_dirs).await?;
                record = record.with_metadata("method", method.as_str());

                match kind {
                    OperationKind::Rename => format!(
                        "File renamed: {} -> {}",
                        record.old_name.as_deref().unwrap_or_default(),
                        record.new_name.as_deref().unwrap_or_default()
                    ),
                    _ => format!(
                        "File moved: {} -> {}",
                        display_name(&source),
                        destination.display()
                    ),
                }
            }

            Step::Copy {
                source,
                destination,
                requested,
                preserve_metadata,
            } => {
                record = record
                    .with_source(&source)
                    .with_destination(&destination)
                    .with_metadata("requested_destination", requested.display().to_string())
                    .with_metadata("preserve_metadata", preserve_metadata);

                self.ensure_parent(kind, &destination, &created_dirs).await?;
                let (from, to) = (source.clone(), destination.clone());
                fsutil::run_blocking(move || fsutil::copy_into_place(&from, &to, preserve_metadata))
                    .await
                    .map_err(|e| failure(kind, &source, Some(&destination), &created_dirs, e))?;

                record.rollback.created = true;
                format!(
                    "File copied: {} -> {}",
                    display_name(&source),
                    destination.display()
                )
            }

            Step::Delete {
                path,
                force,
                was_directory,
            } => {
                record = record.with_source(&path).with_metadata("force", force);
                record.rollback.was_directory = Some(was_directory);

                if self.profile.require_backup {
                    let backup = self.backup(kind, &path, &[]).await?;
                    record.rollback.backup_path = Some(backup);
                }

                let target = path.clone();
                if let Err(source) = fsutil::run_blocking(move || fsutil::remove_entry(&target)).await {
                    return Err(Error::Filesystem {
                        op: kind,
                        partial_side_effect: was_directory && fsutil::path_occupied(&path),
                        path,
                        destination: None,
                        source,
                    });
                }

                let what = if was_directory { "Directory" } else { "File" };
                format!("{} deleted: {}", what, path.display())
            }
        };

        record.rollback.created_dirs = created_dirs;
        record.executed = true;
        tracing::info!("{}", message);

        let mut result = OperationResult::from_record(&record, message);
        result.conflicts_resolved = conflicts_resolved;
        result.warnings = warnings;
        self.history.push(record);
        Ok(result)
    }

    async fn ensure_parent(&self, op: OperationKind, destination: &Path, created_dirs: &[PathBuf]) -> Result<()> {
        let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        if parent.is_dir() {
            return Ok(());
        }

        let target = parent.to_path_buf();
        fsutil::run_blocking(move || fs::create_dir_all(&target))
            .await
            .map_err(|e| failure(op, destination, None, created_dirs, e))
    }

    async fn backup(&self, op: OperationKind, path: &Path, created_dirs: &[PathBuf]) -> Result<PathBuf> {
        let backups = self.backups.clone();
        let target = path.to_path_buf();
        fsutil::run_blocking(move || backups.create_backup(&target))
            .await
            .map_err(|e| failure(op, path, None, created_dirs, e))
    }

    async fn relocate(
        &self,
        op: OperationKind,
        source: &Path,
        destination: &Path,
        created_dirs: &[PathBuf],
    ) -> Result<MoveMethod> {
        let verify = self.options.verify_checksum;
        let (from, to) = (source.to_path_buf(), destination.to_path_buf());

        match fsutil::run_blocking(move || Ok(move_entry(&from, &to, verify))).await {
            Ok(Ok(method)) => Ok(method),
            Ok(Err(MoveFailure { error, partial })) => {
                if error.kind() == io::ErrorKind::InvalidData {
                    fsutil::remove_empty_dirs(created_dirs);
                    return Err(Error::ChecksumMismatch {
                        op,
                        path: source.to_path_buf(),
                        reason: error.to_string(),
                    });
                }
                let mut err = failure(op, source, Some(destination), created_dirs, error);
                if let Error::Filesystem {
                    partial_side_effect,
                    ..
                } = &mut err
                {
                    *partial_side_effect |= partial;
                }
                Err(err)
            }
            Err(e) => Err(failure(op, source, Some(destination), created_dirs, e)),
        }
    }
}

/// Move `from` to `to`, falling back to copy and delete across filesystems.
pub(crate) fn move_entry(from: &Path, to: &Path, verify_checksum: bool) -> std::result::Result<MoveMethod, MoveFailure> {
    match fs::rename(from, to) {
        Ok(()) => {
            tracing::debug!("Moved (rename): {:?} -> {:?}", from, to);
            Ok(MoveMethod::Rename)
        }
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!("Cross-filesystem move detected, using copy+delete");
            move_by_copy(from, to, verify_checksum, fsutil::remove_entry).map(|()| MoveMethod::CopyDelete)
        }
        Err(error) => Err(MoveFailure { error, partial: false }),
    }
}

/// Copy `from` to a staging name next to `to`, verify it, rename it into
/// place and only then remove `from` with `remove_source`.
///
/// A failure before the final removal leaves the source untouched and
/// nothing at `to`. A failed removal leaves the data at both ends and is
/// reported as `partial`.
fn move_by_copy<F>(
    from: &Path,
    to: &Path,
    verify_checksum: bool,
    remove_source: F,
) -> std::result::Result<(), MoveFailure>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let staged = fsutil::staging_path(to);
    let placed = fsutil::copy_entry(from, &staged, true)
        .and_then(|()| {
            if verify_checksum && fs::symlink_metadata(from)?.is_file() {
                verify_copy(from, &staged)
            } else {
                Ok(())
            }
        })
        .and_then(|()| fs::rename(&staged, to));

    if let Err(error) = placed {
        if fsutil::path_occupied(&staged) {
            if let Err(e) = fsutil::remove_entry(&staged) {
                tracing::warn!("Failed to clean up staged copy {:?}: {}", staged, e);
            }
        }
        return Err(MoveFailure { error, partial: false });
    }

    if let Err(error) = remove_source(from) {
        tracing::error!("Copied {:?} to {:?} but could not remove the source", from, to);
        return Err(MoveFailure { error, partial: true });
    }

    tracing::debug!("Moved (copy+delete): {:?} -> {:?}", from, to);
    Ok(())
}

fn verify_copy(original: &Path, copy: &Path) -> io::Result<()> {
    let expected = hash::sha256_file(original)?;
    let actual = hash::sha256_file(copy)?;
    if expected != actual {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("checksum mismatch after copying to {}", copy.display()),
        ));
    }
    Ok(())
}

/// Build a filesystem error, first removing any directories this call created
/// that are still empty.
fn failure(
    op: OperationKind,
    path: &Path,
    destination: Option<&Path>,
    created_dirs: &[PathBuf],
    source: io::Error,
) -> Error {
    let left = fsutil::remove_empty_dirs(created_dirs);
    Error::Filesystem {
        op,
        path: path.to_path_buf(),
        destination: destination.map(Path::to_path_buf),
        partial_side_effect: !left.is_empty(),
        source,
    }
}

/// Target of a rename: the sanitized name in the original parent directory.
fn rename_target(path: &Path, new_name: &str) -> Result<(PathBuf, String)> {
    let op = OperationKind::Rename;
    let clean = fsutil::sanitize_file_name(new_name)
        .ok_or_else(|| Error::validation(op, path, format!("'{}' is not a usable file name", new_name)))?;
    let parent = path
        .parent()
        .ok_or_else(|| Error::validation(op, path, "path has no parent directory"))?;
    Ok((parent.join(&clean), clean))
}

/// Destination of `intent` that is already taken, for preview reporting.
fn occupied_target(intent: &OperationIntent) -> Option<PathBuf> {
    let target = match intent {
        OperationIntent::CreateDir { path, .. } => {
            return (fsutil::path_occupied(path) && !path.is_dir()).then(|| path.clone());
        }
        OperationIntent::Move { destination, .. } | OperationIntent::Copy { destination, .. } => {
            destination.clone()
        }
        OperationIntent::Rename { path, new_name } => rename_target(path, new_name).ok()?.0,
        OperationIntent::Delete { .. } => return None,
    };

    let source = intent.primary_path();
    (fsutil::path_occupied(&target) && target != source).then_some(target)
}

fn parent_dirs_to_create(destination: &Path) -> Vec<PathBuf> {
    destination
        .parent()
        .map(fsutil::missing_ancestors)
        .unwrap_or_default()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_move_entry_same_filesystem_uses_rename() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("a.txt");
        let to = temp_dir.path().join("b.txt");
        fs::write(&from, "alpha").unwrap();

        let method = move_entry(&from, &to, true).unwrap();

        assert_eq!(method, MoveMethod::Rename);
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "alpha");
    }

    #[test]
    fn test_move_entry_missing_source_is_clean_failure() {
        let temp_dir = TempDir::new().unwrap();
        let failure = move_entry(
            &temp_dir.path().join("missing"),
            &temp_dir.path().join("b.txt"),
            true,
        )
        .unwrap_err();
        assert!(!failure.partial);
        assert!(!temp_dir.path().join("b.txt").exists());
    }

    fn staging_leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.contains(".ocd-tmp-"))
            .collect()
    }

    #[test]
    fn test_move_by_copy_file() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("a.txt");
        let to = temp_dir.path().join("b.txt");
        fs::write(&from, "alpha").unwrap();

        move_by_copy(&from, &to, true, fsutil::remove_entry).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "alpha");
        assert!(staging_leftovers(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_move_by_copy_directory() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("album");
        fs::create_dir_all(from.join("raw")).unwrap();
        fs::write(from.join("cover.jpg"), "jpg").unwrap();
        fs::write(from.join("raw").join("001.cr2"), "raw").unwrap();
        let to = temp_dir.path().join("Photos");

        move_by_copy(&from, &to, true, fsutil::remove_entry).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read_to_string(to.join("cover.jpg")).unwrap(), "jpg");
        assert_eq!(fs::read_to_string(to.join("raw").join("001.cr2")).unwrap(), "raw");
        assert!(staging_leftovers(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_move_by_copy_failed_placement_keeps_source() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("a.txt");
        fs::write(&from, "alpha").unwrap();
        // A non-empty directory cannot be replaced by a file.
        let to = temp_dir.path().join("occupied");
        fs::create_dir_all(&to).unwrap();
        fs::write(to.join("keep.txt"), "keep").unwrap();

        let failure = move_by_copy(&from, &to, true, fsutil::remove_entry).unwrap_err();

        assert!(!failure.partial);
        assert_eq!(fs::read_to_string(&from).unwrap(), "alpha");
        assert_eq!(fs::read_to_string(to.join("keep.txt")).unwrap(), "keep");
        assert!(staging_leftovers(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_move_by_copy_failed_source_removal_is_partial() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("a.txt");
        let to = temp_dir.path().join("b.txt");
        fs::write(&from, "alpha").unwrap();

        let failure = move_by_copy(&from, &to, true, |_| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "source is busy"))
        })
        .unwrap_err();

        assert!(failure.partial);
        assert_eq!(failure.error.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(fs::read_to_string(&from).unwrap(), "alpha");
        assert_eq!(fs::read_to_string(&to).unwrap(), "alpha");
        assert!(staging_leftovers(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_verify_copy_detects_difference() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a");
        let b = temp_dir.path().join("b");
        fs::write(&a, "same").unwrap();
        fs::write(&b, "same").unwrap();
        assert!(verify_copy(&a, &b).is_ok());

        fs::write(&b, "different").unwrap();
        let err = verify_copy(&a, &b).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_rename_target_stays_in_parent() {
        let (target, clean) = rename_target(Path::new("/data/inbox/a.txt"), "../../etc/passwd").unwrap();
        assert_eq!(target, PathBuf::from("/data/inbox/passwd"));
        assert_eq!(clean, "passwd");

        assert!(rename_target(Path::new("/data/inbox/a.txt"), "..").is_err());
    }

    #[test]
    fn test_batch_size_limit() {
        let manager = FileOperationManager::with_options(
            SafetyProfile::minimal(),
            ManagerOptions {
                max_batch_size: 1,
                ..ManagerOptions::default()
            },
        );
        let intents = vec![
            OperationIntent::create_dir("/tmp/ocd-a"),
            OperationIntent::create_dir("/tmp/ocd-b"),
        ];
        let err = manager.preview_operations(&intents).unwrap_err();
        assert!(matches!(err, Error::BatchTooLarge { size: 2, limit: 1 }));
    }
}
