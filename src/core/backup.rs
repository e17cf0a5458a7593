//! Point-in-time backups taken before destructive operations.
//!
//! Backups live in a hidden directory next to the original:
//! `<parent>/.ocd_backups/<name>_<yyyyMMdd_HHmmss>`. They are never removed
//! here; retention is left to cleanup tooling. A backup directory that is
//! itself being backed up goes to `<parent>/.ocd_backups_archive` instead.

use crate::utils::fs::{copy_entry, copy_into_place, path_occupied};
use chrono::Local;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the hidden backup directory.
pub const BACKUP_DIR_NAME: &str = ".ocd_backups";

/// Creates and restores backups.
#[derive(Debug, Clone)]
pub struct BackupManager {
    dir_name: String,
}

impl BackupManager {
    /// Create a backup manager using the default directory name.
    pub fn new() -> Self {
        Self {
            dir_name: BACKUP_DIR_NAME.to_string(),
        }
    }

    /// Backup directory that serves `path`. Never `path` itself.
    pub fn backup_dir_for(&self, path: &Path) -> io::Result<PathBuf> {
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no parent directory", path.display()),
            )
        })?;

        let dir = parent.join(&self.dir_name);
        if dir == path {
            return Ok(parent.join(format!("{}_archive", self.dir_name)));
        }
        Ok(dir)
    }

    /// Copy `path` into its backup directory and return the backup path.
    ///
    /// A second backup of the same name within the same second gets a
    /// `_<n>` counter instead of replacing the first.
    pub fn create_backup(&self, path: &Path) -> io::Result<PathBuf> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} has no file name", path.display()),
                )
            })?;

        let backup_dir = self.backup_dir_for(path)?;
        fs::create_dir_all(&backup_dir)?;

        let base = format!("{}_{}", name, Local::now().format("%Y%m%d_%H%M%S"));
        let mut backup_path = backup_dir.join(&base);
        let mut counter = 1;
        while path_occupied(&backup_path) {
            backup_path = backup_dir.join(format!("{}_{}", base, counter));
            counter += 1;
        }

        copy_entry(path, &backup_path, true)?;
        tracing::debug!("Backed up {:?} -> {:?}", path, backup_path);
        Ok(backup_path)
    }

    /// Copy a backup back to `original`. The backup itself is kept.
    pub fn restore(&self, backup_path: &Path, original: &Path) -> io::Result<()> {
        if !path_occupied(backup_path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("backup {} no longer exists", backup_path.display()),
            ));
        }
        if let Some(parent) = original.parent() {
            fs::create_dir_all(parent)?;
        }
        copy_into_place(backup_path, original, true)?;
        tracing::debug!("Restored {:?} -> {:?}", backup_path, original);
        Ok(())
    }
}

impl Default for BackupManager {
    fn default() -> Self {
        Self::new()
    }
}
