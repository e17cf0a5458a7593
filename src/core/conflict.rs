//! Naming conflict resolution.

use crate::utils::fs::path_occupied;
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Highest `(n)` counter probed before falling back to a timestamp.
pub const MAX_COUNTER: u32 = 1000;

/// Produces collision-free paths of the form `stem (n).ext`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        Self
    }

    /// Return `path` if it is free, otherwise the first free
    /// `parent/stem (n)suffix` for `n` in `1..=1000`, otherwise
    /// `parent/stem_<unix timestamp>suffix`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if !path_occupied(path) {
            return path.to_path_buf();
        }

        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        let (stem, suffix) = split_name(path);

        for n in 1..=MAX_COUNTER {
            let candidate = parent.join(format!("{} ({}){}", stem, n, suffix));
            if !path_occupied(&candidate) {
                return candidate;
            }
        }

        let fallback = parent.join(format!("{}_{}{}", stem, Utc::now().timestamp(), suffix));
        tracing::warn!(
            "More than {} conflicting names for {:?}, using {:?}",
            MAX_COUNTER,
            path,
            fallback
        );
        fallback
    }
}

/// Split a file name into stem and suffix (including the dot).
///
/// `archive.tar.gz` splits into `archive.tar` and `.gz`; dotfiles such as
/// `.bashrc` have no suffix.
fn split_name(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_free_path_is_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("d.txt");
        assert_eq!(ConflictResolver::new().resolve(&path), path);
    }

    #[test]
    fn test_probes_sequentially() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["d.txt", "d (1).txt", "d (2).txt"] {
            fs::write(temp_dir.path().join(name), name).unwrap();
        }

        let resolved = ConflictResolver::new().resolve(&temp_dir.path().join("d.txt"));
        assert_eq!(resolved, temp_dir.path().join("d (3).txt"));
    }

    #[test]
    fn test_fills_first_gap() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["d.txt", "d (2).txt"] {
            fs::write(temp_dir.path().join(name), name).unwrap();
        }

        let resolved = ConflictResolver::new().resolve(&temp_dir.path().join("d.txt"));
        assert_eq!(resolved, temp_dir.path().join("d (1).txt"));
    }

    #[test]
    fn test_directories_and_dotfiles() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("Photos")).unwrap();
        fs::write(temp_dir.path().join(".bashrc"), "").unwrap();
        fs::write(temp_dir.path().join("backup.tar.gz"), "").unwrap();

        let resolver = ConflictResolver::new();
        assert_eq!(
            resolver.resolve(&temp_dir.path().join("Photos")),
            temp_dir.path().join("Photos (1)")
        );
        assert_eq!(
            resolver.resolve(&temp_dir.path().join(".bashrc")),
            temp_dir.path().join(".bashrc (1)")
        );
        assert_eq!(
            resolver.resolve(&temp_dir.path().join("backup.tar.gz")),
            temp_dir.path().join("backup.tar (1).gz")
        );
    }

    #[test]
    fn test_timestamp_fallback_after_limit() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("x.log"), "").unwrap();
        for n in 1..=MAX_COUNTER {
            fs::write(temp_dir.path().join(format!("x ({}).log", n)), "").unwrap();
        }

        let resolved = ConflictResolver::new().resolve(&temp_dir.path().join("x.log"));
        let name = resolved.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("x_"));
        assert!(name.ends_with(".log"));
        assert!(!resolved.exists());
    }
}
