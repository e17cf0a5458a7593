//! Path safety checks.
//!
//! Stateless predicates deciding whether a path may be touched under a
//! [`SafetyProfile`]. A "no" is returned as [`SafetyVerdict::Unsafe`]; an
//! error is only returned when the check itself could not be carried out.

use crate::models::safety::SafetyProfile;
use crate::utils::fs::{normalize_lexically, resolve_absolute};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// How an operation is going to use a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathAccess {
    /// The path is created, renamed or removed without reading its data.
    Mutate,
    /// The full contents are read (copy, backup).
    ReadContents,
}

/// Outcome of a safety check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    Safe,
    Unsafe(String),
}

impl SafetyVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyVerdict::Safe)
    }
}

/// Check whether `path` may be used as described by `access`.
///
/// Checks, in order: forbidden prefixes, write permission (existing paths
/// only), and the size limit (contents read in full only; every file of a
/// directory counts).
pub fn check_path(path: &Path, profile: &SafetyProfile, access: PathAccess) -> io::Result<SafetyVerdict> {
    let lexical = normalize_lexically(path)?;
    let resolved = resolve_absolute(path)?;

    for prefix in &profile.forbidden_path_prefixes {
        let prefix = prefix.to_string_lossy();
        if has_prefix(&lexical.to_string_lossy(), &prefix)
            || has_prefix(&resolved.to_string_lossy(), &prefix)
        {
            tracing::warn!("Operation blocked on forbidden path: {:?}", resolved);
            return Ok(SafetyVerdict::Unsafe(format!(
                "{} is inside forbidden path {}",
                resolved.display(),
                prefix
            )));
        }
    }

    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SafetyVerdict::Safe),
        Err(e) => return Err(e),
    };

    if profile.validate_permissions && !is_writable(path, &metadata) {
        tracing::warn!("Operation blocked on read-only path: {:?}", resolved);
        return Ok(SafetyVerdict::Unsafe(format!(
            "{} is not writable",
            resolved.display()
        )));
    }

    if access == PathAccess::ReadContents {
        if let Some(limit) = profile.max_file_size {
            if metadata.is_file() && metadata.len() > limit {
                return Ok(oversized(&resolved, metadata.len(), limit));
            }
            if metadata.is_dir() {
                if let Some((file, size)) = first_oversized_file(path, limit)? {
                    return Ok(oversized(&file, size, limit));
                }
            }
        }
    }

    Ok(SafetyVerdict::Safe)
}

/// First file below `dir` larger than `limit`. Symlinks are not followed.
fn first_oversized_file(dir: &Path, limit: u64) -> io::Result<Option<(PathBuf, u64)>> {
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let size = entry.metadata().map_err(io::Error::from)?.len();
        if size > limit {
            return Ok(Some((entry.into_path(), size)));
        }
    }
    Ok(None)
}

fn oversized(path: &Path, size: u64, limit: u64) -> SafetyVerdict {
    SafetyVerdict::Unsafe(format!(
        "{} is {} bytes, over the {} byte limit",
        path.display(),
        size,
        limit
    ))
}

/// Whether `path` passes every check of `profile`.
pub fn is_path_safe(path: &Path, profile: &SafetyProfile) -> crate::Result<bool> {
    Ok(check_path(path, profile, PathAccess::ReadContents)?.is_safe())
}

/// Whether the current process may write to `path`. Symlinks are judged by
/// their own entry, which is never checked for write access.
#[cfg(unix)]
fn is_writable(path: &Path, metadata: &fs::Metadata) -> bool {
    use nix::unistd::{access, AccessFlags};
    metadata.file_type().is_symlink() || access(path, AccessFlags::W_OK).is_ok()
}

#[cfg(not(unix))]
fn is_writable(_path: &Path, metadata: &fs::Metadata) -> bool {
    !metadata.permissions().readonly()
}

/// Component-wise prefix match. Windows style prefixes compare
/// case-insensitively.
fn has_prefix(path: &str, prefix: &str) -> bool {
    let path = normalize_for_match(path);
    let prefix = normalize_for_match(prefix);
    if prefix.is_empty() {
        return false;
    }

    let (path, prefix) = if is_windows_style(&prefix) {
        (path.to_ascii_lowercase(), prefix.to_ascii_lowercase())
    } else {
        (path, prefix)
    };

    path == prefix || path.starts_with(&format!("{}/", prefix.trim_end_matches('/')))
}

fn normalize_for_match(path: &str) -> String {
    let mut normalized = path.trim().replace('\\', "/");
    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }
    normalized
}

fn is_windows_style(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_has_prefix_is_component_wise() {
        assert!(has_prefix("/etc", "/etc"));
        assert!(has_prefix("/etc/passwd", "/etc"));
        assert!(!has_prefix("/etcetera/file", "/etc"));
        assert!(has_prefix("c:/windows/system32/drivers", "C:\\Windows\\System32"));
        assert!(!has_prefix("/home/user", "C:\\Windows"));
        assert!(!has_prefix("/home/user", ""));
    }

    #[test]
    fn test_forbidden_prefix_blocks() {
        let profile = SafetyProfile::balanced();
        let verdict = check_path(Path::new("/etc/passwd"), &profile, PathAccess::Mutate).unwrap();
        assert!(!verdict.is_safe());

        let verdict =
            check_path(Path::new("/etc/../etc/hosts"), &profile, PathAccess::Mutate).unwrap();
        assert!(!verdict.is_safe());
    }

    #[test]
    fn test_missing_path_in_allowed_dir_is_safe() {
        let temp_dir = TempDir::new().unwrap();
        let profile = SafetyProfile::maximum();
        let path = temp_dir.path().join("new").join("file.txt");
        assert!(is_path_safe(&path, &profile).unwrap());
    }

    #[test]
    fn test_custom_prefix_blocks_subtree() {
        let temp_dir = TempDir::new().unwrap();
        let protected = temp_dir.path().join("protected");
        std::fs::create_dir(&protected).unwrap();
        let profile = SafetyProfile::minimal().with_forbidden_prefixes([protected.clone()]);

        assert!(!is_path_safe(&protected.join("a.txt"), &profile).unwrap());
        assert!(is_path_safe(&temp_dir.path().join("other.txt"), &profile).unwrap());
    }

    #[test]
    fn test_size_limit_applies_to_full_reads_only() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("big.bin");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        let mut profile = SafetyProfile::minimal();
        profile.max_file_size = Some(16);

        assert!(check_path(&path, &profile, PathAccess::Mutate).unwrap().is_safe());
        assert!(!check_path(&path, &profile, PathAccess::ReadContents)
            .unwrap()
            .is_safe());
    }

    #[test]
    fn test_size_limit_applies_to_files_inside_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("media");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("small.txt"), "ok").unwrap();

        let mut profile = SafetyProfile::minimal();
        profile.max_file_size = Some(16);
        assert!(check_path(&dir, &profile, PathAccess::ReadContents)
            .unwrap()
            .is_safe());

        std::fs::write(dir.join("nested").join("big.bin"), vec![0u8; 64]).unwrap();
        let verdict = check_path(&dir, &profile, PathAccess::ReadContents).unwrap();
        match verdict {
            SafetyVerdict::Unsafe(reason) => assert!(reason.contains("big.bin")),
            SafetyVerdict::Safe => panic!("oversized file inside directory was accepted"),
        }
        assert!(check_path(&dir, &profile, PathAccess::Mutate).unwrap().is_safe());
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_file_is_unsafe() {
        use std::os::unix::fs::PermissionsExt;

        // root may write regardless of mode bits
        if nix::unistd::Uid::effective().is_root() {
            return;
        }

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("locked.txt");
        std::fs::write(&path, "locked").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o444)).unwrap();

        let profile = SafetyProfile::balanced();
        assert!(!is_path_safe(&path, &profile).unwrap());

        let mut lenient = profile.clone();
        lenient.validate_permissions = false;
        assert!(is_path_safe(&path, &lenient).unwrap());

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
    }
}
