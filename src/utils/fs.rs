//! File system utilities.

use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

/// Whether anything (file, directory or symlink, even dangling) sits at `path`.
pub fn path_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Whether `path` is a real directory, not a symlink to one.
pub fn is_real_dir(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_dir())
        .unwrap_or(false)
}

/// Make `path` absolute and fold `.` and `..` components without touching
/// the filesystem.
pub fn normalize_lexically(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Resolve `path` to an absolute path with symlinks resolved as far as the
/// path exists. Missing trailing components are appended as-is.
pub fn resolve_absolute(path: &Path) -> io::Result<PathBuf> {
    let normalized = normalize_lexically(path)?;

    let mut existing = normalized.as_path();
    let mut missing = Vec::new();
    loop {
        match fs::canonicalize(existing) {
            Ok(mut resolved) => {
                for name in missing.iter().rev() {
                    resolved.push(name);
                }
                return Ok(resolved);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Ok(normalized);
                };
                missing.push(name.to_os_string());
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Directories that would have to be created for `path` to exist, outermost
/// first. Includes `path` itself when it is missing.
pub fn missing_ancestors(path: &Path) -> Vec<PathBuf> {
    let mut missing: Vec<PathBuf> = path
        .ancestors()
        .take_while(|p| !p.as_os_str().is_empty() && !path_occupied(p))
        .map(Path::to_path_buf)
        .collect();
    missing.reverse();
    missing
}

/// Whether `path` is `ancestor` or lies below it.
pub fn is_within(path: &Path, ancestor: &Path) -> bool {
    path.starts_with(ancestor)
}

/// Whether a directory has no entries.
pub fn is_dir_empty(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

/// Reduce a user supplied name to a bare file name.
///
/// Both `/` and `\` count as separators so a name can never address another
/// directory. Returns `None` when nothing usable is left.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let bare = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    match bare {
        "" | "." | ".." => None,
        _ => Some(bare.to_string()),
    }
}

/// Hidden sibling path used to stage data before it is renamed into place.
pub fn staging_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let staged = format!(".{}.ocd-tmp-{}", name, Uuid::new_v4().simple());
    match destination.parent() {
        Some(parent) => parent.join(staged),
        None => PathBuf::from(staged),
    }
}

/// Copy a single file, optionally carrying over its timestamps.
pub fn copy_file(from: &Path, to: &Path, preserve_metadata: bool) -> io::Result<()> {
    fs::copy(from, to)?;
    if preserve_metadata {
        copy_times(from, to);
    }
    Ok(())
}

fn copy_times(from: &Path, to: &Path) {
    let result = fs::metadata(from).and_then(|meta| {
        let mut times = FileTimes::new().set_modified(meta.modified()?);
        if let Ok(accessed) = meta.accessed() {
            times = times.set_accessed(accessed);
        }
        File::open(to)?.set_times(times)
    });
    if let Err(e) = result {
        tracing::debug!("Could not preserve timestamps on {:?}: {}", to, e);
    }
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(from)?, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

/// Recursively copy a directory tree. Symlinks are copied as links.
///
/// Fails without copying anything when `to` lies inside `from`.
pub fn copy_dir_recursive(from: &Path, to: &Path, preserve_metadata: bool) -> io::Result<()> {
    if is_within(&resolve_absolute(to)?, &resolve_absolute(from)?) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot copy {} into itself ({})", from.display(), to.display()),
        ));
    }

    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let target = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            copy_file(entry.path(), &target, preserve_metadata)?;
        }
    }
    Ok(())
}

/// Copy a file, directory or symlink.
pub fn copy_entry(from: &Path, to: &Path, preserve_metadata: bool) -> io::Result<()> {
    let file_type = fs::symlink_metadata(from)?.file_type();
    if file_type.is_symlink() {
        copy_symlink(from, to)
    } else if file_type.is_dir() {
        copy_dir_recursive(from, to, preserve_metadata)
    } else {
        copy_file(from, to, preserve_metadata)
    }
}

/// Copy `from` next to `to` under a staging name, then rename it into place.
///
/// On failure the staged data is removed and nothing is left at `to`.
pub fn copy_into_place(from: &Path, to: &Path, preserve_metadata: bool) -> io::Result<()> {
    let staged = staging_path(to);
    let result = copy_entry(from, &staged, preserve_metadata).and_then(|()| fs::rename(&staged, to));
    if result.is_err() && path_occupied(&staged) {
        if let Err(e) = remove_entry(&staged) {
            tracing::warn!("Failed to clean up staged copy {:?}: {}", staged, e);
        }
    }
    result
}

/// Remove a file, symlink or whole directory tree.
pub fn remove_entry(path: &Path) -> io::Result<()> {
    if is_real_dir(path) {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Remove the given directories, deepest first, as long as they are empty.
///
/// Returns the directories that are still present afterwards.
pub fn remove_empty_dirs(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut left = Vec::new();
    for dir in dirs.iter().rev() {
        if !is_real_dir(dir) {
            continue;
        }
        let removed = is_dir_empty(dir).and_then(|empty| {
            if empty {
                fs::remove_dir(dir).map(|()| true)
            } else {
                Ok(false)
            }
        });
        match removed {
            Ok(true) => tracing::debug!("Removed empty directory {:?}", dir),
            Ok(false) => left.push(dir.clone()),
            Err(e) => {
                tracing::debug!("Could not remove directory {:?}: {}", dir, e);
                left.push(dir.clone());
            }
        }
    }
    left
}

/// Run blocking filesystem work off the async executor.
pub async fn run_blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(sanitize_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_file_name("..\\..\\boot.ini").as_deref(), Some("boot.ini"));
        assert_eq!(sanitize_file_name("dir/"), None);
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name("   "), None);
    }

    #[test]
    fn test_normalize_lexically() {
        let path = normalize_lexically(Path::new("/data/inbox/../archive/./a.txt")).unwrap();
        assert_eq!(path, PathBuf::from("/data/archive/a.txt"));
    }

    #[test]
    fn test_resolve_absolute_keeps_missing_tail() {
        let temp_dir = TempDir::new().unwrap();
        let root = fs::canonicalize(temp_dir.path()).unwrap();
        let resolved = resolve_absolute(&temp_dir.path().join("missing/child.txt")).unwrap();
        assert_eq!(resolved, root.join("missing").join("child.txt"));
    }

    #[test]
    fn test_missing_ancestors() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a").join("b").join("c");
        let missing = missing_ancestors(&target);
        assert_eq!(
            missing,
            vec![
                temp_dir.path().join("a"),
                temp_dir.path().join("a").join("b"),
                target.clone()
            ]
        );

        fs::create_dir_all(&target).unwrap();
        assert!(missing_ancestors(&target).is_empty());
    }

    #[test]
    fn test_copy_dir_recursive() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.txt"), "alpha").unwrap();
        fs::write(src.join("nested").join("b.txt"), "beta").unwrap();

        let dst = temp_dir.path().join("dst");
        copy_entry(&src, &dst, true).unwrap();

        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "alpha");
        assert_eq!(fs::read_to_string(dst.join("nested").join("b.txt")).unwrap(), "beta");
    }

    #[test]
    fn test_copy_dir_into_itself_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.txt"), "alpha").unwrap();

        let err = copy_dir_recursive(&src, &src.join("copy"), false).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(!src.join("copy").exists());
    }

    #[test]
    fn test_copy_into_place_leaves_no_staging_files() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("a.txt");
        fs::write(&src, "alpha").unwrap();
        let dst = temp_dir.path().join("b.txt");

        copy_into_place(&src, &dst, true).unwrap();

        assert_eq!(fs::read_to_string(&dst).unwrap(), "alpha");
        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert!(names.iter().all(|n| !n.contains("ocd-tmp")));
    }

    #[test]
    fn test_remove_empty_dirs_keeps_populated() {
        let temp_dir = TempDir::new().unwrap();
        let dirs = missing_ancestors(&temp_dir.path().join("a").join("b").join("c"));
        fs::create_dir_all(dirs.last().unwrap()).unwrap();
        fs::write(temp_dir.path().join("a").join("keep.txt"), "x").unwrap();

        let left = remove_empty_dirs(&dirs);

        assert_eq!(left, vec![temp_dir.path().join("a")]);
        assert!(!temp_dir.path().join("a").join("b").exists());
    }

    #[test]
    fn test_copy_into_place_missing_source_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let dst = temp_dir.path().join("b.txt");

        assert!(copy_into_place(&temp_dir.path().join("missing"), &dst, false).is_err());
        assert!(!path_occupied(&dst));
        assert!(is_dir_empty(temp_dir.path()).unwrap());
    }
}
