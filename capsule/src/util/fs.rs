//! Filesystem tree helpers used by the builder and the catalog.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use capsule_shared::errors::{CapsuleError, CapsuleResult};
use walkdir::WalkDir;

/// Recursively copy `src` (file or directory) to `dst`.
///
/// - Regular files: content and permission bits
/// - Directories: created with the same mode, merged if present
/// - Symlinks: recreated as-is (never followed)
///
/// Returns the number of regular files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> CapsuleResult<usize> {
    let metadata = fs::symlink_metadata(src)
        .map_err(|e| CapsuleError::Storage(format!("Failed to stat {}: {}", src.display(), e)))?;

    if !metadata.is_dir() {
        if let Some(parent) = dst.parent() {
            create_dir(parent)?;
        }
        copy_entry(src, dst, &metadata)?;
        return Ok(usize::from(metadata.is_file()));
    }

    let mut files = 0;
    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            CapsuleError::Storage(format!("Failed to walk directory {}: {}", src.display(), e))
        })?;

        let rel_path = entry.path().strip_prefix(src).map_err(|e| {
            CapsuleError::Storage(format!(
                "Failed to rebase path {}: {}",
                entry.path().display(),
                e
            ))
        })?;
        let dst_path = dst.join(rel_path);

        let metadata = fs::symlink_metadata(entry.path()).map_err(|e| {
            CapsuleError::Storage(format!("Failed to stat {}: {}", entry.path().display(), e))
        })?;

        if metadata.is_dir() {
            create_dir(&dst_path)?;
            fs::set_permissions(&dst_path, fs::Permissions::from_mode(metadata.permissions().mode()))
                .map_err(|e| {
                    CapsuleError::Storage(format!(
                        "Failed to set mode on {}: {}",
                        dst_path.display(),
                        e
                    ))
                })?;
        } else {
            copy_entry(entry.path(), &dst_path, &metadata)?;
            if metadata.is_file() {
                files += 1;
            }
        }
    }

    Ok(files)
}

fn copy_entry(src: &Path, dst: &Path, metadata: &fs::Metadata) -> CapsuleResult<()> {
    if fs::symlink_metadata(dst).is_ok_and(|m| !m.is_dir()) {
        fs::remove_file(dst).map_err(|e| {
            CapsuleError::Storage(format!("Failed to replace {}: {}", dst.display(), e))
        })?;
    }

    if metadata.file_type().is_symlink() {
        let target = fs::read_link(src).map_err(|e| {
            CapsuleError::Storage(format!("Failed to read symlink {}: {}", src.display(), e))
        })?;
        std::os::unix::fs::symlink(&target, dst).map_err(|e| {
            CapsuleError::Storage(format!(
                "Failed to create symlink {} -> {}: {}",
                dst.display(),
                target.display(),
                e
            ))
        })?;
    } else if metadata.is_file() {
        fs::copy(src, dst).map_err(|e| {
            CapsuleError::Storage(format!(
                "Failed to copy {} -> {}: {}",
                src.display(),
                dst.display(),
                e
            ))
        })?;
    } else {
        tracing::warn!("Skipping special file {}", src.display());
    }
    Ok(())
}

fn create_dir(path: &Path) -> CapsuleResult<()> {
    fs::create_dir_all(path).map_err(|e| {
        CapsuleError::Storage(format!("Failed to create directory {}: {}", path.display(), e))
    })
}

/// Relative paths of all non-directory entries below `root`, sorted.
pub fn list_files(root: &Path) -> CapsuleResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            CapsuleError::Storage(format!("Failed to walk directory {}: {}", root.display(), e))
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            files.push(rel.to_path_buf());
        }
    }
    Ok(files)
}

/// Clear every write bit on the regular files below `root`, or give the
/// owner write access back.
///
/// Symlinks are skipped, `set_permissions` would follow them.
pub fn set_files_writable(root: &Path, writable: bool) -> CapsuleResult<()> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            CapsuleError::Storage(format!("Failed to walk directory {}: {}", root.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let metadata = entry.metadata().map_err(|e| {
            CapsuleError::Storage(format!("Failed to stat {}: {}", entry.path().display(), e))
        })?;
        let mode = metadata.permissions().mode();
        let new_mode = if writable { mode | 0o200 } else { mode & !0o222 };
        if new_mode != mode {
            fs::set_permissions(entry.path(), fs::Permissions::from_mode(new_mode)).map_err(
                |e| {
                    CapsuleError::Storage(format!(
                        "Failed to set mode on {}: {}",
                        entry.path().display(),
                        e
                    ))
                },
            )?;
        }
    }
    Ok(())
}

/// Apparent size of everything below `root` (symlinks counted as links).
pub fn dir_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter_map(|entry| entry.metadata().ok())
        .filter(|metadata| metadata.is_file())
        .map(|metadata| metadata.len())
        .sum()
}
