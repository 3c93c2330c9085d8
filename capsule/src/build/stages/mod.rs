//! Build stages.
//!
//! Each stage is a function with typed input/output, run strictly in order:
//!
//! ```text
//! Base ──→ Workdir ──→ Context ──→ Dependencies ──→ Entrypoint
//! ```
//!
//! Context runs before Dependencies so that a missing source file fails the
//! build before any package is resolved.

pub mod base;
pub mod context;
pub mod dependencies;
pub mod entrypoint;
pub mod workdir;

use std::path::{Path, PathBuf};

use capsule_shared::errors::{CapsuleError, CapsuleResult};

use crate::runtime::layout::resolve_in_rootfs;

/// Create an image-absolute directory in a staged rootfs.
///
/// Symlinks in the base rootfs may not redirect the directory outside the
/// rootfs. The nearest existing ancestor is checked before anything is
/// created, the finished directory after.
pub(crate) fn ensure_dir_in_rootfs(rootfs: &Path, image_path: &Path) -> CapsuleResult<PathBuf> {
    let host_path = resolve_in_rootfs(rootfs, image_path)?;
    let canonical_root = rootfs
        .canonicalize()
        .map_err(|e| CapsuleError::Storage(format!("failed to resolve rootfs: {e}")))?;

    let existing = host_path
        .ancestors()
        .find(|ancestor| ancestor.symlink_metadata().is_ok())
        .unwrap_or(rootfs);
    check_inside(&canonical_root, existing, image_path)?;

    std::fs::create_dir_all(&host_path).map_err(|e| {
        CapsuleError::Storage(format!("failed to create {}: {}", image_path.display(), e))
    })?;
    check_inside(&canonical_root, &host_path, image_path)?;
    Ok(host_path)
}

fn check_inside(canonical_root: &Path, host_path: &Path, image_path: &Path) -> CapsuleResult<()> {
    let canonical = host_path.canonicalize().map_err(|e| {
        CapsuleError::Storage(format!("failed to resolve {}: {}", image_path.display(), e))
    })?;
    if !canonical.starts_with(canonical_root) {
        return Err(CapsuleError::InvalidArgument(format!(
            "{} resolves outside the image rootfs",
            image_path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_dir_creates_nested_dir() {
        let dir = TempDir::new().unwrap();
        let rootfs = dir.path().join("rootfs");
        std::fs::create_dir_all(&rootfs).unwrap();

        let created = ensure_dir_in_rootfs(&rootfs, Path::new("/srv/app")).unwrap();
        assert_eq!(created, rootfs.join("srv/app"));
        assert!(created.is_dir());
    }

    #[test]
    fn test_ensure_dir_follows_symlink_inside_rootfs() {
        let dir = TempDir::new().unwrap();
        let rootfs = dir.path().join("rootfs");
        std::fs::create_dir_all(rootfs.join("usr/lib")).unwrap();
        std::os::unix::fs::symlink("usr/lib", rootfs.join("lib")).unwrap();

        ensure_dir_in_rootfs(&rootfs, Path::new("/lib/site-packages")).unwrap();
        assert!(rootfs.join("usr/lib/site-packages").is_dir());
    }

    #[test]
    fn test_ensure_dir_rejects_escape_without_creating_outside() {
        let dir = TempDir::new().unwrap();
        let rootfs = dir.path().join("rootfs");
        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&rootfs).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, rootfs.join("lib")).unwrap();

        let err = ensure_dir_in_rootfs(&rootfs, Path::new("/lib/site-packages/deep")).unwrap_err();
        assert!(matches!(err, CapsuleError::InvalidArgument(_)));
        assert!(!outside.join("site-packages").exists());
    }
}
