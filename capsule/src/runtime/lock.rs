//! Image store lock.
//!
//! Uses `flock` on a lock file under `locks/`. Builds and removals hold the
//! lock exclusively; launches hold it shared while they resolve an image, so
//! any number of instances start concurrently from the same image.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use capsule_shared::errors::{CapsuleError, CapsuleResult};

/// Lock flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl LockMode {
    fn flag(self) -> libc::c_int {
        match self {
            LockMode::Shared => libc::LOCK_SH,
            LockMode::Exclusive => libc::LOCK_EX,
        }
    }
}

/// A guard holding a `flock` on the store lock file.
///
/// Released when dropped, or when the process exits/crashes.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl StoreLock {
    /// Acquire the lock, waiting for conflicting holders to finish.
    pub fn acquire(lock_path: &Path, mode: LockMode) -> CapsuleResult<Self> {
        match Self::try_acquire(lock_path, mode) {
            Err(CapsuleError::InvalidState(_)) => {}
            result => return result,
        }

        tracing::info!(lock_path = %lock_path.display(), ?mode, "Waiting for image store lock");
        let file = open_lock_file(lock_path)?;
        flock(&file, mode, true)
            .map_err(|e| CapsuleError::Storage(format!("failed to acquire lock: {e}")))?;
        Ok(Self::held(file, lock_path, mode))
    }

    /// Acquire the lock or fail immediately if a conflicting holder exists.
    pub fn try_acquire(lock_path: &Path, mode: LockMode) -> CapsuleResult<Self> {
        let file = open_lock_file(lock_path)?;
        flock(&file, mode, false).map_err(|e| {
            if e.kind() == std::io::ErrorKind::WouldBlock {
                CapsuleError::InvalidState(format!(
                    "image store is busy: {} is held by another process",
                    lock_path.display()
                ))
            } else {
                CapsuleError::Storage(format!("failed to acquire lock: {e}"))
            }
        })?;
        Ok(Self::held(file, lock_path, mode))
    }

    fn held(file: File, lock_path: &Path, mode: LockMode) -> Self {
        tracing::debug!(lock_path = %lock_path.display(), ?mode, "Acquired store lock");
        Self {
            file,
            path: lock_path.to_path_buf(),
            mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

fn open_lock_file(lock_path: &Path) -> CapsuleResult<File> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CapsuleError::Storage(format!("failed to create locks dir: {e}")))?;
    }

    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| CapsuleError::Storage(format!("failed to open lock file: {e}")))
}

fn flock(file: &File, mode: LockMode, wait: bool) -> std::io::Result<()> {
    let mut operation = mode.flag();
    if !wait {
        operation |= libc::LOCK_NB;
    }
    let result = unsafe { libc::flock(file.as_raw_fd(), operation) };
    if result != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        tracing::debug!(lock_path = %self.path.display(), "Released store lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn lock_path(dir: &TempDir) -> PathBuf {
        dir.path().join("locks").join("images.lock")
    }

    #[test]
    fn test_acquire_creates_lock_file() {
        let dir = TempDir::new().unwrap();
        let lock = StoreLock::acquire(&lock_path(&dir), LockMode::Exclusive).unwrap();

        assert!(lock.path().exists());
        assert_eq!(lock.mode(), LockMode::Exclusive);
    }

    #[test]
    fn test_exclusive_blocks_second_exclusive() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        let _held = StoreLock::acquire(&path, LockMode::Exclusive).unwrap();
        let err = StoreLock::try_acquire(&path, LockMode::Exclusive).unwrap_err();

        assert!(err.to_string().contains("busy"));
    }

    #[test]
    fn test_shared_locks_coexist() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        let _a = StoreLock::acquire(&path, LockMode::Shared).unwrap();
        let _b = StoreLock::try_acquire(&path, LockMode::Shared).unwrap();

        assert!(StoreLock::try_acquire(&path, LockMode::Exclusive).is_err());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        {
            let _lock = StoreLock::acquire(&path, LockMode::Exclusive).unwrap();
        }

        let _again = StoreLock::try_acquire(&path, LockMode::Exclusive).unwrap();
    }

    #[test]
    fn test_lock_across_threads() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        let _held = StoreLock::acquire(&path, LockMode::Exclusive).unwrap();

        let other = path.clone();
        let result = std::thread::spawn(move || StoreLock::try_acquire(&other, LockMode::Shared))
            .join()
            .unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn test_acquire_waits_for_conflicting_holder() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        let held = StoreLock::acquire(&path, LockMode::Exclusive).unwrap();
        let release = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            drop(held);
        });

        let started = Instant::now();
        let lock = StoreLock::acquire(&path, LockMode::Shared).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(lock.mode(), LockMode::Shared);
        release.join().unwrap();
    }
}
