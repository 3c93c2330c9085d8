use capsule_shared::constants::filenames;
use capsule_shared::errors::{CapsuleError, CapsuleResult};
use std::path::{Path, PathBuf};

use crate::runtime::types::ImageId;

/// Directory structure constants
pub mod dirs {
    /// Base directory name for Capsule data
    pub const CAPSULE_DIR: &str = ".capsule";

    /// Subdirectory for the base runtime catalog
    pub const RUNTIMES_DIR: &str = "runtimes";

    /// Subdirectory for built images
    pub const IMAGES_DIR: &str = "images";

    /// Subdirectory for log files
    pub const LOGS_DIR: &str = "logs";

    /// Subdirectory for store locks
    pub const LOCKS_DIR: &str = "locks";

    /// Subdirectory for build staging (same filesystem as images/)
    pub const TMP_DIR: &str = "tmp";

    /// Filesystem tree of a runtime or an image
    pub const ROOTFS_DIR: &str = "rootfs";

    /// Package index of a runtime
    pub const PACKAGES_DIR: &str = "packages";
}

// ============================================================================
// FILESYSTEM LAYOUT (home directory)
// ============================================================================

/// Layout of the Capsule home directory.
///
/// ```text
/// ~/.capsule/
/// ├── runtimes/{name}/{tag}/   # base runtime catalog
/// ├── images/
/// │   ├── index.json           # tag -> image id
/// │   └── {hex}/               # one directory per image
/// ├── locks/
/// ├── logs/
/// └── tmp/                     # build staging, launch instances
/// ```
#[derive(Clone, Debug)]
pub struct FilesystemLayout {
    home_dir: PathBuf,
}

impl FilesystemLayout {
    pub fn new(home_dir: PathBuf) -> Self {
        Self { home_dir }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn runtimes_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::RUNTIMES_DIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::IMAGES_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::LOGS_DIR)
    }

    /// Store locks directory: ~/.capsule/locks
    pub fn locks_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::LOCKS_DIR)
    }

    /// Scratch directory for build staging and launch instances: ~/.capsule/tmp
    ///
    /// Lives next to images/ so that committing a build is a single rename.
    pub fn temp_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::TMP_DIR)
    }

    /// Initialize the filesystem structure.
    pub fn prepare(&self) -> CapsuleResult<()> {
        for (dir, what) in [
            (self.home_dir.clone(), "home"),
            (self.runtimes_dir(), "runtimes dir"),
            (self.images_dir(), "images dir"),
            (self.logs_dir(), "logs dir"),
            (self.locks_dir(), "locks dir"),
            (self.temp_dir(), "temp dir"),
        ] {
            std::fs::create_dir_all(&dir)
                .map_err(|e| CapsuleError::Storage(format!("failed to create {what}: {e}")))?;
        }
        Ok(())
    }

    /// Layout of one catalog entry.
    pub fn runtime_layout(&self, name: &str, tag: &str) -> RuntimeFilesystemLayout {
        RuntimeFilesystemLayout::new(self.runtimes_dir().join(name).join(tag))
    }

    pub fn image_layout(&self) -> ImageFilesystemLayout {
        ImageFilesystemLayout::new(self.images_dir())
    }
}

// ============================================================================
// RUNTIME FILESYSTEM LAYOUT (one catalog entry)
// ============================================================================

/// Layout of a base runtime directory.
///
/// ```text
/// runtimes/{name}/{tag}/
/// ├── runtime.json
/// ├── rootfs/
/// └── packages/{normalized-name}/{version}/
/// ```
#[derive(Clone, Debug)]
pub struct RuntimeFilesystemLayout {
    dir: PathBuf,
}

impl RuntimeFilesystemLayout {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(filenames::RUNTIME_CONFIG)
    }

    pub fn rootfs_dir(&self) -> PathBuf {
        self.dir.join(dirs::ROOTFS_DIR)
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.dir.join(dirs::PACKAGES_DIR)
    }

    /// Versions directory of one package: packages/{name}
    pub fn package_dir(&self, normalized_name: &str) -> PathBuf {
        self.packages_dir().join(normalized_name)
    }
}

// ============================================================================
// IMAGE FILESYSTEM LAYOUT (images directory)
// ============================================================================

/// Layout of the image store.
#[derive(Clone, Debug)]
pub struct ImageFilesystemLayout {
    images_dir: PathBuf,
}

impl ImageFilesystemLayout {
    pub fn new(images_dir: PathBuf) -> Self {
        Self { images_dir }
    }

    /// Root directory: ~/.capsule/images
    pub fn root(&self) -> &Path {
        &self.images_dir
    }

    /// Tag index: ~/.capsule/images/index.json
    pub fn index_path(&self) -> PathBuf {
        self.images_dir.join(filenames::IMAGE_INDEX)
    }

    /// Image directory: ~/.capsule/images/{hex}
    pub fn image_dir(&self, id: &ImageId) -> PathBuf {
        self.images_dir.join(id.hex())
    }

    /// Frozen config: ~/.capsule/images/{hex}/image.json
    pub fn config_path(&self, id: &ImageId) -> PathBuf {
        self.image_dir(id).join(filenames::IMAGE_CONFIG)
    }

    /// Image filesystem: ~/.capsule/images/{hex}/rootfs
    pub fn rootfs_dir(&self, id: &ImageId) -> PathBuf {
        self.image_dir(id).join(dirs::ROOTFS_DIR)
    }
}

/// Resolve an image-absolute path (e.g. `/app/main.py`) below a rootfs.
///
/// Rejects relative paths and `..` components so that nothing outside the
/// rootfs can be addressed.
pub fn resolve_in_rootfs(rootfs: &Path, image_path: &Path) -> CapsuleResult<PathBuf> {
    use std::path::Component;

    if !image_path.is_absolute() {
        return Err(CapsuleError::InvalidArgument(format!(
            "image path must be absolute: {}",
            image_path.display()
        )));
    }

    let mut resolved = rootfs.to_path_buf();
    for component in image_path.components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => resolved.push(part),
            Component::ParentDir | Component::Prefix(_) => {
                return Err(CapsuleError::InvalidArgument(format!(
                    "image path escapes the rootfs: {}",
                    image_path.display()
                )));
            }
        }
    }
    Ok(resolved)
}
