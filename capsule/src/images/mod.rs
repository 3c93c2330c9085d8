//! Built images: frozen config, content ids, tags and the on-disk store.

pub mod config;
pub mod digest;
pub mod index;
pub mod store;

pub use config::{EntrypointSpec, ImageConfig, merge_env};
pub use digest::ImageDigest;
pub use index::ImageIndex;
pub use store::{ImageStore, RemovedImage};

use std::path::{Path, PathBuf};

use capsule_shared::errors::CapsuleResult;

use crate::runtime::layout::{dirs, resolve_in_rootfs};
use crate::runtime::types::ImageId;

/// A committed, read-only image.
#[derive(Debug, Clone)]
pub struct Image {
    id: ImageId,
    config: ImageConfig,
    root: PathBuf,
}

impl Image {
    pub(crate) fn new(id: ImageId, config: ImageConfig, root: PathBuf) -> Self {
        Self { id, config, root }
    }

    pub fn id(&self) -> &ImageId {
        &self.id
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Image directory in the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rootfs_dir(&self) -> PathBuf {
        self.root.join(dirs::ROOTFS_DIR)
    }

    /// Host path of an image-absolute path.
    pub fn host_path(&self, image_path: &Path) -> CapsuleResult<PathBuf> {
        resolve_in_rootfs(&self.rootfs_dir(), image_path)
    }
}
