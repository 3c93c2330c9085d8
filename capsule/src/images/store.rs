//! Image store: committed image directories plus the tag index.
//!
//! Callers hold the store lock (see `runtime::lock`): exclusive for
//! [`ImageStore::commit`] and [`ImageStore::remove`], shared for lookups.

use std::path::{Path, PathBuf};

use capsule_shared::constants::filenames;
use capsule_shared::errors::{CapsuleError, CapsuleResult};

use super::config::ImageConfig;
use super::index::ImageIndex;
use super::Image;
use crate::reference::Reference;
use crate::runtime::layout::{FilesystemLayout, ImageFilesystemLayout, dirs, resolve_in_rootfs};
use crate::runtime::types::{ImageId, ImageInfo, is_lower_hex};
use crate::util::fs::{dir_size, set_files_writable};

/// Outcome of removing an image reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovedImage {
    /// Tags that no longer exist
    pub untagged: Vec<String>,
    /// Image that was deleted from disk, if any
    pub deleted: Option<ImageId>,
}

#[derive(Clone, Debug)]
pub struct ImageStore {
    layout: ImageFilesystemLayout,
    temp_dir: PathBuf,
}

impl ImageStore {
    pub fn new(layout: &FilesystemLayout) -> Self {
        Self {
            layout: layout.image_layout(),
            temp_dir: layout.temp_dir(),
        }
    }

    /// Move a staged image directory (`image.json` + `rootfs/`) into the
    /// store under `id`, then point `tag` at it. Committed files are made
    /// read-only.
    ///
    /// When `id` is already present and intact, the staged directory is left
    /// untouched for the caller to discard and the existing image is
    /// returned. A stored image that no longer matches the staged build
    /// (missing or altered files, unreadable config) is replaced.
    /// Returns the image and whether its directory was written.
    pub fn commit(
        &self,
        staged: &Path,
        id: &ImageId,
        tag: Option<&Reference>,
    ) -> CapsuleResult<(Image, bool)> {
        let target = self.layout.image_dir(id);

        let created = if !target.exists() {
            self.install(staged, &target)?;
            tracing::info!(image_id = %id, "Committed image");
            true
        } else {
            match self.find_damage(staged, id)? {
                None => {
                    tracing::info!(image_id = %id, "Image already exists, reusing it");
                    false
                }
                Some(damage) => {
                    tracing::warn!(image_id = %id, "Replacing damaged image: {}", damage);
                    self.delete_dir(id)?;
                    self.install(staged, &target)?;
                    true
                }
            }
        };

        if let Some(tag) = tag {
            self.tag(id, tag)?;
        }

        Ok((self.get(id)?, created))
    }

    fn install(&self, staged: &Path, target: &Path) -> CapsuleResult<()> {
        std::fs::rename(staged, target).map_err(|e| {
            CapsuleError::Storage(format!(
                "failed to commit image into {}: {}",
                target.display(),
                e
            ))
        })?;
        set_files_writable(target, false)
    }

    /// Compare a stored image with the staged directory of the same build.
    fn find_damage(&self, staged: &Path, id: &ImageId) -> CapsuleResult<Option<String>> {
        let stored = match self.get(id) {
            Ok(image) => image,
            Err(e) => return Ok(Some(e.to_string())),
        };
        let config = ImageConfig::load(&staged.join(filenames::IMAGE_CONFIG))?;
        let staged_rootfs = staged.join(dirs::ROOTFS_DIR);

        let interpreter = config.entrypoint().interpreter();
        if !stored.host_path(interpreter)?.exists() {
            return Ok(Some(format!(
                "interpreter {} is missing",
                interpreter.display()
            )));
        }
        let app_file = config.entrypoint().app_file();
        if !stored.host_path(app_file)?.is_file() {
            return Ok(Some(format!("{} is missing", app_file.display())));
        }

        for file in config.files() {
            let image_path = config.workdir().join(file);
            let expected = resolve_in_rootfs(&staged_rootfs, &image_path)?;
            if !same_entry(&expected, &stored.host_path(&image_path)?) {
                return Ok(Some(format!(
                    "{} is missing or modified",
                    image_path.display()
                )));
            }
        }
        Ok(None)
    }

    /// Point `tag` at an existing image.
    pub fn tag(&self, id: &ImageId, tag: &Reference) -> CapsuleResult<()> {
        if !self.layout.image_dir(id).is_dir() {
            return Err(CapsuleError::ImageNotFound(id.to_string()));
        }
        let index_path = self.layout.index_path();
        let mut index = ImageIndex::load(&index_path)?;
        if let Some(previous) = index.set(tag.to_string(), id.clone())
            && previous != *id
        {
            tracing::info!(tag = %tag, from = %previous, to = %id, "Moved tag");
        }
        index.save(&index_path)
    }

    /// Load an image by exact id.
    pub fn get(&self, id: &ImageId) -> CapsuleResult<Image> {
        let root = self.layout.image_dir(id);
        if !root.is_dir() {
            return Err(CapsuleError::ImageNotFound(id.to_string()));
        }
        let config = ImageConfig::load(&self.layout.config_path(id))?;
        Ok(Image::new(id.clone(), config, root))
    }

    /// Resolve a reference: full id (`sha256:<hex>`), tag (`name[:tag]`), or
    /// unique id prefix, in that order.
    pub fn resolve(&self, reference: &str) -> CapsuleResult<Image> {
        if reference.starts_with("sha256:") {
            let id = ImageId::parse(reference)
                .map_err(|_| CapsuleError::ImageNotFound(reference.to_string()))?;
            return self.get(&id);
        }

        if let Some(id) = self.lookup_tag(reference)? {
            return self.get(&id);
        }

        if is_lower_hex(reference) {
            let mut matches = self
                .ids()?
                .into_iter()
                .filter(|id| id.hex().starts_with(reference));
            if let Some(id) = matches.next() {
                if matches.next().is_some() {
                    return Err(CapsuleError::InvalidArgument(format!(
                        "image id prefix '{reference}' is ambiguous"
                    )));
                }
                return self.get(&id);
            }
        }

        Err(CapsuleError::ImageNotFound(reference.to_string()))
    }

    fn lookup_tag(&self, reference: &str) -> CapsuleResult<Option<ImageId>> {
        let Ok(tag) = Reference::parse_image_tag(reference) else {
            return Ok(None);
        };
        let index = ImageIndex::load(&self.layout.index_path())?;
        Ok(index.get(&tag.to_string()).cloned())
    }

    /// All committed image ids, sorted.
    fn ids(&self) -> CapsuleResult<Vec<ImageId>> {
        let root = self.layout.root();
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(root).map_err(|e| {
            CapsuleError::Storage(format!("failed to read {}: {}", root.display(), e))
        })?;

        let mut ids: Vec<ImageId> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| ImageId::from_hex(&entry.file_name().to_string_lossy()).ok())
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Every image with its tags, newest first.
    pub fn list(&self) -> CapsuleResult<Vec<ImageInfo>> {
        let index = ImageIndex::load(&self.layout.index_path())?;

        let mut images = Vec::new();
        for id in self.ids()? {
            let image = match self.get(&id) {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!(image_id = %id, "Skipping unreadable image: {}", e);
                    continue;
                }
            };
            images.push(ImageInfo {
                tags: index.tags_for(&id),
                base: image.config().base().to_string(),
                created_at: image.config().created_at(),
                size: dir_size(image.root()),
                id,
            });
        }
        images.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(images)
    }

    /// Remove a reference.
    ///
    /// A tag reference drops that tag, and the image goes with its last tag.
    /// An id (or id prefix) deletes the image and every tag pointing at it.
    pub fn remove(&self, reference: &str) -> CapsuleResult<RemovedImage> {
        let index_path = self.layout.index_path();
        let mut index = ImageIndex::load(&index_path)?;

        let tagged = Reference::parse_image_tag(reference)
            .ok()
            .map(|tag| tag.to_string())
            .filter(|tag| index.get(tag).is_some() && !reference.starts_with("sha256:"));

        let removed = match tagged {
            Some(tag) => {
                let id = index.remove(&tag).ok_or_else(|| {
                    CapsuleError::Internal(format!("tag {tag} vanished from the index"))
                })?;
                let deleted = if index.tags_for(&id).is_empty() {
                    Some(id)
                } else {
                    None
                };
                RemovedImage {
                    untagged: vec![tag],
                    deleted,
                }
            }
            None => {
                let image = self.resolve(reference)?;
                RemovedImage {
                    untagged: index.remove_image(image.id()),
                    deleted: Some(image.id().clone()),
                }
            }
        };

        index.save(&index_path)?;
        if let Some(id) = &removed.deleted {
            self.delete_dir(id)?;
            tracing::info!(image_id = %id, "Deleted image");
        }
        Ok(removed)
    }

    /// Move the image out of the store, then delete it.
    fn delete_dir(&self, id: &ImageId) -> CapsuleResult<()> {
        let dir = self.layout.image_dir(id);
        if !dir.exists() {
            return Ok(());
        }
        let trash = tempfile::Builder::new()
            .prefix("rmi-")
            .tempdir_in(&self.temp_dir)
            .map_err(|e| CapsuleError::Storage(format!("failed to create trash dir: {e}")))?;
        std::fs::rename(&dir, trash.path().join(id.hex())).map_err(|e| {
            CapsuleError::Storage(format!("failed to remove {}: {}", dir.display(), e))
        })?;
        trash
            .close()
            .map_err(|e| CapsuleError::Storage(format!("failed to delete image files: {e}")))
    }
}

/// Same symlink target, or same regular-file content.
fn same_entry(expected: &Path, actual: &Path) -> bool {
    let (Ok(want), Ok(have)) = (
        std::fs::symlink_metadata(expected),
        std::fs::symlink_metadata(actual),
    ) else {
        return false;
    };

    if want.file_type().is_symlink() {
        return have.file_type().is_symlink()
            && matches!(
                (std::fs::read_link(expected), std::fs::read_link(actual)),
                (Ok(a), Ok(b)) if a == b
            );
    }
    if !(want.is_file() && have.is_file()) || want.len() != have.len() {
        return false;
    }
    matches!(
        (std::fs::read(expected), std::fs::read(actual)),
        (Ok(a), Ok(b)) if a == b
    )
}
