//! Content-derived image ids.
//!
//! The id hashes everything that determines the image contents: the base
//! runtime (reference and `runtime.json`), the workdir, every context file
//! (path, mode and content), the resolved dependency set, the entrypoint and
//! the environment. Identical inputs always produce the same id.

use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use capsule_shared::errors::{CapsuleError, CapsuleResult};
use sha2::{Digest, Sha256};

use crate::runtime::types::ImageId;

/// Incremental sha256 over length-prefixed fields.
pub struct ImageDigest {
    hasher: Sha256,
}

impl ImageDigest {
    pub fn new() -> Self {
        let mut digest = Self {
            hasher: Sha256::new(),
        };
        digest.field("capsule-image", b"v1");
        digest
    }

    /// Add a named field. Length prefixes keep field boundaries unambiguous.
    pub fn field(&mut self, name: &str, value: &[u8]) -> &mut Self {
        self.hasher.update((name.len() as u64).to_le_bytes());
        self.hasher.update(name.as_bytes());
        self.hasher.update((value.len() as u64).to_le_bytes());
        self.hasher.update(value);
        self
    }

    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.field(name, value.as_bytes())
    }

    /// Add a file by relative path, permission bits and content hash.
    pub fn file(&mut self, relative: &Path, absolute: &Path) -> CapsuleResult<&mut Self> {
        let metadata = std::fs::symlink_metadata(absolute).map_err(|e| {
            CapsuleError::Storage(format!("failed to stat {}: {}", absolute.display(), e))
        })?;

        let content_hash = if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(absolute).map_err(|e| {
                CapsuleError::Storage(format!("failed to read {}: {}", absolute.display(), e))
            })?;
            hex::encode(Sha256::digest(target.to_string_lossy().as_bytes()))
        } else {
            hash_file(absolute)?
        };

        let mode = metadata.permissions().mode() & 0o7777;
        self.text("file.path", &relative.to_string_lossy());
        self.text("file.mode", &format!("{mode:o}"));
        self.text("file.sha256", &content_hash);
        Ok(self)
    }

    pub fn finish(self) -> CapsuleResult<ImageId> {
        ImageId::from_hex(&hex::encode(self.hasher.finalize()))
    }
}

impl Default for ImageDigest {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_file(path: &Path) -> CapsuleResult<String> {
    let mut file = std::fs::File::open(path).map_err(|e| {
        CapsuleError::Storage(format!("failed to open {}: {}", path.display(), e))
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).map_err(|e| {
            CapsuleError::Storage(format!("failed to read {}: {}", path.display(), e))
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
