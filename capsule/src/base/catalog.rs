//! Runtime catalog under `runtimes/`.

use std::path::Path;

use capsule_shared::constants::filenames;
use capsule_shared::errors::{CapsuleError, CapsuleResult};
use walkdir::WalkDir;

use super::{BaseRuntime, RuntimeConfig};
use crate::reference::Reference;
use crate::runtime::layout::{FilesystemLayout, RuntimeFilesystemLayout, resolve_in_rootfs};
use crate::runtime::types::RuntimeInfo;
use crate::util::fs::copy_tree;

/// Lookup, listing and import of base runtimes.
#[derive(Clone, Debug)]
pub struct BaseRuntimeCatalog {
    layout: FilesystemLayout,
}

impl BaseRuntimeCatalog {
    pub fn new(layout: FilesystemLayout) -> Self {
        Self { layout }
    }

    /// Bind a pinned reference to a catalog entry.
    pub fn resolve(&self, reference: &Reference) -> CapsuleResult<BaseRuntime> {
        let runtime_layout = self
            .layout
            .runtime_layout(reference.name(), reference.tag());

        if !runtime_layout.root().is_dir() {
            return Err(CapsuleError::BaseImageUnavailable(format!(
                "{reference} is not in the runtime catalog"
            )));
        }

        let config = validate_runtime_dir(&runtime_layout)
            .map_err(|e| CapsuleError::BaseImageUnavailable(format!("{reference}: {e}")))?;

        tracing::debug!(
            runtime = %reference,
            interpreter = %config.interpreter.display(),
            "Resolved base runtime"
        );
        Ok(BaseRuntime::new(reference.clone(), runtime_layout, config))
    }

    /// All valid catalog entries, sorted by reference. Broken entries are
    /// logged and skipped.
    pub fn list(&self) -> CapsuleResult<Vec<RuntimeInfo>> {
        let root = self.layout.runtimes_dir();
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut runtimes = Vec::new();
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            // never descend below a runtime directory
            .filter_entry(|entry| {
                entry.depth() == 0
                    || entry
                        .path()
                        .parent()
                        .is_none_or(|parent| !parent.join(filenames::RUNTIME_CONFIG).is_file())
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                CapsuleError::Storage(format!("failed to walk {}: {}", root.display(), e))
            })?;
            if !entry.file_type().is_dir()
                || !entry.path().join(filenames::RUNTIME_CONFIG).is_file()
            {
                continue;
            }

            let Some(reference) = reference_for(&root, entry.path()) else {
                tracing::warn!(path = %entry.path().display(), "Skipping malformed catalog entry");
                continue;
            };

            match self.resolve(&reference) {
                Ok(runtime) => runtimes.push(runtime_info(&runtime)),
                Err(e) => tracing::warn!(runtime = %reference, "Skipping broken runtime: {}", e),
            }
        }

        Ok(runtimes)
    }

    /// Copy a prepared runtime directory into the catalog as `reference`.
    ///
    /// The copy is validated in staging and then renamed into place, so a
    /// half-imported runtime is never visible. Existing entries are never
    /// replaced.
    pub fn import(&self, reference: &Reference, source: &Path) -> CapsuleResult<RuntimeInfo> {
        let target = self
            .layout
            .runtime_layout(reference.name(), reference.tag());
        if target.root().exists() {
            return Err(CapsuleError::InvalidState(format!(
                "runtime {reference} already exists"
            )));
        }
        if !source.is_dir() {
            return Err(CapsuleError::InvalidArgument(format!(
                "runtime source is not a directory: {}",
                source.display()
            )));
        }

        let staging = tempfile::Builder::new()
            .prefix("runtime-")
            .tempdir_in(self.layout.temp_dir())
            .map_err(|e| CapsuleError::Storage(format!("failed to create staging dir: {e}")))?;
        let staged = RuntimeFilesystemLayout::new(staging.path().join("runtime"));

        copy_tree(source, staged.root())?;
        validate_runtime_dir(&staged).map_err(|e| {
            CapsuleError::BaseImageUnavailable(format!("{}: {}", source.display(), e))
        })?;

        if let Some(parent) = target.root().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CapsuleError::Storage(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        std::fs::rename(staged.root(), target.root()).map_err(|e| {
            CapsuleError::Storage(format!(
                "failed to move runtime into {}: {}",
                target.root().display(),
                e
            ))
        })?;

        tracing::info!(runtime = %reference, source = %source.display(), "Imported base runtime");

        let runtime = self.resolve(reference)?;
        Ok(runtime_info(&runtime))
    }
}

/// Config, rootfs and interpreter must all be present.
fn validate_runtime_dir(layout: &RuntimeFilesystemLayout) -> CapsuleResult<RuntimeConfig> {
    let config = RuntimeConfig::load(&layout.config_path())?;

    let rootfs = layout.rootfs_dir();
    if !rootfs.is_dir() {
        return Err(CapsuleError::BaseImageUnavailable(
            "runtime has no rootfs".into(),
        ));
    }

    let interpreter = resolve_in_rootfs(&rootfs, &config.interpreter)?;
    if std::fs::symlink_metadata(&interpreter).is_err() {
        return Err(CapsuleError::BaseImageUnavailable(format!(
            "interpreter {} is missing from the runtime rootfs",
            config.interpreter.display()
        )));
    }
    Ok(config)
}

fn runtime_info(runtime: &BaseRuntime) -> RuntimeInfo {
    RuntimeInfo {
        reference: runtime.reference().to_string(),
        interpreter: runtime.config().interpreter.display().to_string(),
        packages: runtime.package_count(),
    }
}

/// `runtimes/a/b/<tag>` -> `a/b:<tag>`
fn reference_for(root: &Path, dir: &Path) -> Option<Reference> {
    let relative = dir.strip_prefix(root).ok()?;
    let tag = relative.file_name()?.to_str()?;
    let name = relative
        .parent()?
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?
        .join("/");
    Reference::parse_pinned(&format!("{name}:{tag}")).ok()
}
