//! Build pipeline orchestration.
//!
//! Stages run sequentially in a private staging directory under `tmp/`.
//! Only the commit touches the image store, under the exclusive store lock;
//! a failure at any point drops the staging directory and leaves the store
//! unchanged.

use std::path::Path;
use std::time::Instant;

use capsule_shared::constants::filenames;
use capsule_shared::errors::{CapsuleError, CapsuleResult};

use super::context::BuildContext;
use super::stages;
use super::types::*;
use crate::base::{BaseRuntime, BaseRuntimeCatalog};
use crate::images::{ImageConfig, ImageDigest, ImageStore};
use crate::reference::Reference;
use crate::runtime::constants::{build::STAGING_PREFIX, locks};
use crate::runtime::layout::{FilesystemLayout, dirs};
use crate::runtime::lock::{LockMode, StoreLock};
use crate::runtime::types::ImageId;

pub struct ImageBuilder<'a> {
    layout: &'a FilesystemLayout,
    catalog: &'a BaseRuntimeCatalog,
    store: &'a ImageStore,
}

impl<'a> ImageBuilder<'a> {
    pub fn new(
        layout: &'a FilesystemLayout,
        catalog: &'a BaseRuntimeCatalog,
        store: &'a ImageStore,
    ) -> Self {
        Self {
            layout,
            catalog,
            store,
        }
    }

    /// Run every stage and commit the result.
    pub fn build(
        &self,
        context: &BuildContext,
        tag: Option<&Reference>,
    ) -> CapsuleResult<BuildOutcome> {
        let recipe = context.recipe();
        let span = tracing::info_span!(
            "build",
            context = %context.dir().display(),
            base = %recipe.base
        );
        let _enter = span.enter();
        let started = Instant::now();

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(self.layout.temp_dir())
            .map_err(|e| CapsuleError::Storage(format!("failed to create staging dir: {e}")))?;
        let image_dir = staging.path().join("image");
        let rootfs = image_dir.join(dirs::ROOTFS_DIR);

        let BaseOutput { runtime } = timed("base", || {
            stages::base::run(BaseInput {
                catalog: self.catalog,
                reference: &recipe.base,
                rootfs: &rootfs,
            })
        })?;

        let WorkdirOutput { host_workdir } = timed("workdir", || {
            stages::workdir::run(WorkdirInput {
                rootfs: &rootfs,
                workdir: &recipe.workdir,
            })
        })?;

        let ContextOutput { files, manifest } = timed("context", || {
            stages::context::run(ContextInput {
                context,
                host_workdir: &host_workdir,
            })
        })?;

        let staged_manifest = manifest.map(|path| host_workdir.join(path));
        let DependenciesOutput { packages } = timed("dependencies", || {
            stages::dependencies::run(DependenciesInput {
                runtime: &runtime,
                manifest: staged_manifest.as_deref(),
                rootfs: &rootfs,
            })
        })?;

        let EntrypointOutput { config } = timed("entrypoint", || {
            stages::entrypoint::run(EntrypointInput {
                runtime: &runtime,
                context,
                rootfs: &rootfs,
                files,
                packages,
            })
        })?;
        let id = image_id(&runtime, &host_workdir, &config)?;

        config.save(&image_dir.join(filenames::IMAGE_CONFIG))?;

        let lock_path = self.layout.locks_dir().join(locks::IMAGES);
        let _lock = StoreLock::acquire(&lock_path, LockMode::Exclusive)?;
        let (image, created) = self.store.commit(&image_dir, &id, tag)?;

        tracing::info!(
            image_id = %image.id(),
            created,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Build finished"
        );
        Ok(BuildOutcome { image, created })
    }
}

fn timed<T>(stage: &'static str, run: impl FnOnce() -> CapsuleResult<T>) -> CapsuleResult<T> {
    let started = Instant::now();
    let result = run();
    match &result {
        Ok(_) => tracing::debug!(
            stage,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Stage completed"
        ),
        Err(e) => tracing::warn!(stage, "Stage failed: {}", e),
    }
    result
}

/// Content id over everything that determines the image.
fn image_id(
    runtime: &BaseRuntime,
    host_workdir: &Path,
    config: &ImageConfig,
) -> CapsuleResult<ImageId> {
    let runtime_json = std::fs::read(runtime.config_path()).map_err(|e| {
        CapsuleError::Storage(format!("failed to read runtime config: {e}"))
    })?;

    let mut digest = ImageDigest::new();
    digest
        .text("base", &runtime.reference().to_string())
        .field("runtime", &runtime_json)
        .text("workdir", &config.workdir().to_string_lossy());

    for file in config.files() {
        digest.file(file, &host_workdir.join(file))?;
    }
    for package in config.dependencies() {
        digest.text("package", &format!("{}=={}", package.name, package.version));
    }

    let entrypoint = config.entrypoint();
    digest
        .text("interpreter", &entrypoint.interpreter().to_string_lossy())
        .text("app_file", &entrypoint.app_file().to_string_lossy());
    for entry in config.env() {
        digest.text("env", entry);
    }
    digest.finish()
}
