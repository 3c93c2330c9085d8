//! Runtime facade over the catalog, the builder, the store and the launcher.

use std::path::Path;
use std::sync::Arc;

use capsule_shared::errors::{CapsuleError, CapsuleResult};

use crate::base::BaseRuntimeCatalog;
use crate::build::{BuildContext, BuildOutcome, ImageBuilder};
use crate::images::{Image, ImageStore, RemovedImage};
use crate::launcher::{self, LaunchOutcome};
use crate::reference::Reference;
use crate::runtime::constants::locks;
use crate::runtime::layout::FilesystemLayout;
use crate::runtime::lock::{LockMode, StoreLock};
use crate::runtime::options::{BuildOptions, CapsuleOptions, LaunchOptions};
use crate::runtime::types::{ImageInfo, RuntimeInfo};

// ============================================================================
// PUBLIC API
// ============================================================================

/// Entry point for building images and launching processes from them.
///
/// Any number of runtimes (in any number of processes) may share one home
/// directory; the image store is guarded by a file lock.
///
/// **Cloning**: cheap, all clones share the same state.
#[derive(Clone, Debug)]
pub struct CapsuleRuntime {
    inner: Arc<RuntimeInner>,
}

#[derive(Debug)]
struct RuntimeInner {
    layout: FilesystemLayout,
    catalog: BaseRuntimeCatalog,
    store: ImageStore,
}

// ============================================================================
// RUNTIME IMPLEMENTATION
// ============================================================================

impl CapsuleRuntime {
    /// Create a runtime over `options.home_dir`, creating the directory
    /// structure if needed.
    pub fn new(options: CapsuleOptions) -> CapsuleResult<Self> {
        if !options.home_dir.is_absolute() {
            return Err(CapsuleError::InvalidArgument(format!(
                "home_dir must be absolute path, got: {}",
                options.home_dir.display()
            )));
        }

        let layout = FilesystemLayout::new(options.home_dir);
        layout.prepare()?;

        tracing::debug!(home_dir = %layout.home_dir().display(), "Capsule runtime ready");
        Ok(Self {
            inner: Arc::new(RuntimeInner {
                catalog: BaseRuntimeCatalog::new(layout.clone()),
                store: ImageStore::new(&layout),
                layout,
            }),
        })
    }

    /// Runtime over the default home (`$CAPSULE_HOME` or `~/.capsule`).
    pub fn with_defaults() -> CapsuleResult<Self> {
        Self::new(CapsuleOptions::default())
    }

    pub fn layout(&self) -> &FilesystemLayout {
        &self.inner.layout
    }

    // ------------------------------------------------------------------------
    // Build
    // ------------------------------------------------------------------------

    /// Build an image from an opened context.
    pub fn build(
        &self,
        context: &BuildContext,
        options: BuildOptions,
    ) -> CapsuleResult<BuildOutcome> {
        let tag = options
            .tag
            .as_deref()
            .map(Reference::parse_image_tag)
            .transpose()?;

        ImageBuilder::new(&self.inner.layout, &self.inner.catalog, &self.inner.store)
            .build(context, tag.as_ref())
    }

    /// Build from a context directory and its recipe (default `capsule.yaml`).
    pub fn build_dir(
        &self,
        context_dir: &Path,
        recipe: Option<&Path>,
        options: BuildOptions,
    ) -> CapsuleResult<BuildOutcome> {
        let context = BuildContext::open(context_dir, recipe)?;
        self.build(&context, options)
    }

    // ------------------------------------------------------------------------
    // Launch
    // ------------------------------------------------------------------------

    /// Start the image's entrypoint with `args` and wait for it to exit.
    ///
    /// The process runs in a private copy of the image under `tmp/`. The
    /// store is locked (shared) only until that copy exists.
    pub async fn launch(
        &self,
        reference: &str,
        args: &[String],
        options: LaunchOptions,
    ) -> CapsuleResult<LaunchOutcome> {
        let lock = self.lock(LockMode::Shared)?;
        let image = self.inner.store.resolve(reference)?;
        launcher::launch(
            &image,
            args,
            &options,
            &self.inner.layout.temp_dir(),
            lock,
        )
        .await
    }

    // ------------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------------

    pub fn images(&self) -> CapsuleResult<Vec<ImageInfo>> {
        let _lock = self.lock(LockMode::Shared)?;
        self.inner.store.list()
    }

    pub fn inspect(&self, reference: &str) -> CapsuleResult<Image> {
        let _lock = self.lock(LockMode::Shared)?;
        self.inner.store.resolve(reference)
    }

    /// Untag or delete an image (see [`ImageStore::remove`]).
    pub fn remove_image(&self, reference: &str) -> CapsuleResult<RemovedImage> {
        let _lock = self.lock(LockMode::Exclusive)?;
        self.inner.store.remove(reference)
    }

    // ------------------------------------------------------------------------
    // Base runtimes
    // ------------------------------------------------------------------------

    pub fn runtimes(&self) -> CapsuleResult<Vec<RuntimeInfo>> {
        self.inner.catalog.list()
    }

    /// Import a prepared runtime directory as `reference` (pinned `name:tag`).
    pub fn import_runtime(&self, reference: &str, source: &Path) -> CapsuleResult<RuntimeInfo> {
        let reference = Reference::parse_pinned(reference)?;
        self.inner.catalog.import(&reference, source)
    }

    fn lock(&self, mode: LockMode) -> CapsuleResult<StoreLock> {
        StoreLock::acquire(&self.inner.layout.locks_dir().join(locks::IMAGES), mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_new_rejects_relative_home() {
        let err = CapsuleRuntime::new(CapsuleOptions {
            home_dir: PathBuf::from("relative/home"),
        })
        .unwrap_err();
        assert!(matches!(err, CapsuleError::InvalidArgument(_)));
    }

    #[test]
    fn test_new_prepares_home() {
        let dir = TempDir::new().unwrap();
        let runtime = CapsuleRuntime::new(CapsuleOptions {
            home_dir: dir.path().join("home"),
        })
        .unwrap();
        assert!(runtime.layout().images_dir().is_dir());
        assert!(runtime.images().unwrap().is_empty());
        assert!(runtime.runtimes().unwrap().is_empty());
    }

    #[test]
    fn test_build_rejects_bad_tag_before_building() {
        let dir = TempDir::new().unwrap();
        let runtime = CapsuleRuntime::new(CapsuleOptions {
            home_dir: dir.path().join("home"),
        })
        .unwrap();
        let context = dir.path().join("ctx");
        std::fs::create_dir_all(&context).unwrap();
        std::fs::write(
            context.join("capsule.yaml"),
            "base: missing:1.0\nentrypoint: main.sh\n",
        )
        .unwrap();

        let err = runtime
            .build_dir(
                &context,
                None,
                BuildOptions {
                    tag: Some("Not Valid".into()),
                },
            )
            .unwrap_err();
        assert!(matches!(err, CapsuleError::InvalidArgument(_)));
    }
}
