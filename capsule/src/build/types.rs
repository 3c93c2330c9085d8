//! Stage inputs and outputs for the build pipeline.

use std::path::{Path, PathBuf};

use crate::base::{BaseRuntime, BaseRuntimeCatalog};
use crate::build::context::BuildContext;
use crate::images::ImageConfig;
use crate::manifest::ResolvedPackage;

/// Result of a build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub image: crate::images::Image,
    /// False when an identical image already existed
    pub created: bool,
}

pub struct BaseInput<'a> {
    pub catalog: &'a BaseRuntimeCatalog,
    pub reference: &'a str,
    /// Staged rootfs, must not exist yet
    pub rootfs: &'a Path,
}

pub struct BaseOutput {
    pub runtime: BaseRuntime,
}

pub struct WorkdirInput<'a> {
    pub rootfs: &'a Path,
    pub workdir: &'a Path,
}

pub struct WorkdirOutput {
    /// Host path of the workdir in the staged rootfs
    pub host_workdir: PathBuf,
}

pub struct ContextInput<'a> {
    pub context: &'a BuildContext,
    pub host_workdir: &'a Path,
}

pub struct ContextOutput {
    /// Copied regular files and symlinks, relative to the workdir, sorted
    pub files: Vec<PathBuf>,
    /// Context-relative manifest, when there is one
    pub manifest: Option<PathBuf>,
}

pub struct DependenciesInput<'a> {
    pub runtime: &'a BaseRuntime,
    /// Manifest as copied into the workdir
    pub manifest: Option<&'a Path>,
    pub rootfs: &'a Path,
}

pub struct DependenciesOutput {
    pub packages: Vec<ResolvedPackage>,
}

pub struct EntrypointInput<'a> {
    pub runtime: &'a BaseRuntime,
    pub context: &'a BuildContext,
    pub rootfs: &'a Path,
    pub files: Vec<PathBuf>,
    pub packages: Vec<ResolvedPackage>,
}

pub struct EntrypointOutput {
    pub config: ImageConfig,
}
