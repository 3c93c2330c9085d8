//! Stage 4: Dependencies.
//!
//! Parses the manifest copied into the workdir, resolves it against the base
//! runtime's package index and installs the result into `site_packages`.

use capsule_shared::errors::{CapsuleError, CapsuleResult};

use super::ensure_dir_in_rootfs;
use crate::build::types::{DependenciesInput, DependenciesOutput};
use crate::manifest::{DependencyManifest, install, resolve};

pub fn run(input: DependenciesInput<'_>) -> CapsuleResult<DependenciesOutput> {
    let Some(manifest_path) = input.manifest else {
        tracing::debug!("No dependency manifest");
        return Ok(DependenciesOutput {
            packages: Vec::new(),
        });
    };

    let manifest = DependencyManifest::from_file(manifest_path)?;
    let packages = resolve(&manifest, input.runtime)?;
    if packages.is_empty() {
        return Ok(DependenciesOutput { packages });
    }

    let site_packages = &input.runtime.config().site_packages;
    let host_site = ensure_dir_in_rootfs(input.rootfs, site_packages)
        .map_err(|e| CapsuleError::DependencyResolution(format!("site_packages: {e}")))?;
    let files = install(&packages, input.runtime, &host_site)?;

    tracing::info!(
        packages = packages.len(),
        files,
        site_packages = %site_packages.display(),
        "Installed dependencies"
    );
    Ok(DependenciesOutput { packages })
}
