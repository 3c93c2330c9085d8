//! Stage 1: Base runtime.
//!
//! Binds the pinned base reference and materializes its rootfs in staging.

use capsule_shared::errors::{CapsuleError, CapsuleResult};

use crate::build::types::{BaseInput, BaseOutput};
use crate::reference::Reference;
use crate::util::fs::copy_tree;

pub fn run(input: BaseInput<'_>) -> CapsuleResult<BaseOutput> {
    let reference = Reference::parse_pinned(input.reference)?;
    let runtime = input.catalog.resolve(&reference)?;

    let files = copy_tree(&runtime.rootfs_dir(), input.rootfs).map_err(|e| {
        CapsuleError::BaseImageUnavailable(format!("{reference}: failed to copy rootfs: {e}"))
    })?;

    tracing::debug!(runtime = %reference, files, "Materialized base rootfs");
    Ok(BaseOutput { runtime })
}
