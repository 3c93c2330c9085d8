//! Stage 2: Working directory.

use capsule_shared::errors::CapsuleResult;

use super::ensure_dir_in_rootfs;
use crate::build::types::{WorkdirInput, WorkdirOutput};

/// Create the working directory if the base rootfs lacks it.
pub fn run(input: WorkdirInput<'_>) -> CapsuleResult<WorkdirOutput> {
    let host_workdir = ensure_dir_in_rootfs(input.rootfs, input.workdir)?;
    tracing::debug!(workdir = %input.workdir.display(), "Prepared working directory");
    Ok(WorkdirOutput { host_workdir })
}
