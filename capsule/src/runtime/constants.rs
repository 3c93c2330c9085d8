//! Constants for the Capsule runtime
//!
//! Centralized location for hardcoded values and file names.

// Re-export shared constants from capsule-shared
pub use capsule_shared::constants::{envs, exit_codes, filenames};

/// Lock file names under `locks/`
pub mod locks {
    /// Guards the image store (index + image directories)
    pub const IMAGES: &str = "images.lock";
}

/// Base runtime references
pub mod references {
    /// Tag that is never accepted for a base runtime (must be pinned)
    pub const FLOATING_TAG: &str = "latest";

    /// Tag given to output images built without an explicit tag
    pub const DEFAULT_IMAGE_TAG: &str = "latest";
}

/// Build defaults
pub mod build {
    /// Working directory used when the recipe does not name one
    pub const DEFAULT_WORKDIR: &str = "/app";

    /// Prefix of staging directories under `tmp/`
    pub const STAGING_PREFIX: &str = "build-";
}

/// Launch defaults
pub mod launch {
    /// Prefix of per-launch instance directories under `tmp/`
    pub const INSTANCE_PREFIX: &str = "instance-";
}
