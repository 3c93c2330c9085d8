//! Shared constants
//!
//! File names and exit codes that the library and the CLI must agree on.

/// Environment variables
pub mod envs {
    /// Overrides the default home directory (`~/.capsule`)
    pub const CAPSULE_HOME: &str = "CAPSULE_HOME";
}

/// Well-known file names
pub mod filenames {
    /// Base runtime descriptor inside a catalog entry
    pub const RUNTIME_CONFIG: &str = "runtime.json";

    /// Frozen image config inside an image directory
    pub const IMAGE_CONFIG: &str = "image.json";

    /// Tag index inside the images directory
    pub const IMAGE_INDEX: &str = "index.json";

    /// Default build recipe inside a build context
    pub const RECIPE: &str = "capsule.yaml";

    /// Default dependency manifest inside a build context
    pub const MANIFEST: &str = "requirements.txt";
}

/// Process exit codes reported by the CLI.
///
/// Launch failures use the shell convention (125/126/127).
pub mod exit_codes {
    pub const GENERAL_FAILURE: i32 = 1;

    pub const BASE_IMAGE_UNAVAILABLE: i32 = 10;

    pub const CONTEXT_COPY: i32 = 11;

    pub const DEPENDENCY_RESOLUTION: i32 = 12;

    /// Image reference did not resolve
    pub const IMAGE_NOT_FOUND: i32 = 125;

    /// Entrypoint found but could not be executed
    pub const CANNOT_EXECUTE: i32 = 126;

    /// Frozen entrypoint absent from the image
    pub const ENTRYPOINT_MISSING: i32 = 127;

    /// Offset added to a signal number when the process was killed by it
    pub const SIGNAL_BASE: i32 = 128;
}
