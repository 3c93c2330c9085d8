//! Capsule: deterministic images for single-entrypoint processes.
//!
//! An image is built once from a pinned base runtime, a build context and a
//! dependency manifest, and launched any number of times. Each launch starts
//! exactly one process whose exit code is the launch result.
//!
//! ```no_run
//! use capsule::{BuildOptions, CapsuleRuntime, LaunchOptions};
//! use std::path::Path;
//!
//! # async fn demo() -> capsule::CapsuleResult<()> {
//! let runtime = CapsuleRuntime::with_defaults()?;
//! let outcome = runtime.build_dir(
//!     Path::new("./giftbot"),
//!     None,
//!     BuildOptions { tag: Some("giftbot:1.0".into()) },
//! )?;
//! let launched = runtime
//!     .launch(outcome.image.id().as_str(), &["--rounds".into(), "3".into()], LaunchOptions::default())
//!     .await?;
//! std::process::exit(launched.exit_code);
//! # }
//! ```

pub mod base;
pub mod build;
pub mod images;
pub mod launcher;
pub mod manifest;
pub mod reference;
pub mod runtime;
pub mod util;

pub use base::{BaseRuntime, BaseRuntimeCatalog};
pub use build::{BuildContext, BuildOutcome, BuildRecipe};
pub use capsule_shared::errors::{CapsuleError, CapsuleResult};
pub use images::{EntrypointSpec, Image, ImageConfig, RemovedImage};
pub use launcher::{LaunchOutcome, LaunchState};
pub use reference::Reference;
pub use runtime::CapsuleRuntime;
pub use runtime::options::{BuildOptions, CapsuleOptions, LaunchOptions};
pub use runtime::types::{ImageId, ImageInfo, InstanceId, RuntimeInfo};
pub use util::init_logging;
