//! Configuration for Capsule.

use crate::runtime::constants::envs as const_envs;
use crate::runtime::layout::dirs as const_dirs;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime-wide options.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapsuleOptions {
    /// Home directory holding the runtime catalog, the image store and logs.
    ///
    /// Default: `$CAPSULE_HOME`, else `~/.capsule`.
    pub home_dir: PathBuf,
}

impl Default for CapsuleOptions {
    fn default() -> Self {
        let home_dir = std::env::var(const_envs::CAPSULE_HOME)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let mut path = home_dir().unwrap_or_else(|| PathBuf::from("."));
                path.push(const_dirs::CAPSULE_DIR);
                path
            });

        Self { home_dir }
    }
}

/// Options for a single build.
#[derive(Clone, Debug, Default)]
pub struct BuildOptions {
    /// Tag to point at the resulting image (`name` or `name:tag`).
    pub tag: Option<String>,
}

/// Options for a single launch.
///
/// The entrypoint itself is frozen in the image and cannot be set here.
#[derive(Clone, Debug, Default)]
pub struct LaunchOptions {
    /// Environment overrides applied on top of the image environment.
    pub env: Vec<(String, String)>,
}

impl LaunchOptions {
    /// Parse `KEY=VALUE` pairs as given on the command line.
    pub fn with_env_pairs<I, S>(mut self, pairs: I) -> capsule_shared::CapsuleResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                capsule_shared::CapsuleError::InvalidArgument(format!(
                    "environment override must be KEY=VALUE: {pair}"
                ))
            })?;
            if key.is_empty() {
                return Err(capsule_shared::CapsuleError::InvalidArgument(format!(
                    "environment override has an empty key: {pair}"
                )));
            }
            self.env.push((key.to_string(), value.to_string()));
        }
        Ok(self)
    }
}
