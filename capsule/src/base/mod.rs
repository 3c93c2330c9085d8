//! Base runtimes: pinned, immutable interpreter filesystems.
//!
//! A base runtime is what an image starts from. It provides the rootfs that
//! is copied into every image built on it, the interpreter that runs the
//! entrypoint, and a package index that dependency installation draws from.

mod catalog;

pub use catalog::BaseRuntimeCatalog;

use std::path::{Path, PathBuf};

use capsule_shared::errors::{CapsuleError, CapsuleResult};
use serde::{Deserialize, Serialize};

use crate::manifest::{PackageIndex, Version};
use crate::reference::Reference;
use crate::runtime::layout::{RuntimeFilesystemLayout, resolve_in_rootfs};

/// Contents of `runtime.json`. Paths are absolute inside the runtime rootfs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Interpreter binary (e.g. `/usr/local/bin/python`)
    pub interpreter: PathBuf,

    /// Directory dependency installation writes into
    pub site_packages: PathBuf,

    /// Base environment (`KEY=VALUE`)
    #[serde(default)]
    pub env: Vec<String>,
}

impl RuntimeConfig {
    pub fn load(path: &Path) -> CapsuleResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CapsuleError::BaseImageUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            CapsuleError::BaseImageUnavailable(format!("invalid {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CapsuleResult<()> {
        for (field, path) in [
            ("interpreter", &self.interpreter),
            ("site_packages", &self.site_packages),
        ] {
            // only the shape is checked here; the rootfs is not needed
            resolve_in_rootfs(Path::new("/"), path).map_err(|e| {
                CapsuleError::BaseImageUnavailable(format!("runtime {field}: {e}"))
            })?;
        }
        if let Some(entry) = self.env.iter().find(|entry| !is_env_entry(entry)) {
            return Err(CapsuleError::BaseImageUnavailable(format!(
                "runtime env entry must be KEY=VALUE: {entry}"
            )));
        }
        Ok(())
    }
}

fn is_env_entry(entry: &str) -> bool {
    entry.split_once('=').is_some_and(|(key, _)| !key.is_empty())
}

/// A base runtime bound from the catalog.
#[derive(Debug, Clone)]
pub struct BaseRuntime {
    reference: Reference,
    layout: RuntimeFilesystemLayout,
    config: RuntimeConfig,
}

impl BaseRuntime {
    pub(crate) fn new(
        reference: Reference,
        layout: RuntimeFilesystemLayout,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            reference,
            layout,
            config,
        }
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn rootfs_dir(&self) -> PathBuf {
        self.layout.rootfs_dir()
    }

    pub fn config_path(&self) -> PathBuf {
        self.layout.config_path()
    }

    /// Number of package versions in the index.
    pub fn package_count(&self) -> usize {
        let Ok(packages) = std::fs::read_dir(self.layout.packages_dir()) else {
            return 0;
        };
        packages
            .filter_map(Result::ok)
            .filter_map(|package| std::fs::read_dir(package.path()).ok())
            .map(|versions| versions.filter_map(Result::ok).count())
            .sum()
    }
}

impl PackageIndex for BaseRuntime {
    fn versions(&self, normalized_name: &str) -> CapsuleResult<Option<Vec<Version>>> {
        let dir = self.layout.package_dir(normalized_name);
        if !dir.is_dir() {
            return Ok(None);
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| {
            CapsuleError::DependencyResolution(format!(
                "failed to read package index {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                CapsuleError::DependencyResolution(format!(
                    "failed to read package index {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match name.parse::<Version>() {
                Ok(version) => versions.push(version),
                Err(reason) => tracing::warn!(
                    package = %normalized_name,
                    entry = %name,
                    "Skipping unparsable index entry: {}",
                    reason
                ),
            }
        }
        versions.sort_by(Version::cmp_spelled);
        Ok(Some(versions))
    }

    fn package_path(&self, normalized_name: &str, version: &Version) -> PathBuf {
        self.layout
            .package_dir(normalized_name)
            .join(version.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join("runtime.json");
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_load_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            dir.path(),
            r#"{"interpreter": "/usr/bin/python3", "site_packages": "/usr/lib/site", "env": ["PATH=/usr/bin"]}"#,
        );
        let config = RuntimeConfig::load(&path).unwrap();
        assert_eq!(config.interpreter, PathBuf::from("/usr/bin/python3"));
        assert_eq!(config.env, vec!["PATH=/usr/bin".to_string()]);
    }

    #[test]
    fn test_load_config_rejects_bad_paths() {
        let dir = TempDir::new().unwrap();
        for json in [
            r#"{"interpreter": "bin/python", "site_packages": "/site"}"#,
            r#"{"interpreter": "/bin/../../python", "site_packages": "/site"}"#,
            r#"{"interpreter": "/bin/python", "site_packages": "/site", "env": ["NOEQUALS"]}"#,
            r#"{"interpreter": "/bin/python"}"#,
            "not json",
        ] {
            let path = write_config(dir.path(), json);
            let err = RuntimeConfig::load(&path).unwrap_err();
            assert!(
                matches!(err, CapsuleError::BaseImageUnavailable(_)),
                "{json}: {err}"
            );
        }
    }

    #[test]
    fn test_package_index_versions() {
        let dir = TempDir::new().unwrap();
        let layout = RuntimeFilesystemLayout::new(dir.path().to_path_buf());
        for version in ["1.10.0", "1.2.0", "1.2", "not-a-version"] {
            fs::create_dir_all(layout.package_dir("requests").join(version)).unwrap();
        }
        let runtime = BaseRuntime::new(
            Reference::parse_pinned("python:3.11").unwrap(),
            layout,
            RuntimeConfig {
                interpreter: "/bin/python".into(),
                site_packages: "/site".into(),
                env: vec![],
            },
        );

        let versions: Vec<String> = runtime
            .versions("requests")
            .unwrap()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(versions, vec!["1.2", "1.2.0", "1.10.0"]);
        assert!(runtime.versions("numpy").unwrap().is_none());
        assert_eq!(runtime.package_count(), 4);
    }
}
