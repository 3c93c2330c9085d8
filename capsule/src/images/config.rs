//! Frozen image configuration (`image.json`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use capsule_shared::errors::{CapsuleError, CapsuleResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::manifest::ResolvedPackage;
use crate::reference::Reference;

/// The process an image runs: `<interpreter> <app_file> <args...>`.
///
/// Both paths are absolute inside the image. There are no setters: the
/// entrypoint is fixed when the image is built and only the trailing
/// arguments vary per launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrypointSpec {
    interpreter: PathBuf,
    app_file: PathBuf,
}

impl EntrypointSpec {
    pub(crate) fn new(interpreter: PathBuf, app_file: PathBuf) -> Self {
        Self {
            interpreter,
            app_file,
        }
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    pub fn app_file(&self) -> &Path {
        &self.app_file
    }
}

/// Everything the launcher needs, written once at commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Base runtime the image was built from
    base: Reference,

    /// Working directory (cwd of the process)
    workdir: PathBuf,

    /// Frozen entrypoint
    entrypoint: EntrypointSpec,

    /// Process environment (`KEY=VALUE`, sorted)
    env: Vec<String>,

    /// Installed packages in manifest order
    #[serde(default)]
    dependencies: Vec<ResolvedPackage>,

    /// Application files copied from the context, relative to the workdir
    #[serde(default)]
    files: Vec<PathBuf>,

    created_at: DateTime<Utc>,
}

impl ImageConfig {
    pub(crate) fn new(
        base: Reference,
        workdir: PathBuf,
        entrypoint: EntrypointSpec,
        env: Vec<String>,
        dependencies: Vec<ResolvedPackage>,
        files: Vec<PathBuf>,
    ) -> Self {
        Self {
            base,
            workdir,
            entrypoint,
            env,
            dependencies,
            files,
            created_at: Utc::now(),
        }
    }

    pub fn base(&self) -> &Reference {
        &self.base
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn entrypoint(&self) -> &EntrypointSpec {
        &self.entrypoint
    }

    pub fn env(&self) -> &[String] {
        &self.env
    }

    pub fn dependencies(&self) -> &[ResolvedPackage] {
        &self.dependencies
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn load(path: &Path) -> CapsuleResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CapsuleError::Storage(format!("failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub(crate) fn save(&self, path: &Path) -> CapsuleResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| {
            CapsuleError::Storage(format!("failed to write {}: {}", path.display(), e))
        })
    }
}

/// Merge `overrides` into a `KEY=VALUE` environment.
///
/// Overrides win on equal keys. The result is sorted for determinism.
pub fn merge_env<I>(base: &[String], overrides: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut env_map: HashMap<String, String> = HashMap::new();
    for entry in base {
        if let Some((key, value)) = entry.split_once('=') {
            env_map.insert(key.to_string(), value.to_string());
        }
    }

    for (key, value) in overrides {
        env_map.insert(key, value);
    }

    let mut env_vec: Vec<String> = env_map
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    env_vec.sort();
    env_vec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_env_overrides_and_sorts() {
        let base = vec!["PATH=/usr/bin".to_string(), "LANG=C".to_string()];
        let merged = merge_env(
            &base,
            vec![
                ("PATH".to_string(), "/opt/bin".to_string()),
                ("DATA_FILE_PATH".to_string(), "/app/state.json".to_string()),
            ],
        );
        assert_eq!(
            merged,
            vec!["DATA_FILE_PATH=/app/state.json", "LANG=C", "PATH=/opt/bin"]
        );
    }

    #[test]
    fn test_merge_env_keeps_values_with_equals() {
        let merged = merge_env(&["OPTS=a=b".to_string()], Vec::new());
        assert_eq!(merged, vec!["OPTS=a=b"]);
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("image.json");
        let config = ImageConfig::new(
            Reference::parse_pinned("python:3.11").unwrap(),
            "/app".into(),
            EntrypointSpec::new("/usr/bin/python".into(), "/app/main.py".into()),
            vec!["A=1".into()],
            vec![],
            vec!["main.py".into()],
        );
        config.save(&path).unwrap();

        let loaded = ImageConfig::load(&path).unwrap();
        assert_eq!(loaded.entrypoint(), config.entrypoint());
        assert_eq!(loaded.base().to_string(), "python:3.11");
        assert_eq!(loaded.created_at(), config.created_at());
    }
}
