//! Build recipe (`capsule.yaml`).
//!
//! ```yaml
//! base: python:3.11-slim      # pinned name:tag
//! workdir: /app               # default /app
//! files: [main.py, data/]     # default: the whole context
//! manifest: requirements.txt  # default: requirements.txt when present
//! entrypoint: main.py         # relative to workdir
//! env:
//!   DATA_FILE_PATH: /app/game_state.json
//! ```

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use capsule_shared::errors::{CapsuleError, CapsuleResult};
use serde::Deserialize;

use crate::runtime::constants::build::DEFAULT_WORKDIR;
use crate::runtime::layout::resolve_in_rootfs;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildRecipe {
    /// Pinned base runtime reference
    pub base: String,

    /// Image-absolute working directory
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    /// Context-relative files or directories to copy; `None` copies the
    /// whole context
    #[serde(default)]
    pub files: Option<Vec<PathBuf>>,

    /// Context-relative dependency manifest
    #[serde(default)]
    pub manifest: Option<PathBuf>,

    /// Application file, relative to the workdir (and to the context)
    pub entrypoint: PathBuf,

    /// Environment added on top of the base runtime's
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_workdir() -> PathBuf {
    PathBuf::from(DEFAULT_WORKDIR)
}

impl BuildRecipe {
    pub fn load(path: &Path) -> CapsuleResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CapsuleError::InvalidArgument(format!(
                "cannot read build recipe {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
            .map_err(|e| CapsuleError::InvalidArgument(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> CapsuleResult<Self> {
        let recipe: Self = serde_yaml::from_str(content)
            .map_err(|e| CapsuleError::InvalidArgument(format!("invalid build recipe: {e}")))?;
        recipe.validate()?;
        Ok(recipe)
    }

    pub(crate) fn validate(&self) -> CapsuleResult<()> {
        resolve_in_rootfs(Path::new("/"), &self.workdir)
            .map_err(|e| CapsuleError::InvalidArgument(format!("workdir: {e}")))?;

        validate_relative("entrypoint", &self.entrypoint)?;
        if let Some(manifest) = &self.manifest {
            validate_relative("manifest", manifest)?;
        }
        for file in self.files.iter().flatten() {
            validate_relative("files", file)?;
        }

        if let Some(key) = self
            .env
            .keys()
            .find(|key| key.is_empty() || key.contains('='))
        {
            return Err(CapsuleError::InvalidArgument(format!(
                "env: invalid variable name '{key}'"
            )));
        }
        Ok(())
    }

    /// Image-absolute path of the application file.
    pub fn app_file(&self) -> PathBuf {
        self.workdir.join(&self.entrypoint)
    }
}

/// Context paths stay inside the context.
fn validate_relative(field: &str, path: &Path) -> CapsuleResult<()> {
    let escapes = path.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if path.as_os_str().is_empty() || escapes {
        return Err(CapsuleError::InvalidArgument(format!(
            "{field}: '{}' must be a relative path inside the build context",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_recipe() {
        let recipe = BuildRecipe::parse(
            "base: python:3.11-slim\n\
             workdir: /srv/bot\n\
             files: [main.py, assets]\n\
             manifest: deps/requirements.txt\n\
             entrypoint: main.py\n\
             env:\n  DATA_FILE_PATH: /srv/bot/state.json\n",
        )
        .unwrap();

        assert_eq!(recipe.base, "python:3.11-slim");
        assert_eq!(recipe.app_file(), PathBuf::from("/srv/bot/main.py"));
        assert_eq!(
            recipe.files,
            Some(vec![PathBuf::from("main.py"), PathBuf::from("assets")])
        );
        assert_eq!(
            recipe.env.get("DATA_FILE_PATH").map(String::as_str),
            Some("/srv/bot/state.json")
        );
    }

    #[test]
    fn test_defaults() {
        let recipe = BuildRecipe::parse("base: python:3.11\nentrypoint: main.py\n").unwrap();
        assert_eq!(recipe.workdir, PathBuf::from("/app"));
        assert_eq!(recipe.files, None);
        assert_eq!(recipe.manifest, None);
        assert!(recipe.env.is_empty());
    }

    #[test]
    fn test_rejects_invalid_recipes() {
        for content in [
            "entrypoint: main.py\n",
            "base: python:3.11\n",
            "base: python:3.11\nentrypoint: main.py\nworkdir: app\n",
            "base: python:3.11\nentrypoint: main.py\nworkdir: /app/../..\n",
            "base: python:3.11\nentrypoint: ../main.py\n",
            "base: python:3.11\nentrypoint: /main.py\n",
            "base: python:3.11\nentrypoint: main.py\nfiles: [../secret]\n",
            "base: python:3.11\nentrypoint: main.py\nenv: {\"A=B\": x}\n",
            "base: python:3.11\nentrypoint: main.py\ncmd: [python]\n",
        ] {
            let err = BuildRecipe::parse(content).unwrap_err();
            assert!(
                matches!(err, CapsuleError::InvalidArgument(_)),
                "{content:?}: {err}"
            );
        }
    }
}
