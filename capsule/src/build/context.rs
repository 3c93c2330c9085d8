//! Build context: the directory a build reads application files from.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use capsule_shared::constants::filenames;
use capsule_shared::errors::{CapsuleError, CapsuleResult};

use super::recipe::BuildRecipe;
use crate::util::fs::list_files;

#[derive(Debug, Clone)]
pub struct BuildContext {
    dir: PathBuf,
    recipe_path: PathBuf,
    recipe: BuildRecipe,
}

impl BuildContext {
    /// Open a context directory with its recipe (default `capsule.yaml`
    /// inside the context).
    pub fn open(dir: &Path, recipe_path: Option<&Path>) -> CapsuleResult<Self> {
        let dir = canonical_dir(dir)?;
        let recipe_path = recipe_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dir.join(filenames::RECIPE));
        let recipe = BuildRecipe::load(&recipe_path)?;
        let recipe_path = recipe_path.canonicalize().unwrap_or(recipe_path);

        Ok(Self {
            dir,
            recipe_path,
            recipe,
        })
    }

    /// Build from an already-parsed recipe.
    pub fn with_recipe(dir: &Path, recipe: BuildRecipe) -> CapsuleResult<Self> {
        recipe.validate()?;
        let dir = canonical_dir(dir)?;
        Ok(Self {
            recipe_path: dir.join(filenames::RECIPE),
            dir,
            recipe,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn recipe(&self) -> &BuildRecipe {
        &self.recipe
    }

    /// Context-relative manifest path: the declared one, else
    /// `requirements.txt` when the context has one.
    pub fn manifest(&self) -> Option<PathBuf> {
        match &self.recipe.manifest {
            Some(manifest) => Some(manifest.clone()),
            None => {
                let default = PathBuf::from(filenames::MANIFEST);
                self.dir.join(&default).is_file().then_some(default)
            }
        }
    }

    /// Entries to copy: declared files (or the whole context), the manifest
    /// and the entrypoint, deduplicated and sorted.
    pub fn entries(&self) -> CapsuleResult<Vec<PathBuf>> {
        let mut entries: BTreeSet<PathBuf> = match &self.recipe.files {
            Some(files) => files.iter().cloned().collect(),
            None => list_files(&self.dir)
                .map_err(|e| CapsuleError::ContextCopy(e.to_string()))?
                .into_iter()
                .filter(|path| self.dir.join(path) != self.recipe_path)
                .collect(),
        };
        entries.extend(self.manifest());
        entries.insert(self.recipe.entrypoint.clone());
        Ok(entries.into_iter().collect())
    }

    /// Every entry that does not exist in the context.
    pub fn missing_entries(&self) -> CapsuleResult<Vec<PathBuf>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|entry| std::fs::symlink_metadata(self.dir.join(entry)).is_err())
            .collect())
    }
}

fn canonical_dir(dir: &Path) -> CapsuleResult<PathBuf> {
    let canonical = dir.canonicalize().map_err(|e| {
        CapsuleError::ContextCopy(format!(
            "build context {} is not accessible: {}",
            dir.display(),
            e
        ))
    })?;
    if !canonical.is_dir() {
        return Err(CapsuleError::ContextCopy(format!(
            "build context {} is not a directory",
            dir.display()
        )));
    }
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn context(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn test_whole_context_excludes_recipe() {
        let dir = context(&[
            ("capsule.yaml", "base: python:3.11\nentrypoint: main.py\n"),
            ("main.py", ""),
            ("lib/util.py", ""),
            ("requirements.txt", "six\n"),
        ]);
        let ctx = BuildContext::open(dir.path(), None).unwrap();

        assert_eq!(ctx.manifest(), Some(PathBuf::from("requirements.txt")));
        assert_eq!(
            ctx.entries().unwrap(),
            vec![
                PathBuf::from("lib/util.py"),
                PathBuf::from("main.py"),
                PathBuf::from("requirements.txt"),
            ]
        );
        assert!(ctx.missing_entries().unwrap().is_empty());
    }

    #[test]
    fn test_declared_files_add_manifest_and_entrypoint() {
        let dir = context(&[
            (
                "capsule.yaml",
                "base: python:3.11\nentrypoint: main.py\nfiles: [data.json, extra.py]\n",
            ),
            ("data.json", "{}"),
        ]);
        let ctx = BuildContext::open(dir.path(), None).unwrap();

        assert_eq!(ctx.manifest(), None);
        assert_eq!(
            ctx.missing_entries().unwrap(),
            vec![PathBuf::from("extra.py"), PathBuf::from("main.py")]
        );
    }

    #[test]
    fn test_missing_recipe() {
        let dir = context(&[("main.py", "")]);
        let err = BuildContext::open(dir.path(), None).unwrap_err();
        assert!(matches!(err, CapsuleError::InvalidArgument(_)));
    }

    #[test]
    fn test_missing_context_dir() {
        let dir = TempDir::new().unwrap();
        let err = BuildContext::open(&dir.path().join("nope"), None).unwrap_err();
        assert!(matches!(err, CapsuleError::ContextCopy(_)));
    }
}
