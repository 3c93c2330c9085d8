//! Installation of a resolved package set into a staged `site_packages`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use capsule_shared::errors::{CapsuleError, CapsuleResult};
use rayon::prelude::*;

use super::{PackageIndex, ResolvedPackage};
use crate::util::fs::{copy_tree, list_files};

/// Copy every resolved package into `site_packages`.
///
/// The file sets are checked up front: two packages that would write the same
/// path fail the install with `DependencyResolution` before anything is
/// copied. Disjoint sets are then copied in parallel. Returns the number of
/// files installed.
pub fn install(
    packages: &[ResolvedPackage],
    index: &(dyn PackageIndex + Sync),
    site_packages: &Path,
) -> CapsuleResult<usize> {
    if packages.is_empty() {
        return Ok(0);
    }

    let sources: Vec<(&ResolvedPackage, PathBuf)> = packages
        .iter()
        .map(|package| (package, index.package_path(&package.name, &package.version)))
        .collect();

    check_conflicts(&sources)?;

    std::fs::create_dir_all(site_packages).map_err(|e| {
        CapsuleError::DependencyResolution(format!(
            "failed to create {}: {}",
            site_packages.display(),
            e
        ))
    })?;

    let counts = sources
        .par_iter()
        .map(|(package, source)| {
            let files = copy_tree(source, site_packages).map_err(|e| {
                CapsuleError::DependencyResolution(format!(
                    "failed to install {}=={}: {}",
                    package.name, package.version, e
                ))
            })?;
            tracing::debug!(
                package = %package.name,
                version = %package.version,
                files,
                "Installed package"
            );
            Ok(files)
        })
        .collect::<CapsuleResult<Vec<usize>>>()?;

    Ok(counts.into_iter().sum())
}

fn check_conflicts(sources: &[(&ResolvedPackage, PathBuf)]) -> CapsuleResult<()> {
    let mut owners: BTreeMap<PathBuf, &ResolvedPackage> = BTreeMap::new();
    let mut conflicts = Vec::new();

    for (package, source) in sources {
        if !source.is_dir() {
            return Err(CapsuleError::DependencyResolution(format!(
                "{}=={} has no files in the base runtime index ({})",
                package.name,
                package.version,
                source.display()
            )));
        }
        let files = list_files(source).map_err(|e| {
            CapsuleError::DependencyResolution(format!(
                "failed to list {}=={}: {}",
                package.name, package.version, e
            ))
        })?;

        for file in files {
            if let Some(owner) = owners.get(&file) {
                conflicts.push(format!(
                    "{} is installed by both {}=={} and {}=={}",
                    file.display(),
                    owner.name,
                    owner.version,
                    package.name,
                    package.version
                ));
            } else {
                owners.insert(file, package);
            }
        }
    }

    if !conflicts.is_empty() {
        return Err(CapsuleError::DependencyResolution(conflicts.join("; ")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Version;
    use std::fs;
    use tempfile::TempDir;

    struct DirIndex {
        root: PathBuf,
    }

    impl PackageIndex for DirIndex {
        fn versions(&self, _normalized_name: &str) -> CapsuleResult<Option<Vec<Version>>> {
            Ok(None)
        }

        fn package_path(&self, normalized_name: &str, version: &Version) -> PathBuf {
            self.root.join(normalized_name).join(version.as_str())
        }
    }

    fn package(root: &Path, name: &str, version: &str, files: &[&str]) -> ResolvedPackage {
        for file in files {
            let path = root.join(name).join(version).join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, format!("{name} {version}")).unwrap();
        }
        ResolvedPackage {
            name: name.to_string(),
            version: version.parse().unwrap(),
        }
    }

    #[test]
    fn test_installs_disjoint_packages() {
        let dir = TempDir::new().unwrap();
        let index = DirIndex {
            root: dir.path().join("index"),
        };
        let packages = vec![
            package(&index.root, "alpha", "1.0", &["alpha/__init__.py", "alpha/core.py"]),
            package(&index.root, "beta", "2.1", &["beta/__init__.py"]),
        ];

        let site = dir.path().join("site");
        assert_eq!(install(&packages, &index, &site).unwrap(), 3);
        assert_eq!(
            fs::read_to_string(site.join("alpha/core.py")).unwrap(),
            "alpha 1.0"
        );
        assert!(site.join("beta/__init__.py").is_file());
    }

    #[test]
    fn test_conflicting_files_fail_before_copy() {
        let dir = TempDir::new().unwrap();
        let index = DirIndex {
            root: dir.path().join("index"),
        };
        let packages = vec![
            package(&index.root, "alpha", "1.0", &["shared/util.py"]),
            package(&index.root, "beta", "1.0", &["shared/util.py"]),
        ];

        let site = dir.path().join("site");
        let err = install(&packages, &index, &site).unwrap_err();
        assert!(matches!(err, CapsuleError::DependencyResolution(_)));
        assert!(err.to_string().contains("shared/util.py"));
        assert!(!site.exists());
    }

    #[test]
    fn test_missing_version_directory() {
        let dir = TempDir::new().unwrap();
        let index = DirIndex {
            root: dir.path().join("index"),
        };
        let packages = vec![ResolvedPackage {
            name: "ghost".into(),
            version: "1.0".parse().unwrap(),
        }];

        let err = install(&packages, &index, &dir.path().join("site")).unwrap_err();
        assert!(matches!(err, CapsuleError::DependencyResolution(_)));
    }
}
