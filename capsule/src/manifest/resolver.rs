//! Requirement resolution against a package index.

use std::path::PathBuf;

use capsule_shared::errors::{CapsuleError, CapsuleResult};
use serde::{Deserialize, Serialize};

use super::{DependencyManifest, Version};

/// Source of installable package versions.
pub trait PackageIndex {
    /// Available versions of a package, `None` when the package is unknown.
    fn versions(&self, normalized_name: &str) -> CapsuleResult<Option<Vec<Version>>>;

    /// Directory holding the files of one package version.
    fn package_path(&self, normalized_name: &str, version: &Version) -> PathBuf;
}

/// A requirement pinned to one version of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: Version,
}

/// Resolve every requirement to the highest version satisfying all of its
/// constraints, in manifest order.
///
/// Fails with `DependencyResolution` listing every unknown package and every
/// unsatisfiable constraint. Resolution is a pure function of the manifest and
/// the index contents.
pub fn resolve(
    manifest: &DependencyManifest,
    index: &dyn PackageIndex,
) -> CapsuleResult<Vec<ResolvedPackage>> {
    let mut resolved = Vec::new();
    let mut problems = Vec::new();

    for requirement in manifest.merged() {
        let Some(available) = index.versions(&requirement.normalized)? else {
            problems.push(format!(
                "line {}: package '{}' is not in the base runtime index",
                requirement.line, requirement.name
            ));
            continue;
        };

        match requirement.constraint.best_match(&available) {
            Some(version) => {
                tracing::debug!(
                    package = %requirement.normalized,
                    constraint = %requirement.constraint,
                    version = %version,
                    "Resolved requirement"
                );
                resolved.push(ResolvedPackage {
                    name: requirement.normalized.clone(),
                    version: version.clone(),
                });
            }
            None => {
                let mut listed: Vec<&Version> = available.iter().collect();
                listed.sort();
                let listed = listed
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                problems.push(format!(
                    "line {}: no version of '{}' satisfies '{}' (available: {})",
                    requirement.line,
                    requirement.name,
                    requirement.constraint,
                    if listed.is_empty() { "none" } else { listed.as_str() }
                ));
            }
        }
    }

    if !problems.is_empty() {
        return Err(CapsuleError::DependencyResolution(problems.join("; ")));
    }
    Ok(resolved)
}
