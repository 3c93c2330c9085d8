//! Dependency manifests (`requirements.txt` style).
//!
//! One requirement per line, consumed in file order:
//!
//! ```text
//! # comment
//! requests==2.31.0
//! numpy>=1.24,<2      # trailing comments are fine
//! rich[jupyter]~=13.7 # extras are accepted and ignored
//! ```
//!
//! Pip options (`-r`, `--index-url`), direct URLs and environment markers
//! are rejected: the only package source is the base runtime's index.

mod install;
mod resolver;
pub mod version;

pub use install::install;
pub use resolver::{PackageIndex, ResolvedPackage, resolve};
pub use version::{Version, VersionConstraint};

use std::path::Path;

use capsule_shared::errors::{CapsuleError, CapsuleResult};

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Name as written in the manifest.
    pub name: String,
    /// Normalized name used for index lookups.
    pub normalized: String,
    pub constraint: VersionConstraint,
    /// 1-based line number in the manifest.
    pub line: usize,
}

/// Parsed dependency manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyManifest {
    requirements: Vec<Requirement>,
}

impl DependencyManifest {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> CapsuleResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CapsuleError::DependencyResolution(format!(
                "failed to read manifest {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    /// Parse manifest text. Every malformed line is reported.
    pub fn parse(content: &str) -> CapsuleResult<Self> {
        let mut requirements = Vec::new();
        let mut problems = Vec::new();

        for (index, raw) in content.lines().enumerate() {
            let line = index + 1;
            let text = strip_comment(raw).trim();
            if text.is_empty() {
                continue;
            }
            match parse_requirement(text) {
                Ok((name, constraint)) => requirements.push(Requirement {
                    normalized: normalize_name(&name),
                    name,
                    constraint,
                    line,
                }),
                Err(reason) => problems.push(format!("line {line}: {reason}")),
            }
        }

        if !problems.is_empty() {
            return Err(CapsuleError::DependencyResolution(problems.join("; ")));
        }
        Ok(Self { requirements })
    }

    /// Requirements in file order, one entry per line.
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// One requirement per package: repeated names keep the first position
    /// and carry the constraints of every occurrence.
    pub fn merged(&self) -> Vec<Requirement> {
        let mut merged: Vec<Requirement> = Vec::new();
        for requirement in &self.requirements {
            match merged
                .iter_mut()
                .find(|existing| existing.normalized == requirement.normalized)
            {
                Some(existing) => existing.constraint.extend(&requirement.constraint),
                None => merged.push(requirement.clone()),
            }
        }
        merged
    }
}

/// Lowercase, with every run of `-`, `_` and `.` collapsed to one `-`.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                normalized.push('-');
            }
            in_separator = true;
        } else {
            normalized.push(c.to_ascii_lowercase());
            in_separator = false;
        }
    }
    normalized
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_requirement(text: &str) -> Result<(String, VersionConstraint), String> {
    if text.starts_with('-') {
        return Err(format!("pip options are not supported: '{text}'"));
    }
    if text.contains("://") || text.contains('@') {
        return Err(format!("direct references are not supported: '{text}'"));
    }
    if text.contains(';') {
        return Err(format!("environment markers are not supported: '{text}'"));
    }

    let name_end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(text.len());
    let name = &text[..name_end];
    validate_name(name)?;

    let mut rest = text[name_end..].trim_start();
    if let Some(after_open) = rest.strip_prefix('[') {
        let close = after_open
            .find(']')
            .ok_or_else(|| format!("unterminated extras in '{text}'"))?;
        rest = after_open[close + 1..].trim_start();
    }

    let constraint = rest
        .parse::<VersionConstraint>()
        .map_err(|reason| format!("{name}: {reason}"))?;
    Ok((name.to_string(), constraint))
}

fn validate_name(name: &str) -> Result<(), String> {
    let first = name.chars().next();
    let last = name.chars().last();
    match (first, last) {
        (Some(first), Some(last)) if first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric() => {
            Ok(())
        }
        (None, _) | (_, None) => Err("missing package name".into()),
        _ => Err(format!(
            "package name '{name}' must start and end with a letter or digit"
        )),
    }
}
