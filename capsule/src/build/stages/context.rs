//! Stage 3: Context copy.
//!
//! Every entry is checked before the first copy, so a missing file never
//! leaves a half-copied workdir behind.

use std::path::PathBuf;

use capsule_shared::errors::{CapsuleError, CapsuleResult};

use crate::build::types::{ContextInput, ContextOutput};
use crate::util::fs::{copy_tree, list_files};

pub fn run(input: ContextInput<'_>) -> CapsuleResult<ContextOutput> {
    let context = input.context;

    let missing = context.missing_entries()?;
    if !missing.is_empty() {
        let listed = missing
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(CapsuleError::ContextCopy(format!(
            "missing from build context {}: {}",
            context.dir().display(),
            listed
        )));
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in context.entries()? {
        let source = context.dir().join(&entry);
        copy_tree(&source, &input.host_workdir.join(&entry)).map_err(|e| {
            CapsuleError::ContextCopy(format!("failed to copy {}: {}", entry.display(), e))
        })?;

        if std::fs::symlink_metadata(&source).is_ok_and(|m| m.is_dir()) {
            let nested = list_files(&source).map_err(|e| CapsuleError::ContextCopy(e.to_string()))?;
            files.extend(nested.into_iter().map(|file| entry.join(file)));
        } else {
            files.push(entry);
        }
    }
    files.sort();
    files.dedup();

    tracing::debug!(files = files.len(), "Copied build context");
    Ok(ContextOutput {
        files,
        manifest: context.manifest(),
    })
}
