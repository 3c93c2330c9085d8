//! Stage 5: Entrypoint.
//!
//! Freezes `<interpreter> <app_file>` and the environment into the image
//! config. Nothing changes them after this point.

use capsule_shared::errors::{CapsuleError, CapsuleResult};

use crate::build::types::{EntrypointInput, EntrypointOutput};
use crate::images::{EntrypointSpec, ImageConfig, merge_env};
use crate::runtime::layout::resolve_in_rootfs;

pub fn run(input: EntrypointInput<'_>) -> CapsuleResult<EntrypointOutput> {
    let recipe = input.context.recipe();
    let app_file = recipe.app_file();

    let host_app = resolve_in_rootfs(input.rootfs, &app_file)?;
    if std::fs::symlink_metadata(&host_app).is_err() {
        return Err(CapsuleError::ContextCopy(format!(
            "entrypoint {} is missing from the staged image",
            app_file.display()
        )));
    }

    let runtime_config = input.runtime.config();
    let entrypoint = EntrypointSpec::new(runtime_config.interpreter.clone(), app_file);
    let env = merge_env(
        &runtime_config.env,
        recipe.env.iter().map(|(k, v)| (k.clone(), v.clone())),
    );

    tracing::debug!(
        interpreter = %entrypoint.interpreter().display(),
        app_file = %entrypoint.app_file().display(),
        "Froze entrypoint"
    );

    let config = ImageConfig::new(
        input.runtime.reference().clone(),
        recipe.workdir.clone(),
        entrypoint,
        env,
        input.packages,
        input.files,
    );
    Ok(EntrypointOutput { config })
}
