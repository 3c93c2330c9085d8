//! Process launcher.
//!
//! Every launch gets a private copy of the image rootfs under
//! `tmp/instance-<ulid>-*/rootfs` and starts exactly one process in it:
//!
//! ```text
//! <instance><interpreter> <instance><app_file> <args...>    (cwd: <instance><workdir>)
//! ```
//!
//! The committed image is never written to, and instances never see each
//! other's files. The copy is removed once the process exits.
//!
//! Standard streams are inherited, the caller's environment is overlaid with
//! the image environment and then the launch overrides. The process's exit
//! code is returned verbatim (`128 + signal` when it was killed). Nothing is
//! installed, retried or supervised.

pub mod state;

pub use state::LaunchState;

use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::Stdio;

use capsule_shared::constants::exit_codes;
use capsule_shared::errors::{CapsuleError, CapsuleResult};
use serde::Serialize;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::Instrument;

use crate::images::Image;
use crate::runtime::constants::launch::INSTANCE_PREFIX;
use crate::runtime::layout::{dirs, resolve_in_rootfs};
use crate::runtime::lock::StoreLock;
use crate::runtime::options::LaunchOptions;
use crate::runtime::types::{ImageId, InstanceId};
use crate::util::fs::{copy_tree, set_files_writable};

/// Result of one launch.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchOutcome {
    pub instance_id: String,
    pub image_id: ImageId,
    /// Exit code of the process, `128 + signal` if it was killed.
    pub exit_code: i32,
    /// Terminating signal, if any.
    pub signal: Option<i32>,
}

/// Launch the image's entrypoint with `args` appended.
///
/// `scratch_dir` holds the instance copy for the lifetime of the process.
/// `store_lock` keeps the image from being removed while it is copied and is
/// released before the process starts.
pub async fn launch(
    image: &Image,
    args: &[String],
    options: &LaunchOptions,
    scratch_dir: &Path,
    store_lock: StoreLock,
) -> CapsuleResult<LaunchOutcome> {
    let instance_id = InstanceId::generate();
    let span = tracing::info_span!(
        "launch",
        instance_id = %instance_id,
        image_id = %image.id().short()
    );
    run(image, args, options, scratch_dir, store_lock, instance_id)
        .instrument(span)
        .await
}

async fn run(
    image: &Image,
    args: &[String],
    options: &LaunchOptions,
    scratch_dir: &Path,
    store_lock: StoreLock,
    instance_id: InstanceId,
) -> CapsuleResult<LaunchOutcome> {
    let mut state = LaunchState::Unstarted;

    let instance = instantiate(image, scratch_dir, &instance_id);
    drop(store_lock);
    let prepared = instance
        .and_then(|instance| prepare(image, &instance, args, options).map(|cmd| (instance, cmd)));
    let (instance, mut command) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            state.transition_to(LaunchState::CrashedBeforeStart)?;
            tracing::warn!(%state, "Launch failed before start: {}", e);
            return Err(e);
        }
    };

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            state.transition_to(LaunchState::CrashedBeforeStart)?;
            let entrypoint = image.config().entrypoint();
            let message = format!(
                "{} {}: {}",
                entrypoint.interpreter().display(),
                entrypoint.app_file().display(),
                e
            );
            tracing::warn!(%state, "Spawn failed: {}", message);
            return Err(match e.kind() {
                std::io::ErrorKind::NotFound => CapsuleError::EntrypointMissing(message),
                _ => CapsuleError::Execution(message),
            });
        }
    };

    let pid = child.id().unwrap_or_default();
    state.transition_to(LaunchState::Running { pid })?;
    tracing::info!(pid, args = args.len(), "Process started");

    let status = child
        .wait()
        .await
        .map_err(|e| CapsuleError::Internal(format!("failed to wait for pid {pid}: {e}")))?;

    let signal = status.signal();
    let exit_code = match (status.code(), signal) {
        (Some(code), _) => code,
        (None, Some(signal)) => exit_codes::SIGNAL_BASE + signal,
        (None, None) => exit_codes::GENERAL_FAILURE,
    };
    state.transition_to(LaunchState::Exited { code: exit_code })?;

    match signal {
        Some(signal) => tracing::info!(
            pid,
            exit_code,
            signal = signal_name(signal),
            "Process killed by signal"
        ),
        None => tracing::info!(pid, exit_code, "Process exited"),
    }

    let instance_dir = instance.path().to_path_buf();
    if let Err(e) = instance.close() {
        tracing::warn!(
            instance_dir = %instance_dir.display(),
            "Failed to remove instance copy: {}",
            e
        );
    }

    Ok(LaunchOutcome {
        instance_id: instance_id.to_string(),
        image_id: image.id().clone(),
        exit_code,
        signal,
    })
}

/// Copy the image rootfs into a fresh instance directory.
///
/// Committed image files are read-only; the copy gives the owner write
/// access back so the process can update files it shipped with.
fn instantiate(
    image: &Image,
    scratch_dir: &Path,
    instance_id: &InstanceId,
) -> CapsuleResult<TempDir> {
    let instance = tempfile::Builder::new()
        .prefix(&format!("{INSTANCE_PREFIX}{instance_id}-"))
        .tempdir_in(scratch_dir)
        .map_err(|e| CapsuleError::Storage(format!("failed to create instance dir: {e}")))?;

    let rootfs = instance.path().join(dirs::ROOTFS_DIR);
    let files = copy_tree(&image.rootfs_dir(), &rootfs)?;
    set_files_writable(&rootfs, true)?;

    tracing::debug!(
        instance_dir = %instance.path().display(),
        files,
        "Created instance copy"
    );
    Ok(instance)
}

/// Resolve the frozen entrypoint inside the instance copy and build the
/// command.
fn prepare(
    image: &Image,
    instance: &TempDir,
    args: &[String],
    options: &LaunchOptions,
) -> CapsuleResult<Command> {
    let config = image.config();
    let entrypoint = config.entrypoint();
    let rootfs = instance.path().join(dirs::ROOTFS_DIR);

    let app_file = resolve_in_rootfs(&rootfs, entrypoint.app_file())?;
    if !app_file.is_file() {
        return Err(CapsuleError::EntrypointMissing(format!(
            "{} is not present in image {}",
            entrypoint.app_file().display(),
            image.id().short()
        )));
    }

    let interpreter = resolve_in_rootfs(&rootfs, entrypoint.interpreter())?;
    if !interpreter.exists() {
        return Err(CapsuleError::EntrypointMissing(format!(
            "interpreter {} is not present in image {}",
            entrypoint.interpreter().display(),
            image.id().short()
        )));
    }

    let workdir = resolve_in_rootfs(&rootfs, config.workdir())?;
    if !workdir.is_dir() {
        return Err(CapsuleError::Execution(format!(
            "working directory {} is not present in image {}",
            config.workdir().display(),
            image.id().short()
        )));
    }

    tracing::debug!(
        interpreter = %entrypoint.interpreter().display(),
        app_file = %entrypoint.app_file().display(),
        "Resolved entrypoint"
    );

    let mut command = Command::new(&interpreter);
    command
        .arg(&app_file)
        .args(args)
        .current_dir(&workdir)
        .envs(config.env().iter().filter_map(|entry| entry.split_once('=')))
        .envs(options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    Ok(command)
}

fn signal_name(signal: i32) -> &'static str {
    nix::sys::signal::Signal::try_from(signal)
        .map(|s| s.as_str())
        .unwrap_or("unknown")
}
