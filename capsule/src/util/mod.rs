pub mod fs;

use std::path::Path;

use capsule_shared::errors::{CapsuleError, CapsuleResult};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Log file name prefix under `logs/` (rotated daily)
const LOG_FILE_PREFIX: &str = "capsule.log";

/// Initialize tracing with stderr and file output.
///
/// `RUST_LOG` takes precedence over `default_directive`. Stderr gets the
/// filtered, human-readable stream; `logs_dir` receives the same events
/// without ANSI colors. Returns the `WorkerGuard` that keeps the background
/// writer alive; dropping it flushes the file.
pub fn init_logging(logs_dir: &Path, default_directive: &str) -> CapsuleResult<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)
        .map_err(|e| CapsuleError::Storage(format!("failed to create logs dir: {e}")))?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| CapsuleError::InvalidArgument(format!("invalid log filter: {e}")))?;

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false),
        )
        .try_init();

    Ok(guard)
}
