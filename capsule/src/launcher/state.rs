//! Launch lifecycle state machine.
//!
//! ```text
//! Unstarted ──spawn──→ Running ──wait──→ Exited(code)
//!     │
//!     └──entrypoint missing / spawn failed──→ CrashedBeforeStart
//! ```
//!
//! One launch, one process, one outcome: no transition leaves a terminal
//! state.

use std::fmt;

use capsule_shared::errors::{CapsuleError, CapsuleResult};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LaunchState {
    /// Entrypoint not yet resolved, no process.
    Unstarted,

    /// Process spawned and not yet reaped.
    Running { pid: u32 },

    /// Process ended; `code` is its exit code (`128 + signal` when killed).
    Exited { code: i32 },

    /// No process was ever started.
    CrashedBeforeStart,
}

impl LaunchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LaunchState::Exited { .. } | LaunchState::CrashedBeforeStart
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(self, LaunchState::Running { .. })
    }

    /// Check if transition to target state is valid.
    pub fn can_transition_to(&self, target: LaunchState) -> bool {
        use LaunchState::*;
        matches!(
            (self, target),
            (Unstarted, Running { .. })
                | (Unstarted, CrashedBeforeStart)
                | (Running { .. }, Exited { .. })
        )
    }

    /// Attempt state transition with validation.
    pub fn transition_to(&mut self, target: LaunchState) -> CapsuleResult<()> {
        if !self.can_transition_to(target) {
            return Err(CapsuleError::InvalidState(format!(
                "Cannot transition from {self} to {target}"
            )));
        }
        tracing::trace!(from = %self, to = %target, "Launch state change");
        *self = target;
        Ok(())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchState::Unstarted => "unstarted",
            LaunchState::Running { .. } => "running",
            LaunchState::Exited { .. } => "exited",
            LaunchState::CrashedBeforeStart => "crashed_before_start",
        }
    }
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchState::Running { pid } => write!(f, "running (pid {pid})"),
            LaunchState::Exited { code } => write!(f, "exited ({code})"),
            other => f.write_str(other.as_str()),
        }
    }
}
