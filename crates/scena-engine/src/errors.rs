//! Engine error types
//!
//! The engine deliberately has a small error surface: lifecycle guard
//! violations (double-end, double-terminate, start-while-terminated) are
//! silently absorbed per the coordination contract and only logged. Errors
//! here cover genuine caller misuse.

use scena_core::identifiers::CoordinatorId;
use thiserror::Error;

/// Errors returned to callers of the coordination engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The referenced coordinator is not in the tree.
    #[error("unknown coordinator: {0}")]
    UnknownCoordinator(CoordinatorId),

    /// The referenced coordinator has terminated and cannot host stages.
    #[error("coordinator has terminated: {0}")]
    CoordinatorTerminated(CoordinatorId),

    /// The operation requires a running stage.
    #[error("stage is not running")]
    StageNotRunning,
}
