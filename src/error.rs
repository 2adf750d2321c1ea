//! Error taxonomy for the POS backend.
//!
//! Three failure classes flow out of the domain modules:
//!
//! - [`PosError::Validation`]: the action is rejected locally before any
//!   backend write; shown inline by the frontend.
//! - [`PosError::Backend`]: a network or write failure with no partial
//!   effects.
//! - [`PosError::PartiallyApplied`]: a multi-step flow (settlement, stock
//!   intake, ledger entry) failed after at least one write landed. The
//!   backend performs no rollback, so the failed step is named explicitly
//!   and the frontend must surface the condition distinctly instead of
//!   masking it as a clean failure.
//!
//! Tauri command wrappers stringify these at the IPC boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PosError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Backend(String),

    #[error("{action} partially applied: {step} failed ({detail})")]
    PartiallyApplied {
        /// The flow that was interrupted, e.g. "settlement".
        action: &'static str,
        /// The step that failed, e.g. "order lines insert".
        step: &'static str,
        detail: String,
    },
}

impl PosError {
    pub fn validation(msg: impl Into<String>) -> Self {
        PosError::Validation(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        PosError::Backend(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, PosError::Validation(_))
    }

    pub fn is_partially_applied(&self) -> bool {
        matches!(self, PosError::PartiallyApplied { .. })
    }
}

impl From<PosError> for String {
    fn from(err: PosError) -> Self {
        err.to_string()
    }
}
