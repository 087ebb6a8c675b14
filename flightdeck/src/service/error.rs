//! Service error types.

use crate::scheduler::SchedulerError;
use crate::store::StoreError;
use thiserror::Error;

/// Errors that can occur during service operations.
///
/// Lookup problems on the preview path are never errors; they are recorded
/// on the [`Preview`](crate::model::Preview) object instead so the caller
/// can re-render the form.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("provide a date in YYYY-MM-DD format")]
    BadDate,
    #[error("provide airline + flight number or a query like 'AI 157'")]
    BadQuery,
    #[error("no ready preview to confirm")]
    PreviewNotReady,
    #[error("flight not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
