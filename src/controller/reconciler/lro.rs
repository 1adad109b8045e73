//! # Long-Running Operations
//!
//! Drives one step of a remote create-or-update. A reconciliation never
//! blocks on the operation: it polls once, then either finishes or hands back
//! the token to persist so the next invocation continues the same operation.

use crate::provider::{GatewayError, GatewayResult, OperationPoller, PollState};

/// Result of one resume step
#[derive(Debug, PartialEq, Eq)]
pub enum LroOutcome<T> {
    /// Terminal success with the remote resource
    Succeeded(T),
    /// Still running; persist this token and check again later
    InProgress(String),
    /// Terminal failure; the token must be discarded
    Failed(GatewayError),
}

/// Poll once and classify the operation
///
/// # Errors
/// Transient failures while polling are returned as `Err` so the caller
/// retries with the token still persisted.
pub async fn resume_operation<T: Send>(
    poller: &mut dyn OperationPoller<T>,
) -> GatewayResult<LroOutcome<T>> {
    match poller.poll().await {
        Ok(PollState::Failed(reason)) => {
            return Ok(LroOutcome::Failed(GatewayError::OperationFailed(reason)));
        }
        Ok(_) => {}
        Err(e) if e.is_transient() => return Err(e),
        Err(e) => return Ok(LroOutcome::Failed(e)),
    }

    if poller.is_done() {
        return Ok(match poller.result().await {
            Ok(result) => LroOutcome::Succeeded(result),
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => LroOutcome::Failed(e),
        });
    }

    match poller.resume_token() {
        Ok(token) => Ok(LroOutcome::InProgress(token)),
        Err(e) => Ok(LroOutcome::Failed(e)),
    }
}
