//! Legal hold remediation for versions that refused bulk deletion.

use anyhow::Result;
use tracing::{info, warn};

use crate::storage::Storage;
use crate::types::LegalHoldStatus;
use crate::types::error::{
    DeletionError, RemediationError, RemediationStep, is_cancelled_error, is_not_found_error,
};
use crate::types::token::{PurgeCancellationToken, run_cancellable};

#[derive(Debug, Clone, PartialEq)]
pub enum RemediationOutcome {
    /// The version is gone.
    Deleted,
    Failed(RemediationError),
}

/// Progress of a single remediation. Transitions only move forward, so a
/// version is retried at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemediationState {
    Failed,
    HoldCleared,
    Retried,
}

enum StepResult {
    Done,
    AlreadyGone,
    Failed(String),
}

/// Cancellation is returned as an error; every other failure is a result.
fn step_result(result: Result<()>) -> Result<StepResult> {
    match result {
        Ok(()) => Ok(StepResult::Done),
        Err(e) if is_cancelled_error(&e) => Err(e),
        Err(e) if is_not_found_error(&e) => Ok(StepResult::AlreadyGone),
        Err(e) => Ok(StepResult::Failed(format!("{e:#}"))),
    }
}

#[derive(Clone)]
pub struct LegalHoldRemediator {
    target: Storage,
}

impl LegalHoldRemediator {
    pub fn new(target: Storage) -> Self {
        Self { target }
    }

    /// Only access-denied failures under `force_destroy` are remediated.
    pub fn applies_to(failure: &DeletionError, force_destroy: bool) -> bool {
        force_destroy && failure.is_access_denied()
    }

    /// Clear the legal hold of the failed version, then delete it with a
    /// single DeleteObject call.
    ///
    /// A version that turns out to be already gone at either step counts as
    /// deleted. Failures are returned as [`RemediationOutcome::Failed`]; only
    /// cancellation is returned as `Err`.
    pub async fn remediate(
        &self,
        cancellation_token: &PurgeCancellationToken,
        failure: &DeletionError,
        bypass_governance_retention: bool,
    ) -> Result<RemediationOutcome> {
        let bucket = failure.bucket.as_str();
        let object = failure.identifier();
        let failed = |step, cause| {
            warn!(
                bucket = bucket,
                key = failure.key,
                version_id = failure.version_id,
                "Legal hold remediation failed for key '{}' while {}: {}",
                failure.key,
                step,
                cause,
            );
            RemediationOutcome::Failed(RemediationError {
                deletion: failure.clone(),
                step,
                cause,
            })
        };

        let mut state = RemediationState::Failed;
        loop {
            state = match state {
                RemediationState::Failed => {
                    let result = run_cancellable(
                        cancellation_token,
                        self.target.put_object_legal_hold(bucket, &object, LegalHoldStatus::Off),
                    )
                    .await;
                    match step_result(result)? {
                        StepResult::Done => RemediationState::HoldCleared,
                        StepResult::AlreadyGone => RemediationState::Retried,
                        StepResult::Failed(cause) => {
                            return Ok(failed(RemediationStep::ClearLegalHold, cause));
                        }
                    }
                }
                RemediationState::HoldCleared => {
                    let result = run_cancellable(
                        cancellation_token,
                        self.target.delete_object(bucket, &object, bypass_governance_retention),
                    )
                    .await;
                    match step_result(result)? {
                        StepResult::Done | StepResult::AlreadyGone => RemediationState::Retried,
                        StepResult::Failed(cause) => {
                            return Ok(failed(RemediationStep::RetryDelete, cause));
                        }
                    }
                }
                RemediationState::Retried => {
                    info!(
                        bucket = bucket,
                        key = failure.key,
                        version_id = failure.version_id,
                        "Cleared legal hold and deleted key '{}'.",
                        failure.key,
                    );
                    return Ok(RemediationOutcome::Deleted);
                }
            };
        }
    }
}
