//! Page deletion using the S3 DeleteObjects API.

use anyhow::{Result, bail};
use tracing::{debug, warn};

use crate::storage::Storage;
use crate::types::ObjectIdentifier;
use crate::types::error::{DeletionError, is_no_such_bucket_error};
use crate::types::token::{PurgeCancellationToken, run_cancellable};

use super::PageDeletion;

/// Maximum objects per DeleteObjects API call (S3 limit).
pub const MAX_BATCH_SIZE: usize = 1000;

#[derive(Clone)]
pub struct BatchDeleter {
    target: Storage,
}

impl BatchDeleter {
    pub fn new(target: Storage) -> Self {
        Self { target }
    }

    /// Delete one page of identifiers with a single DeleteObjects request.
    ///
    /// An empty page is a no-op and a missing bucket is treated as already
    /// empty; neither issues an error. `force` sends the request with
    /// `BypassGovernanceRetention`. Any other failure of the request itself
    /// is returned, and nothing from this page is counted.
    pub async fn delete_page(
        &self,
        cancellation_token: &PurgeCancellationToken,
        bucket: &str,
        identifiers: &[ObjectIdentifier],
        force: bool,
    ) -> Result<PageDeletion> {
        if identifiers.is_empty() {
            return Ok(PageDeletion::default());
        }
        if identifiers.len() > MAX_BATCH_SIZE {
            bail!(
                "DeleteObjects accepts at most {} objects per request, got {}.",
                MAX_BATCH_SIZE,
                identifiers.len()
            );
        }

        let object_count = identifiers.len();
        debug!(
            bucket = bucket,
            batch_size = object_count,
            bypass_governance_retention = force,
            "sending DeleteObjects batch request."
        );

        let result = run_cancellable(
            cancellation_token,
            self.target.delete_objects(bucket, identifiers.to_vec(), force),
        )
        .await;

        let failures = match result {
            Ok(failures) => failures,
            Err(e) if is_no_such_bucket_error(&e) => {
                debug!(bucket = bucket, "Bucket does not exist. Nothing to delete.");
                return Ok(PageDeletion::default());
            }
            Err(e) => {
                return Err(e.context(format!(
                    "failed to delete {object_count} objects in bucket {bucket}"
                )));
            }
        };

        let mut page = PageDeletion {
            deleted_count: object_count as i64,
            errors: Vec::with_capacity(failures.len()),
        };
        for failure in failures {
            warn!(
                bucket = bucket,
                key = failure.key,
                version_id = failure.version_id,
                code = failure.code,
                message = failure.message,
                "S3 DeleteObjects partial failure for key '{}': {} ({}).",
                failure.key,
                failure.code,
                failure.message,
            );

            page.deleted_count -= 1;
            page.errors.push(DeletionError {
                bucket: bucket.to_string(),
                key: failure.key,
                version_id: failure.version_id.filter(|v| !v.is_empty()),
                code: failure.code,
                message: failure.message,
            });
        }

        debug!(
            bucket = bucket,
            deleted = page.deleted_count,
            failed = page.errors.len(),
            "DeleteObjects batch completed."
        );

        Ok(page)
    }
}
