//! Drives a bucket (or a prefix of it) to the empty state.
//!
//! Emptying a versioned bucket runs two phases, strictly in sequence:
//!
//! 1. **Versions**: every object version is listed and bulk deleted. With
//!    `force_destroy`, versions refused with `AccessDenied` go through legal
//!    hold remediation.
//! 2. **Delete markers**: a fresh listing removes the tombstones left
//!    behind, without remediation or governance bypass.
//!
//! Page-level failures stop the run and come back as [`EmptyBucketError`]
//! carrying the progress made so far. Item-level failures are collected in
//! [`DeletionOutcome::errors`] and do not stop the run.
//!
//! Directory buckets (S3 Express One Zone) have no versions, so they are
//! drained in a single pass over the flat listing.

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use crate::config::Config;
use crate::deleter::{BatchDeleter, LegalHoldRemediator, RemediationOutcome};
use crate::paginator::DEFAULT_MAX_KEYS;
use crate::paginator::objects::{ListObjectsOptions, ListObjectsPaginator};
use crate::paginator::versions::ListObjectVersionsPaginator;
use crate::storage::s3::is_express_onezone_bucket;
use crate::storage::{Storage, create_storage};
use crate::types::error::{EmptyBucketError, S3purgeError, is_no_such_bucket_error};
use crate::types::token::{PurgeCancellationToken, run_cancellable};
use crate::types::{DeletionOutcome, ObjectIdentifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainPhase {
    Versions,
    DeleteMarkers,
}

/// What a dry run found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurveyReport {
    pub versions: i64,
    pub delete_markers: i64,
}

impl SurveyReport {
    pub fn total(&self) -> i64 {
        self.versions + self.delete_markers
    }
}

pub struct BucketEmptier {
    storage: Storage,
    cancellation_token: PurgeCancellationToken,
    prefix: Option<String>,
    max_keys: i32,
}

impl BucketEmptier {
    pub fn new(storage: Storage, cancellation_token: PurgeCancellationToken) -> Self {
        Self {
            storage,
            cancellation_token,
            prefix: None,
            max_keys: DEFAULT_MAX_KEYS,
        }
    }

    /// Only remove versions whose key starts with `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into()).filter(|prefix| !prefix.is_empty());
        self
    }

    /// Page size of the listings, which is also the size of each
    /// DeleteObjects request.
    pub fn with_max_keys(mut self, max_keys: i32) -> Self {
        self.max_keys = max_keys;
        self
    }

    pub async fn from_config(config: &Config, cancellation_token: PurgeCancellationToken) -> Self {
        let emptier = Self::new(create_storage(config).await, cancellation_token)
            .with_max_keys(config.max_keys);
        match config.target.prefix() {
            Some(prefix) => emptier.with_prefix(prefix),
            None => emptier,
        }
    }

    /// Remove every object version and delete marker.
    ///
    /// Calling this on a bucket that is already empty, or that does not
    /// exist, returns a zero outcome.
    pub async fn empty(
        &self,
        bucket: &str,
        force_destroy: bool,
    ) -> Result<DeletionOutcome, EmptyBucketError> {
        let mut outcome = DeletionOutcome::default();

        let result = if is_express_onezone_bucket(bucket) {
            info!(bucket = bucket, "Emptying directory bucket.");
            self.drain_directory_bucket(bucket, &mut outcome).await
        } else {
            info!(
                bucket = bucket,
                prefix = self.prefix.as_deref().unwrap_or_default(),
                force_destroy = force_destroy,
                "Emptying bucket."
            );
            self.drain_versions_then_markers(bucket, force_destroy, &mut outcome)
                .await
        };

        if let Err(cause) = result {
            return Err(EmptyBucketError {
                bucket: bucket.to_string(),
                outcome,
                cause,
            });
        }

        info!(
            bucket = bucket,
            deleted = outcome.deleted_count,
            failed = outcome.errors.len(),
            "Emptying bucket completed."
        );
        Ok(outcome)
    }

    /// Empty the bucket, then delete it.
    ///
    /// The bucket is only deleted when the whole bucket was targeted and
    /// every version was removed; otherwise the outcome comes back in the
    /// error.
    pub async fn empty_and_delete_bucket(
        &self,
        bucket: &str,
        force_destroy: bool,
    ) -> Result<DeletionOutcome, EmptyBucketError> {
        if let Some(prefix) = &self.prefix {
            return Err(EmptyBucketError {
                bucket: bucket.to_string(),
                outcome: DeletionOutcome::default(),
                cause: anyhow!(S3purgeError::InvalidConfig(format!(
                    "refusing to delete bucket {bucket} when only prefix '{prefix}' is emptied"
                ))),
            });
        }

        let outcome = self.empty(bucket, force_destroy).await?;
        if outcome.has_errors() {
            let cause = anyhow!(S3purgeError::PartialFailure {
                deleted: outcome.deleted_count,
                failed: outcome.errors.len() as u64,
            })
            .context(format!("bucket {bucket} is not empty and was not deleted"));
            return Err(EmptyBucketError {
                bucket: bucket.to_string(),
                outcome,
                cause,
            });
        }

        let result = run_cancellable(
            &self.cancellation_token,
            self.storage.delete_bucket(bucket),
        )
        .await;
        match result {
            Ok(()) => {}
            Err(e) if is_no_such_bucket_error(&e) => {
                debug!(bucket = bucket, "Bucket was already deleted.");
                return Ok(outcome);
            }
            Err(e) => {
                return Err(EmptyBucketError {
                    bucket: bucket.to_string(),
                    outcome,
                    cause: e.context(format!("failed to delete bucket {bucket}")),
                });
            }
        }

        if let Err(cause) = self.confirm_bucket_deleted(bucket).await {
            return Err(EmptyBucketError {
                bucket: bucket.to_string(),
                outcome,
                cause,
            });
        }
        info!(bucket = bucket, "Bucket deleted.");

        Ok(outcome)
    }

    async fn confirm_bucket_deleted(&self, bucket: &str) -> Result<()> {
        let exists = run_cancellable(&self.cancellation_token, self.storage.head_bucket(bucket))
            .await
            .context(format!("failed to confirm deletion of bucket {bucket}"))?;
        if exists {
            return Err(anyhow!(S3purgeError::BucketStillExists(bucket.to_string())));
        }
        Ok(())
    }

    /// Count what [`empty`](Self::empty) would remove, without deleting
    /// anything.
    pub async fn survey(&self, bucket: &str) -> Result<SurveyReport> {
        let mut report = SurveyReport::default();

        if is_express_onezone_bucket(bucket) {
            let mut paginator = self.directory_paginator(bucket);
            while paginator.has_more_pages() {
                match paginator.next_page(&self.cancellation_token).await {
                    Ok(page) => report.versions += page.contents.len() as i64,
                    Err(e) if is_no_such_bucket_error(&e) => break,
                    Err(e) => return Err(e),
                }
            }
            return Ok(report);
        }

        let mut paginator = self.versions_paginator(bucket);
        while paginator.has_more_pages() {
            match paginator.next_page(&self.cancellation_token).await {
                Ok(page) => {
                    for version in &page.versions {
                        debug!(
                            key = version.key,
                            version_id = version.version_id,
                            "[dry-run] would delete version."
                        );
                    }
                    report.versions += page.versions.len() as i64;
                    report.delete_markers += page.delete_markers.len() as i64;
                }
                Err(e) if is_no_such_bucket_error(&e) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    fn versions_paginator(&self, bucket: &str) -> ListObjectVersionsPaginator {
        ListObjectVersionsPaginator::new(
            self.storage.clone(),
            bucket,
            self.prefix.clone(),
            self.max_keys,
        )
    }

    fn directory_paginator(&self, bucket: &str) -> ListObjectsPaginator {
        ListObjectsPaginator::new(
            self.storage.clone(),
            bucket,
            ListObjectsOptions {
                prefix: self.prefix.clone(),
                page_size: self.max_keys,
                ..Default::default()
            },
        )
    }

    async fn drain_versions_then_markers(
        &self,
        bucket: &str,
        force_destroy: bool,
        outcome: &mut DeletionOutcome,
    ) -> Result<()> {
        self.drain(bucket, DrainPhase::Versions, force_destroy, outcome).await?;
        self.drain(bucket, DrainPhase::DeleteMarkers, false, outcome).await
    }

    /// One phase over a fresh version listing.
    async fn drain(
        &self,
        bucket: &str,
        phase: DrainPhase,
        force: bool,
        outcome: &mut DeletionOutcome,
    ) -> Result<()> {
        let deleter = BatchDeleter::new(self.storage.clone());
        let remediator = LegalHoldRemediator::new(self.storage.clone());
        let mut paginator = self.versions_paginator(bucket);
        let mut first_page = true;

        debug!(bucket = bucket, phase = ?phase, "Drain phase started.");
        while paginator.has_more_pages() {
            let page = match paginator.next_page(&self.cancellation_token).await {
                Ok(page) => page,
                Err(e) if first_page && is_no_such_bucket_error(&e) => {
                    debug!(bucket = bucket, "Bucket does not exist. Nothing to empty.");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            first_page = false;

            let entries = match phase {
                DrainPhase::Versions => &page.versions,
                DrainPhase::DeleteMarkers => &page.delete_markers,
            };
            let identifiers: Vec<ObjectIdentifier> =
                entries.iter().map(|entry| entry.identifier()).collect();

            let page_deletion = deleter
                .delete_page(&self.cancellation_token, bucket, &identifiers, force)
                .await?;
            outcome.deleted_count += page_deletion.deleted_count;

            let mut failures = page_deletion.errors.into_iter();
            while let Some(failure) = failures.next() {
                if !LegalHoldRemediator::applies_to(&failure, force) {
                    outcome.errors.push(failure.into());
                    continue;
                }

                match remediator
                    .remediate(&self.cancellation_token, &failure, force)
                    .await
                {
                    Ok(RemediationOutcome::Deleted) => outcome.deleted_count += 1,
                    Ok(RemediationOutcome::Failed(error)) => outcome.errors.push(error.into()),
                    Err(e) => {
                        // Keep the failures this page did not get to.
                        outcome.errors.push(failure.into());
                        outcome.errors.extend(failures.map(Into::into));
                        return Err(e);
                    }
                }
            }
        }
        debug!(bucket = bucket, phase = ?phase, "Drain phase completed.");

        Ok(())
    }

    /// Directory buckets are unversioned: one pass over the flat listing.
    async fn drain_directory_bucket(
        &self,
        bucket: &str,
        outcome: &mut DeletionOutcome,
    ) -> Result<()> {
        let deleter = BatchDeleter::new(self.storage.clone());
        let mut paginator = self.directory_paginator(bucket);
        let mut first_page = true;

        while paginator.has_more_pages() {
            let page = match paginator.next_page(&self.cancellation_token).await {
                Ok(page) => page,
                Err(e) if first_page && is_no_such_bucket_error(&e) => return Ok(()),
                Err(e) => return Err(e),
            };
            first_page = false;

            let identifiers: Vec<ObjectIdentifier> = page
                .contents
                .into_iter()
                .map(|entry| ObjectIdentifier::current(entry.key))
                .collect();
            let page_deletion = deleter
                .delete_page(&self.cancellation_token, bucket, &identifiers, false)
                .await?;
            outcome.deleted_count += page_deletion.deleted_count;
            outcome
                .errors
                .extend(page_deletion.errors.into_iter().map(Into::into));
        }

        Ok(())
    }
}
