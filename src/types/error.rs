use std::fmt;

use anyhow::Error;
use thiserror::Error;

use crate::types::{DeletionOutcome, ObjectIdentifier};

/// Application-level error types for s3purge-rs.
///
/// Storage implementations attach these as `anyhow` context so that callers
/// can classify a failure with [`anyhow::Error::downcast_ref`] no matter how
/// many layers of context have been added on top.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 0: Non-error conditions (Cancelled)
/// - 1: General errors (NoSuchBucket, NoSuchObject, NoMorePages, BucketStillExists)
/// - 2: Configuration errors (InvalidConfig)
/// - 3: Partial failure (the bucket was not emptied completely)
#[derive(Error, Debug, PartialEq)]
pub enum S3purgeError {
    /// The bucket does not exist.
    #[error("Bucket does not exist: {0}")]
    NoSuchBucket(String),

    /// The object, or the requested version of it, does not exist.
    #[error("Object does not exist: s3://{bucket}/{key}{}", version_suffix(.version_id.as_deref()))]
    NoSuchObject {
        bucket: String,
        key: String,
        version_id: Option<String>,
    },

    /// A paginator was asked for a page after it was exhausted.
    #[error("No more pages to list in bucket: {0}")]
    NoMorePages(String),

    /// Configuration error (non-retryable).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// DeleteBucket succeeded but HeadBucket still finds the bucket.
    #[error("Bucket still exists after deletion: {0}")]
    BucketStillExists(String),

    /// Operation cancelled by user.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// Emptying finished but some object versions could not be deleted.
    #[error("Partial failure: {deleted} deleted, {failed} failed")]
    PartialFailure { deleted: i64, failed: u64 },
}

impl S3purgeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            S3purgeError::Cancelled => 0,
            S3purgeError::InvalidConfig(_) => 2,
            S3purgeError::PartialFailure { .. } => 3,
            _ => 1,
        }
    }
}

fn version_suffix(version_id: Option<&str>) -> String {
    version_id
        .map(|version_id| format!(" (version_id: {version_id})"))
        .unwrap_or_default()
}

/// A single object version that DeleteObjects reported as not deleted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to delete s3://{bucket}/{key}{}: {message} ({code})", version_suffix(.version_id.as_deref()))]
pub struct DeletionError {
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
    pub code: String,
    pub message: String,
}

impl DeletionError {
    pub fn is_access_denied(&self) -> bool {
        self.code == "AccessDenied"
    }

    pub fn identifier(&self) -> ObjectIdentifier {
        ObjectIdentifier::new(self.key.clone(), self.version_id.clone())
    }
}

/// The step of legal hold remediation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationStep {
    ClearLegalHold,
    RetryDelete,
}

impl fmt::Display for RemediationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemediationStep::ClearLegalHold => write!(f, "clearing legal hold"),
            RemediationStep::RetryDelete => write!(f, "retrying delete"),
        }
    }
}

/// Compound error: the original bulk-delete failure plus the remediation
/// failure that followed it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{deletion}; remediation failed while {step}: {cause}")]
pub struct RemediationError {
    pub deletion: DeletionError,
    pub step: RemediationStep,
    pub cause: String,
}

/// An item-level failure collected into [`DeletionOutcome::errors`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    #[error(transparent)]
    Deletion(#[from] DeletionError),

    #[error(transparent)]
    Remediation(#[from] RemediationError),
}

impl ItemError {
    /// The bulk-delete failure at the root of this error.
    pub fn deletion(&self) -> &DeletionError {
        match self {
            ItemError::Deletion(deletion) => deletion,
            ItemError::Remediation(remediation) => &remediation.deletion,
        }
    }

    pub fn identifier(&self) -> ObjectIdentifier {
        self.deletion().identifier()
    }
}

/// Page-level failure while emptying a bucket.
///
/// `outcome` holds everything completed before the failure; some objects
/// may remain in the bucket. When the failure interrupts a page after its
/// DeleteObjects call returned (cancellation during legal hold remediation),
/// that page's acknowledged deletions and finished remediations are already
/// counted, and its unprocessed failures are in `outcome.errors`.
#[derive(Error, Debug)]
#[error(
    "failed to empty bucket {bucket} ({} object versions deleted, {} item errors): {cause:#}",
    .outcome.deleted_count,
    .outcome.errors.len()
)]
pub struct EmptyBucketError {
    pub bucket: String,
    pub outcome: DeletionOutcome,
    pub cause: Error,
}

impl EmptyBucketError {
    pub fn is_cancelled(&self) -> bool {
        is_cancelled_error(&self.cause)
    }

    pub fn exit_code(&self) -> i32 {
        exit_code_from_error(&self.cause)
    }
}

pub fn is_cancelled_error(e: &Error) -> bool {
    if let Some(err) = e.downcast_ref::<S3purgeError>() {
        return *err == S3purgeError::Cancelled;
    }
    false
}

pub fn is_no_such_bucket_error(e: &Error) -> bool {
    matches!(
        e.downcast_ref::<S3purgeError>(),
        Some(S3purgeError::NoSuchBucket(_))
    )
}

/// Bucket or object already absent.
pub fn is_not_found_error(e: &Error) -> bool {
    matches!(
        e.downcast_ref::<S3purgeError>(),
        Some(S3purgeError::NoSuchBucket(_) | S3purgeError::NoSuchObject { .. })
    )
}

pub fn is_no_more_pages_error(e: &Error) -> bool {
    matches!(
        e.downcast_ref::<S3purgeError>(),
        Some(S3purgeError::NoMorePages(_))
    )
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<S3purgeError>() {
        return err.exit_code();
    }
    1
}
