//! Deletion components.
//!
//! [`BatchDeleter`] removes one listing page with a single quiet
//! DeleteObjects request and reports the items S3 refused.
//! [`LegalHoldRemediator`] handles the refusals caused by a legal hold: it
//! clears the hold and deletes the version once more.

use crate::types::error::DeletionError;

pub mod batch;
pub mod remediator;

pub use batch::{BatchDeleter, MAX_BATCH_SIZE};
pub use remediator::{LegalHoldRemediator, RemediationOutcome};

/// Result of deleting one page.
///
/// `deleted_count` is the number of identifiers sent minus the failures S3
/// reported; quiet DeleteObjects responses only list failures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageDeletion {
    pub deleted_count: i64,
    pub errors: Vec<DeletionError>,
}
