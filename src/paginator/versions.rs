use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};

use crate::paginator::{DEFAULT_MAX_KEYS, PaginatorState};
use crate::storage::Storage;
use crate::types::error::S3purgeError;
use crate::types::token::{PurgeCancellationToken, run_cancellable};
use crate::types::{ListObjectVersionsRequest, VersionListingPage};

/// Continuation markers of a ListObjectVersions listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCursor {
    pub key_marker: Option<String>,
    pub version_id_marker: Option<String>,
}

/// Iterates over the object versions and delete markers of a bucket, one
/// ListObjectVersions page at a time.
pub struct ListObjectVersionsPaginator {
    storage: Storage,
    bucket: String,
    prefix: Option<String>,
    max_keys: i32,
    state: PaginatorState<VersionCursor>,
}

impl ListObjectVersionsPaginator {
    /// `max_keys` is the page size sent to S3; values outside 1..=1000 fall
    /// back to [`DEFAULT_MAX_KEYS`].
    pub fn new(
        storage: Storage,
        bucket: impl Into<String>,
        prefix: Option<String>,
        max_keys: i32,
    ) -> Self {
        let max_keys = if (1..=DEFAULT_MAX_KEYS).contains(&max_keys) {
            max_keys
        } else {
            DEFAULT_MAX_KEYS
        };

        Self {
            storage,
            bucket: bucket.into(),
            prefix: prefix.filter(|prefix| !prefix.is_empty()),
            max_keys,
            state: PaginatorState::new(),
        }
    }

    pub fn has_more_pages(&self) -> bool {
        self.state.has_more()
    }

    /// Fetch the next page.
    ///
    /// A failed request leaves the cursor untouched, so the same page can be
    /// requested again. After the last page this returns
    /// [`S3purgeError::NoMorePages`].
    pub async fn next_page(
        &mut self,
        cancellation_token: &PurgeCancellationToken,
    ) -> Result<VersionListingPage> {
        if !self.state.has_more() {
            return Err(anyhow!(S3purgeError::NoMorePages(self.bucket.clone())));
        }

        let cursor = self.state.cursor();
        let request = ListObjectVersionsRequest {
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            max_keys: self.max_keys,
            key_marker: cursor.and_then(|c| c.key_marker.clone()),
            version_id_marker: cursor.and_then(|c| c.version_id_marker.clone()),
        };

        let page = run_cancellable(
            cancellation_token,
            self.storage.list_object_versions(&request),
        )
        .await
        .with_context(|| {
            format!(
                "failed to list object versions in s3://{}/{}",
                self.bucket,
                self.prefix.as_deref().unwrap_or_default()
            )
        })?;

        let next = if !page.is_truncated {
            None
        } else if page.next_key_marker.is_none() && page.next_version_id_marker.is_none() {
            warn!(
                bucket = self.bucket,
                "ListObjectVersions response is truncated but has no next markers. Listing stops here."
            );
            None
        } else {
            Some(VersionCursor {
                key_marker: page.next_key_marker.clone(),
                version_id_marker: page.next_version_id_marker.clone(),
            })
        };
        self.state.advance(next);

        debug!(
            bucket = self.bucket,
            versions = page.versions.len(),
            delete_markers = page.delete_markers.len(),
            has_more_pages = self.state.has_more(),
            "Listed object versions page."
        );

        Ok(page)
    }
}
