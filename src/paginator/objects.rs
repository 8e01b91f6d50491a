use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};

use crate::paginator::{DEFAULT_MAX_KEYS, PaginatorState};
use crate::storage::Storage;
use crate::types::error::S3purgeError;
use crate::types::token::{PurgeCancellationToken, run_cancellable};
use crate::types::{ListObjectsRequest, ObjectListingPage};

/// Options of a flat (ListObjectsV2) listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListObjectsOptions {
    pub prefix: Option<String>,
    /// Groups keys sharing the part up to the delimiter into common prefixes.
    pub delimiter: Option<String>,
    pub start_after: Option<String>,
    pub fetch_owner: bool,
    /// Page size sent to S3.
    pub page_size: i32,
    /// Caller cap on the number of keys yielded across all pages.
    pub max_keys: Option<usize>,
}

impl Default for ListObjectsOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            delimiter: None,
            start_after: None,
            fetch_owner: false,
            page_size: DEFAULT_MAX_KEYS,
            max_keys: None,
        }
    }
}

/// Iterates over a flat object listing, one ListObjectsV2 page at a time.
///
/// With a caller cap (`max_keys`), the page that reaches the cap is cut
/// down to it and the paginator is exhausted, even if S3 has more pages.
/// The common prefixes of that last page are returned as S3 sent them; no
/// further page is fetched to look for more.
pub struct ListObjectsPaginator {
    storage: Storage,
    bucket: String,
    options: ListObjectsOptions,
    state: PaginatorState<String>,
    yielded: usize,
}

impl ListObjectsPaginator {
    pub fn new(storage: Storage, bucket: impl Into<String>, options: ListObjectsOptions) -> Self {
        let mut options = options;
        if !(1..=DEFAULT_MAX_KEYS).contains(&options.page_size) {
            options.page_size = DEFAULT_MAX_KEYS;
        }
        options.prefix = options.prefix.filter(|prefix| !prefix.is_empty());

        let mut state = PaginatorState::new();
        if options.max_keys == Some(0) {
            state.exhaust();
        }

        Self {
            storage,
            bucket: bucket.into(),
            options,
            state,
            yielded: 0,
        }
    }

    pub fn has_more_pages(&self) -> bool {
        self.state.has_more()
    }

    /// Number of keys yielded so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    pub async fn next_page(
        &mut self,
        cancellation_token: &PurgeCancellationToken,
    ) -> Result<ObjectListingPage> {
        if !self.state.has_more() {
            return Err(anyhow!(S3purgeError::NoMorePages(self.bucket.clone())));
        }

        let request = ListObjectsRequest {
            bucket: self.bucket.clone(),
            prefix: self.options.prefix.clone(),
            delimiter: self.options.delimiter.clone(),
            max_keys: self.options.page_size,
            continuation_token: self.state.cursor().cloned(),
            start_after: self.options.start_after.clone(),
            fetch_owner: self.options.fetch_owner,
        };

        let mut page = run_cancellable(cancellation_token, self.storage.list_objects_v2(&request))
            .await
            .with_context(|| {
                format!(
                    "failed to list objects in s3://{}/{}",
                    self.bucket,
                    self.options.prefix.as_deref().unwrap_or_default()
                )
            })?;

        let mut next = if !page.is_truncated {
            None
        } else if page.next_continuation_token.is_none() {
            warn!(
                bucket = self.bucket,
                "ListObjectsV2 response is truncated but has no continuation token. Listing stops here."
            );
            None
        } else {
            page.next_continuation_token.clone()
        };

        if let Some(cap) = self.options.max_keys {
            let remaining = cap.saturating_sub(self.yielded);
            if page.contents.len() >= remaining {
                page.contents.truncate(remaining);
                next = None;
                debug!(
                    bucket = self.bucket,
                    max_keys = cap,
                    "Reached the requested number of keys. Listing stops here."
                );
            }
        }
        self.yielded += page.contents.len();
        self.state.advance(next);

        debug!(
            bucket = self.bucket,
            keys = page.contents.len(),
            common_prefixes = page.common_prefixes.len(),
            has_more_pages = self.state.has_more(),
            "Listed objects page."
        );

        Ok(page)
    }
}
