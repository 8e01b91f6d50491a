use std::collections::HashMap;

use anyhow::Result;
use tracing::debug;

use crate::paginator::objects::{ListObjectsOptions, ListObjectsPaginator};
use crate::storage::Storage;
use crate::types::token::PurgeCancellationToken;

/// Keys and common prefixes collected from a flat listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketObjectListing {
    pub keys: Vec<String>,
    pub common_prefixes: Vec<String>,
    /// Owner ID per key. Only filled when the listing fetched owners.
    pub owners: HashMap<String, String>,
}

impl BucketObjectListing {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.common_prefixes.is_empty()
    }
}

/// Enumerates the current objects of a bucket with ListObjectsV2.
///
/// This is the data path behind `--list`: nothing is deleted. Pages are
/// fetched one after another until S3 has no more, or until the caller cap
/// in [`ListObjectsOptions::max_keys`] is reached.
pub struct ObjectLister {
    storage: Storage,
    bucket: String,
    cancellation_token: PurgeCancellationToken,
}

impl ObjectLister {
    pub fn new(
        storage: Storage,
        bucket: impl Into<String>,
        cancellation_token: PurgeCancellationToken,
    ) -> Self {
        Self {
            storage,
            bucket: bucket.into(),
            cancellation_token,
        }
    }

    pub async fn list(&self, options: ListObjectsOptions) -> Result<BucketObjectListing> {
        debug!(bucket = self.bucket, "list target objects has started.");

        let mut paginator = ListObjectsPaginator::new(self.storage.clone(), &self.bucket, options);
        let mut listing = BucketObjectListing::default();
        while paginator.has_more_pages() {
            let page = paginator.next_page(&self.cancellation_token).await?;
            for object in page.contents {
                if let Some(owner) = object.owner {
                    listing.owners.insert(object.key.clone(), owner);
                }
                listing.keys.push(object.key);
            }
            listing.common_prefixes.extend(page.common_prefixes);
        }

        debug!(
            bucket = self.bucket,
            keys = listing.keys.len(),
            common_prefixes = listing.common_prefixes.len(),
            "list target objects has been completed."
        );
        Ok(listing)
    }
}
