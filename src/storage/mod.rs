use anyhow::Result;
use async_trait::async_trait;
use dyn_clone::DynClone;
use leaky_bucket::RateLimiter;
use std::sync::Arc;

use crate::config::Config;
use crate::types::{
    DeleteItemFailure, LegalHoldStatus, ListObjectVersionsRequest, ListObjectsRequest,
    ObjectIdentifier, ObjectListingPage, VersionListingPage,
};

pub mod s3;

pub type Storage = Box<dyn StorageTrait + Send + Sync>;

/// The S3 operations the emptying engine and the listing data path need.
///
/// Each method is exactly one round-trip. Implementations attach
/// [`S3purgeError`](crate::types::error::S3purgeError) context to failures
/// they can classify (missing bucket, missing object or version) and never
/// retry on their own beyond what the SDK's retry policy does.
///
/// Keys are full S3 keys; no prefix is prepended.
#[async_trait]
pub trait StorageTrait: DynClone {
    async fn list_object_versions(
        &self,
        request: &ListObjectVersionsRequest,
    ) -> Result<VersionListingPage>;

    async fn list_objects_v2(&self, request: &ListObjectsRequest) -> Result<ObjectListingPage>;

    /// Delete up to 1000 objects with a quiet DeleteObjects request.
    ///
    /// Only failures are returned; every identifier not reported back was
    /// deleted.
    async fn delete_objects(
        &self,
        bucket: &str,
        objects: Vec<ObjectIdentifier>,
        bypass_governance_retention: bool,
    ) -> Result<Vec<DeleteItemFailure>>;

    async fn delete_object(
        &self,
        bucket: &str,
        object: &ObjectIdentifier,
        bypass_governance_retention: bool,
    ) -> Result<()>;

    async fn put_object_legal_hold(
        &self,
        bucket: &str,
        object: &ObjectIdentifier,
        status: LegalHoldStatus,
    ) -> Result<()>;

    /// Returns `false` when the bucket does not exist.
    async fn head_bucket(&self, bucket: &str) -> Result<bool>;

    async fn delete_bucket(&self, bucket: &str) -> Result<()>;
}

dyn_clone::clone_trait_object!(StorageTrait);

// Default refill interval 100ms
const REFILL_PER_INTERVAL_DIVIDER: usize = 10;

fn build_rate_limiter(rate_limit_value: u32) -> Arc<RateLimiter> {
    let refill = if (rate_limit_value as usize) <= REFILL_PER_INTERVAL_DIVIDER {
        1
    } else {
        rate_limit_value as usize / REFILL_PER_INTERVAL_DIVIDER
    };
    Arc::new(
        RateLimiter::builder()
            .max(rate_limit_value as usize)
            .initial(rate_limit_value as usize)
            .refill(refill)
            .fair(true)
            .build(),
    )
}

/// Create the S3 storage for a run.
///
/// Without a `target_client_config` the storage has no client and every
/// call fails; this only happens in tests.
pub async fn create_storage(config: &Config) -> Storage {
    let rate_limit_objects_per_sec = config.rate_limit_objects.map(build_rate_limiter);

    let client_config = config.target_client_config.as_ref();
    let request_payer = client_config.and_then(|c| c.request_payer.clone());
    let client = match client_config {
        Some(client_config) => Some(Arc::new(client_config.create_client().await)),
        None => None,
    };

    Box::new(s3::S3Storage::new(
        client,
        request_payer,
        rate_limit_objects_per_sec,
    ))
}
