pub mod client_builder;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::types::{
    Delete, ObjectIdentifier as S3ObjectIdentifier, ObjectLockLegalHold,
    ObjectLockLegalHoldStatus, RequestPayer,
};
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use leaky_bucket::RateLimiter;
use std::sync::Arc;

use crate::storage::StorageTrait;
use crate::types::error::{S3purgeError, is_no_such_bucket_error};
use crate::types::{
    DeleteItemFailure, LegalHoldStatus, ListObjectVersionsRequest, ListObjectsRequest,
    ObjectEntry, ObjectIdentifier, ObjectListingPage, ObjectVersionEntry, VersionListingPage,
};

const EXPRESS_ONEZONE_STORAGE_SUFFIX: &str = "--x-s3";

/// Extracts the S3 error code and message from an AWS SDK error.
///
/// For service errors (S3 API responses), returns the S3 error code
/// (e.g. "AccessDenied", "NoSuchBucket") and the error message from the
/// response. For other error types (network, timeout, construction
/// failure), returns "N/A" as the code and the full error description as
/// the message.
fn extract_sdk_error_details<E: std::fmt::Display + ProvideErrorMetadata>(
    e: &SdkError<E>,
) -> (String, String) {
    if let Some(service_err) = e.as_service_error() {
        (
            service_err.code().unwrap_or("unknown").to_string(),
            service_err.message().unwrap_or("no message").to_string(),
        )
    } else {
        ("N/A".to_string(), e.to_string())
    }
}

/// Maps an S3 error code (and HTTP status for bodiless responses such as
/// HeadBucket) to a not-found condition, if it is one.
fn classify_not_found(
    s3_error_code: &str,
    http_status: Option<u16>,
    bucket: &str,
    object: Option<&ObjectIdentifier>,
) -> Option<S3purgeError> {
    let no_such_object = || {
        object.map(|object| S3purgeError::NoSuchObject {
            bucket: bucket.to_string(),
            key: object.key().to_string(),
            version_id: object.version_id().map(str::to_string),
        })
    };

    match s3_error_code {
        "NoSuchBucket" => Some(S3purgeError::NoSuchBucket(bucket.to_string())),
        "NoSuchKey" | "NoSuchVersion" => no_such_object(),
        _ if http_status == Some(404) => {
            no_such_object().or_else(|| Some(S3purgeError::NoSuchBucket(bucket.to_string())))
        }
        _ => None,
    }
}

pub fn is_express_onezone_bucket(bucket: &str) -> bool {
    bucket.ends_with(EXPRESS_ONEZONE_STORAGE_SUFFIX)
}

/// `aws-sdk-s3` implementation of [`StorageTrait`].
#[derive(Clone)]
pub struct S3Storage {
    client: Option<Arc<Client>>,
    request_payer: Option<RequestPayer>,
    rate_limit_objects_per_sec: Option<Arc<RateLimiter>>,
}

impl S3Storage {
    pub fn new(
        client: Option<Arc<Client>>,
        request_payer: Option<RequestPayer>,
        rate_limit_objects_per_sec: Option<Arc<RateLimiter>>,
    ) -> Self {
        Self {
            client,
            request_payer,
            rate_limit_objects_per_sec,
        }
    }

    fn client(&self) -> Result<&Client> {
        self.client.as_deref().ok_or_else(|| {
            anyhow!(S3purgeError::InvalidConfig(
                "S3 client is not configured.".to_string()
            ))
        })
    }

    async fn exec_rate_limit_objects_per_sec(&self) {
        if let Some(ref rate_limiter) = self.rate_limit_objects_per_sec {
            rate_limiter.acquire_one().await;
        }
    }

    /// Acquires `count` tokens so that a DeleteObjects call is charged for
    /// every object it carries.
    async fn exec_rate_limit_objects_per_sec_n(&self, count: usize) {
        if count == 0 {
            return;
        }
        if let Some(ref rate_limiter) = self.rate_limit_objects_per_sec {
            rate_limiter.acquire(count).await;
        }
    }
}

/// Logs a failed S3 call and converts it into an `anyhow::Error`, attaching
/// [`S3purgeError`] context for not-found conditions.
fn sdk_error<E>(
    e: SdkError<E, HttpResponse>,
    api: &str,
    operation: &str,
    bucket: &str,
    object: Option<&ObjectIdentifier>,
) -> anyhow::Error
where
    E: std::error::Error + ProvideErrorMetadata + Send + Sync + 'static,
{
    let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
    let http_status = e.raw_response().map(|response| response.status().as_u16());
    let key = object.map(|o| o.key()).unwrap_or_default();
    let version_id = object.and_then(|o| o.version_id());
    let not_found = classify_not_found(&s3_error_code, http_status, bucket, object);

    if not_found.is_some() {
        tracing::debug!(
            bucket = bucket,
            key = key,
            version_id = version_id,
            s3_error_code = s3_error_code,
            "S3 {} API call found nothing at s3://{}/{}: {} ({}).",
            api,
            bucket,
            key,
            s3_error_code,
            s3_error_message,
        );
    } else if object.is_some() {
        tracing::warn!(
            bucket = bucket,
            key = key,
            version_id = version_id,
            s3_error_code = s3_error_code,
            s3_error_message = s3_error_message,
            "S3 {} API call failed for s3://{}/{}: {} ({}).",
            api,
            bucket,
            key,
            s3_error_code,
            s3_error_message,
        );
    } else {
        tracing::error!(
            bucket = bucket,
            s3_error_code = s3_error_code,
            s3_error_message = s3_error_message,
            "S3 {} API call failed for bucket '{}': {} ({}).",
            api,
            bucket,
            s3_error_code,
            s3_error_message,
        );
    }

    let context = format!("aws_sdk_s3::client::{operation}() failed.");
    match not_found {
        Some(not_found) => anyhow!(e).context(not_found).context(context),
        None => anyhow!(e).context(context),
    }
}

#[async_trait]
impl StorageTrait for S3Storage {
    async fn list_object_versions(
        &self,
        request: &ListObjectVersionsRequest,
    ) -> Result<VersionListingPage> {
        self.exec_rate_limit_objects_per_sec().await;

        let output = self
            .client()?
            .list_object_versions()
            .set_request_payer(self.request_payer.clone())
            .bucket(&request.bucket)
            .set_prefix(request.prefix.clone())
            .max_keys(request.max_keys)
            .set_key_marker(request.key_marker.clone())
            .set_version_id_marker(request.version_id_marker.clone())
            .send()
            .await
            .map_err(|e| {
                sdk_error(
                    e,
                    "ListObjectVersions",
                    "list_object_versions",
                    &request.bucket,
                    None,
                )
            })?;

        let versions = output
            .versions()
            .iter()
            .map(|version| ObjectVersionEntry {
                key: version.key().unwrap_or_default().to_string(),
                version_id: version.version_id().map(str::to_string),
                is_latest: version.is_latest().unwrap_or(false),
            })
            .collect();
        let delete_markers = output
            .delete_markers()
            .iter()
            .map(|marker| ObjectVersionEntry {
                key: marker.key().unwrap_or_default().to_string(),
                version_id: marker.version_id().map(str::to_string),
                is_latest: marker.is_latest().unwrap_or(false),
            })
            .collect();

        Ok(VersionListingPage {
            versions,
            delete_markers,
            is_truncated: output.is_truncated() == Some(true),
            next_key_marker: output.next_key_marker().map(str::to_string),
            next_version_id_marker: output.next_version_id_marker().map(str::to_string),
        })
    }

    async fn list_objects_v2(&self, request: &ListObjectsRequest) -> Result<ObjectListingPage> {
        self.exec_rate_limit_objects_per_sec().await;

        let output = self
            .client()?
            .list_objects_v2()
            .set_request_payer(self.request_payer.clone())
            .bucket(&request.bucket)
            .set_prefix(request.prefix.clone())
            .set_delimiter(request.delimiter.clone())
            .max_keys(request.max_keys)
            .set_continuation_token(request.continuation_token.clone())
            .set_start_after(request.start_after.clone())
            .fetch_owner(request.fetch_owner)
            .send()
            .await
            .map_err(|e| sdk_error(e, "ListObjectsV2", "list_objects_v2", &request.bucket, None))?;

        let contents = output
            .contents()
            .iter()
            .map(|object| ObjectEntry {
                key: object.key().unwrap_or_default().to_string(),
                owner: object
                    .owner()
                    .and_then(|owner| owner.display_name().or(owner.id()))
                    .map(str::to_string),
            })
            .collect();
        let common_prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|common_prefix| common_prefix.prefix().map(str::to_string))
            .collect();

        Ok(ObjectListingPage {
            contents,
            common_prefixes,
            is_truncated: output.is_truncated() == Some(true),
            next_continuation_token: output.next_continuation_token().map(str::to_string),
        })
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        objects: Vec<ObjectIdentifier>,
        bypass_governance_retention: bool,
    ) -> Result<Vec<DeleteItemFailure>> {
        self.exec_rate_limit_objects_per_sec_n(objects.len()).await;

        let object_count = objects.len();
        let identifiers = objects
            .iter()
            .map(|object| {
                S3ObjectIdentifier::builder()
                    .key(object.key())
                    .set_version_id(object.version_id().map(str::to_string))
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to build ObjectIdentifier")?;

        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(true)
            .build()
            .context("Failed to build Delete request")?;

        let output = self
            .client()?
            .delete_objects()
            .set_request_payer(self.request_payer.clone())
            .bucket(bucket)
            .delete(delete)
            .set_bypass_governance_retention(bypass_governance_retention.then_some(true))
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(
                    bucket = bucket,
                    object_count = object_count,
                    "S3 DeleteObjects API call failed for {} objects.",
                    object_count,
                );
                sdk_error(e, "DeleteObjects", "delete_objects", bucket, None)
            })?;

        Ok(output
            .errors()
            .iter()
            .map(|error| DeleteItemFailure {
                key: error.key().unwrap_or_default().to_string(),
                version_id: error.version_id().map(str::to_string),
                code: error.code().unwrap_or("unknown").to_string(),
                message: error.message().unwrap_or("no message").to_string(),
            })
            .collect())
    }

    async fn delete_object(
        &self,
        bucket: &str,
        object: &ObjectIdentifier,
        bypass_governance_retention: bool,
    ) -> Result<()> {
        self.exec_rate_limit_objects_per_sec().await;

        self.client()?
            .delete_object()
            .set_request_payer(self.request_payer.clone())
            .bucket(bucket)
            .key(object.key())
            .set_version_id(object.version_id().map(str::to_string))
            .set_bypass_governance_retention(bypass_governance_retention.then_some(true))
            .send()
            .await
            .map_err(|e| sdk_error(e, "DeleteObject", "delete_object", bucket, Some(object)))?;

        Ok(())
    }

    async fn put_object_legal_hold(
        &self,
        bucket: &str,
        object: &ObjectIdentifier,
        status: LegalHoldStatus,
    ) -> Result<()> {
        self.exec_rate_limit_objects_per_sec().await;

        let status = match status {
            LegalHoldStatus::On => ObjectLockLegalHoldStatus::On,
            LegalHoldStatus::Off => ObjectLockLegalHoldStatus::Off,
        };

        self.client()?
            .put_object_legal_hold()
            .set_request_payer(self.request_payer.clone())
            .bucket(bucket)
            .key(object.key())
            .set_version_id(object.version_id().map(str::to_string))
            .legal_hold(ObjectLockLegalHold::builder().status(status).build())
            .send()
            .await
            .map_err(|e| {
                sdk_error(
                    e,
                    "PutObjectLegalHold",
                    "put_object_legal_hold",
                    bucket,
                    Some(object),
                )
            })?;

        Ok(())
    }

    async fn head_bucket(&self, bucket: &str) -> Result<bool> {
        self.exec_rate_limit_objects_per_sec().await;

        let result = self
            .client()?
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| sdk_error(e, "HeadBucket", "head_bucket", bucket, None));

        match result {
            Ok(_) => Ok(true),
            Err(e) if is_no_such_bucket_error(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.exec_rate_limit_objects_per_sec().await;

        self.client()?
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| sdk_error(e, "DeleteBucket", "delete_bucket", bucket, None))?;

        Ok(())
    }
}
