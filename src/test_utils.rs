//! Shared test utilities for the s3purge library crate.
//!
//! [`MockStorage`] is an in-memory versioned bucket implementing
//! [`StorageTrait`]. It follows S3's listing order (key ascending, newest
//! version first within a key), honours key/version-id markers and
//! continuation tokens, and can be told to fail specific calls.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::storage::{Storage, StorageTrait};
use crate::types::error::S3purgeError;
use crate::types::token::PurgeCancellationToken;
use crate::types::{
    DeleteItemFailure, LegalHoldStatus, ListObjectVersionsRequest, ListObjectsRequest,
    ObjectEntry, ObjectIdentifier, ObjectListingPage, ObjectVersionEntry, VersionListingPage,
};

pub(crate) const MOCK_OWNER: &str = "mock-owner";

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// Every call made against a [`MockStorage`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StorageCall {
    ListObjectVersions {
        prefix: Option<String>,
        max_keys: i32,
        key_marker: Option<String>,
        version_id_marker: Option<String>,
    },
    ListObjectsV2 {
        max_keys: i32,
        continuation_token: Option<String>,
    },
    DeleteObjects {
        objects: Vec<ObjectIdentifier>,
        bypass_governance_retention: bool,
    },
    DeleteObject {
        object: ObjectIdentifier,
        bypass_governance_retention: bool,
    },
    PutObjectLegalHold {
        object: ObjectIdentifier,
        status: LegalHoldStatus,
    },
    HeadBucket,
    DeleteBucket,
}

impl StorageCall {
    pub(crate) fn is_delete_objects(&self) -> bool {
        matches!(self, StorageCall::DeleteObjects { .. })
    }

    pub(crate) fn is_list_object_versions(&self) -> bool {
        matches!(self, StorageCall::ListObjectVersions { .. })
    }
}

#[derive(Debug, Clone)]
struct MockEntry {
    key: String,
    version_id: String,
    seq: u64,
    is_delete_marker: bool,
    legal_hold: bool,
    deleted: bool,
}

#[derive(Default)]
struct MockBucket {
    bucket: String,
    bucket_missing: bool,
    bucket_deleted: bool,
    bucket_survives_delete: bool,
    entries: Vec<MockEntry>,
    next_seq: u64,
    calls: Vec<StorageCall>,

    bulk_delete_failures: HashMap<String, String>,
    legal_hold_failures: HashMap<String, String>,
    single_delete_failures: HashMap<String, String>,
    fail_list_object_versions_on_call: Option<usize>,
    fail_delete_objects_on_call: Option<usize>,
    cancel_on_delete_objects_call: Option<(usize, PurgeCancellationToken)>,
    cancel_on_legal_hold_call: Option<(usize, PurgeCancellationToken)>,
    omit_next_markers: bool,
    list_object_versions_calls: usize,
    delete_objects_calls: usize,
    legal_hold_calls: usize,
}

impl MockBucket {
    fn live(&self) -> impl Iterator<Item = &MockEntry> {
        self.entries.iter().filter(|entry| !entry.deleted)
    }

    /// Live entries in listing order: key ascending, newest first.
    fn sorted_live(&self, prefix: Option<&str>) -> Vec<MockEntry> {
        let mut entries: Vec<MockEntry> = self
            .live()
            .filter(|entry| entry.key.starts_with(prefix.unwrap_or_default()))
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key).then(b.seq.cmp(&a.seq)));
        entries
    }

    fn latest_seq(&self, key: &str) -> Option<u64> {
        self.live()
            .filter(|entry| entry.key == key)
            .map(|entry| entry.seq)
            .max()
    }

    fn seq_of(&self, key: &str, version_id: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|entry| entry.key == key && entry.version_id == version_id)
            .map(|entry| entry.seq)
    }

    fn find_live_mut(&mut self, object: &ObjectIdentifier) -> Vec<&mut MockEntry> {
        self.entries
            .iter_mut()
            .filter(|entry| {
                !entry.deleted
                    && entry.key == object.key()
                    && object
                        .version_id()
                        .is_none_or(|version_id| entry.version_id == version_id)
            })
            .collect()
    }

    fn bucket_exists(&self, bucket: &str) -> bool {
        bucket == self.bucket && !self.bucket_missing && !self.bucket_deleted
    }

    fn put_legal_hold(
        &mut self,
        bucket: &str,
        object: &ObjectIdentifier,
        status: LegalHoldStatus,
    ) -> Result<()> {
        if let Some(code) = self.legal_hold_failures.get(object.key()) {
            return Err(injected_error(
                code,
                bucket,
                Some(object),
                "put_object_legal_hold",
            ));
        }

        let targets = self.find_live_mut(object);
        if targets.is_empty() {
            return Err(injected_error(
                "NoSuchVersion",
                bucket,
                Some(object),
                "put_object_legal_hold",
            ));
        }
        for entry in targets {
            entry.legal_hold = status == LegalHoldStatus::On;
        }
        Ok(())
    }

    /// Applies one delete, returning the error code on failure.
    fn delete_one(&mut self, object: &ObjectIdentifier) -> Option<String> {
        let targets = self.find_live_mut(object);
        if targets.iter().any(|entry| entry.legal_hold) {
            return Some("AccessDenied".to_string());
        }
        for entry in targets {
            entry.deleted = true;
        }
        None
    }
}

/// Error carrying the same classification context the S3 storage attaches.
pub(crate) fn injected_error(
    code: &str,
    bucket: &str,
    object: Option<&ObjectIdentifier>,
    operation: &str,
) -> anyhow::Error {
    let e = anyhow!("{code}: injected failure");
    let e = match (code, object) {
        ("NoSuchBucket", _) => e.context(S3purgeError::NoSuchBucket(bucket.to_string())),
        ("NoSuchKey" | "NoSuchVersion", Some(object)) => e.context(S3purgeError::NoSuchObject {
            bucket: bucket.to_string(),
            key: object.key().to_string(),
            version_id: object.version_id().map(str::to_string),
        }),
        _ => e,
    };
    e.context(format!("aws_sdk_s3::client::{operation}() failed."))
}

#[derive(Clone, Default)]
pub(crate) struct MockStorage {
    inner: Arc<Mutex<MockBucket>>,
}

impl MockStorage {
    pub(crate) fn new(bucket: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockBucket {
                bucket: bucket.to_string(),
                ..Default::default()
            })),
        }
    }

    pub(crate) fn boxed(&self) -> Storage {
        Box::new(self.clone())
    }

    fn push_entry(&self, key: &str, is_delete_marker: bool, legal_hold: bool) -> String {
        let mut inner = self.inner.lock().unwrap();
        inner.next_seq += 1;
        let seq = inner.next_seq;
        let version_id = format!("v{seq}");
        inner.entries.push(MockEntry {
            key: key.to_string(),
            version_id: version_id.clone(),
            seq,
            is_delete_marker,
            legal_hold,
            deleted: false,
        });
        version_id
    }

    /// Adds a new object version and returns its version ID.
    pub(crate) fn put_object(&self, key: &str) -> String {
        self.push_entry(key, false, false)
    }

    pub(crate) fn put_object_with_legal_hold(&self, key: &str) -> String {
        self.push_entry(key, false, true)
    }

    pub(crate) fn put_delete_marker(&self, key: &str) -> String {
        self.push_entry(key, true, false)
    }

    /// Adds `count` objects named `prefix{index:05}` with one version each.
    pub(crate) fn put_objects(&self, prefix: &str, count: usize) -> Vec<ObjectIdentifier> {
        (0..count)
            .map(|index| {
                let key = format!("{prefix}{index:05}");
                let version_id = self.put_object(&key);
                ObjectIdentifier::new(key, Some(version_id))
            })
            .collect()
    }

    pub(crate) fn remove_bucket(&self) {
        self.inner.lock().unwrap().bucket_missing = true;
    }

    pub(crate) fn fail_bulk_delete_for(&self, key: &str, code: &str) {
        self.inner
            .lock()
            .unwrap()
            .bulk_delete_failures
            .insert(key.to_string(), code.to_string());
    }

    pub(crate) fn fail_legal_hold_clear_for(&self, key: &str, code: &str) {
        self.inner
            .lock()
            .unwrap()
            .legal_hold_failures
            .insert(key.to_string(), code.to_string());
    }

    pub(crate) fn fail_single_delete_for(&self, key: &str, code: &str) {
        self.inner
            .lock()
            .unwrap()
            .single_delete_failures
            .insert(key.to_string(), code.to_string());
    }

    /// The `n`th ListObjectVersions call (1-based) fails with a transport error.
    pub(crate) fn fail_list_object_versions_on_call(&self, n: usize) {
        self.inner.lock().unwrap().fail_list_object_versions_on_call = Some(n);
    }

    /// The `n`th DeleteObjects call (1-based) fails with a transport error.
    pub(crate) fn fail_delete_objects_on_call(&self, n: usize) {
        self.inner.lock().unwrap().fail_delete_objects_on_call = Some(n);
    }

    /// The `n`th DeleteObjects call cancels `token` and never completes.
    pub(crate) fn cancel_on_delete_objects_call(&self, n: usize, token: PurgeCancellationToken) {
        self.inner.lock().unwrap().cancel_on_delete_objects_call = Some((n, token));
    }

    /// DeleteBucket reports success but leaves the bucket in place.
    pub(crate) fn keep_bucket_on_delete(&self) {
        self.inner.lock().unwrap().bucket_survives_delete = true;
    }

    /// The `n`th PutObjectLegalHold call cancels `token` and never completes.
    pub(crate) fn cancel_on_legal_hold_call(&self, n: usize, token: PurgeCancellationToken) {
        self.inner.lock().unwrap().cancel_on_legal_hold_call = Some((n, token));
    }

    /// Truncated version listings come back without next markers.
    pub(crate) fn omit_next_markers(&self) {
        self.inner.lock().unwrap().omit_next_markers = true;
    }

    pub(crate) fn calls(&self) -> Vec<StorageCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub(crate) fn delete_objects_call_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.is_delete_objects())
            .count()
    }

    pub(crate) fn list_object_versions_call_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.is_list_object_versions())
            .count()
    }

    pub(crate) fn list_objects_v2_call_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, StorageCall::ListObjectsV2 { .. }))
            .count()
    }

    /// Versions and delete markers still present.
    pub(crate) fn remaining(&self) -> Vec<ObjectIdentifier> {
        self.inner
            .lock()
            .unwrap()
            .sorted_live(None)
            .into_iter()
            .map(|entry| ObjectIdentifier::new(entry.key, Some(entry.version_id)))
            .collect()
    }

    pub(crate) fn exists(&self, object: &ObjectIdentifier) -> bool {
        !self.inner.lock().unwrap().find_live_mut(object).is_empty()
    }

    pub(crate) fn has_legal_hold(&self, object: &ObjectIdentifier) -> bool {
        self.inner
            .lock()
            .unwrap()
            .find_live_mut(object)
            .iter()
            .any(|entry| entry.legal_hold)
    }

    pub(crate) fn is_bucket_deleted(&self) -> bool {
        self.inner.lock().unwrap().bucket_deleted
    }
}

#[async_trait]
impl StorageTrait for MockStorage {
    async fn list_object_versions(
        &self,
        request: &ListObjectVersionsRequest,
    ) -> Result<VersionListingPage> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StorageCall::ListObjectVersions {
            prefix: request.prefix.clone(),
            max_keys: request.max_keys,
            key_marker: request.key_marker.clone(),
            version_id_marker: request.version_id_marker.clone(),
        });
        inner.list_object_versions_calls += 1;
        if inner.fail_list_object_versions_on_call == Some(inner.list_object_versions_calls) {
            return Err(injected_error(
                "InternalError",
                &request.bucket,
                None,
                "list_object_versions",
            ));
        }
        if !inner.bucket_exists(&request.bucket) {
            return Err(injected_error(
                "NoSuchBucket",
                &request.bucket,
                None,
                "list_object_versions",
            ));
        }

        let marker_seq = match (&request.key_marker, &request.version_id_marker) {
            (Some(key), Some(version_id)) => inner.seq_of(key, version_id),
            _ => None,
        };
        let remaining: Vec<MockEntry> = inner
            .sorted_live(request.prefix.as_deref())
            .into_iter()
            .filter(|entry| match (&request.key_marker, marker_seq) {
                (None, _) => true,
                (Some(key_marker), Some(seq)) => {
                    entry.key > *key_marker || (entry.key == *key_marker && entry.seq < seq)
                }
                (Some(key_marker), None) => entry.key > *key_marker,
            })
            .collect();

        let page_size = request.max_keys.max(1) as usize;
        let is_truncated = remaining.len() > page_size;
        let page: Vec<MockEntry> = remaining.into_iter().take(page_size).collect();

        let mut listing = VersionListingPage {
            is_truncated,
            ..Default::default()
        };
        if is_truncated && !inner.omit_next_markers {
            if let Some(last) = page.last() {
                listing.next_key_marker = Some(last.key.clone());
                listing.next_version_id_marker = Some(last.version_id.clone());
            }
        }
        for entry in page {
            let version = ObjectVersionEntry {
                is_latest: inner.latest_seq(&entry.key) == Some(entry.seq),
                key: entry.key,
                version_id: Some(entry.version_id),
            };
            if entry.is_delete_marker {
                listing.delete_markers.push(version);
            } else {
                listing.versions.push(version);
            }
        }
        Ok(listing)
    }

    async fn list_objects_v2(&self, request: &ListObjectsRequest) -> Result<ObjectListingPage> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StorageCall::ListObjectsV2 {
            max_keys: request.max_keys,
            continuation_token: request.continuation_token.clone(),
        });
        if !inner.bucket_exists(&request.bucket) {
            return Err(injected_error(
                "NoSuchBucket",
                &request.bucket,
                None,
                "list_objects_v2",
            ));
        }

        let prefix = request.prefix.clone().unwrap_or_default();
        let current_keys: BTreeSet<String> = inner
            .sorted_live(Some(&prefix))
            .into_iter()
            .filter(|entry| {
                !entry.is_delete_marker && inner.latest_seq(&entry.key) == Some(entry.seq)
            })
            .map(|entry| entry.key)
            .collect();

        // Continuation tokens are the last key or common prefix returned.
        let resume_after = request
            .continuation_token
            .clone()
            .or_else(|| request.start_after.clone());

        let page_size = request.max_keys.max(1) as usize;
        let mut listing = ObjectListingPage::default();
        let mut emitted = 0;
        let mut last_emitted: Option<String> = None;
        for key in current_keys {
            if let Some(after) = &resume_after {
                let inside_returned_prefix = request
                    .delimiter
                    .as_ref()
                    .is_some_and(|delimiter| after.ends_with(delimiter.as_str()))
                    && key.starts_with(after.as_str());
                if key <= *after || inside_returned_prefix {
                    continue;
                }
            }

            let common_prefix = request.delimiter.as_ref().and_then(|delimiter| {
                key[prefix.len()..]
                    .find(delimiter.as_str())
                    .map(|index| key[..prefix.len() + index + delimiter.len()].to_string())
            });
            if let Some(common_prefix) = &common_prefix {
                if listing.common_prefixes.last() == Some(common_prefix) {
                    continue;
                }
            }

            if emitted == page_size {
                listing.is_truncated = true;
                listing.next_continuation_token = last_emitted.clone();
                break;
            }
            emitted += 1;

            match common_prefix {
                Some(common_prefix) => {
                    last_emitted = Some(common_prefix.clone());
                    listing.common_prefixes.push(common_prefix);
                }
                None => {
                    last_emitted = Some(key.clone());
                    listing.contents.push(ObjectEntry {
                        key,
                        owner: request.fetch_owner.then(|| MOCK_OWNER.to_string()),
                    });
                }
            }
        }
        Ok(listing)
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        objects: Vec<ObjectIdentifier>,
        bypass_governance_retention: bool,
    ) -> Result<Vec<DeleteItemFailure>> {
        let cancel_token = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(StorageCall::DeleteObjects {
                objects: objects.clone(),
                bypass_governance_retention,
            });
            inner.delete_objects_calls += 1;
            let call = inner.delete_objects_calls;

            let cancel_token = match &inner.cancel_on_delete_objects_call {
                Some((n, token)) if *n == call => token.clone(),
                _ => {
                    if inner.fail_delete_objects_on_call == Some(call) {
                        return Err(injected_error(
                            "InternalError",
                            bucket,
                            None,
                            "delete_objects",
                        ));
                    }
                    if !inner.bucket_exists(bucket) {
                        return Err(injected_error(
                            "NoSuchBucket",
                            bucket,
                            None,
                            "delete_objects",
                        ));
                    }

                    let mut failures = Vec::new();
                    for object in &objects {
                        let injected = inner.bulk_delete_failures.get(object.key()).cloned();
                        let code = injected.or_else(|| inner.delete_one(object));
                        if let Some(code) = code {
                            failures.push(DeleteItemFailure {
                                key: object.key().to_string(),
                                version_id: object.version_id().map(str::to_string),
                                message: format!("{code} (mock)"),
                                code,
                            });
                        }
                    }
                    return Ok(failures);
                }
            };
            cancel_token
        };

        cancel_token.cancel();
        std::future::pending().await
    }

    async fn delete_object(
        &self,
        bucket: &str,
        object: &ObjectIdentifier,
        bypass_governance_retention: bool,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StorageCall::DeleteObject {
            object: object.clone(),
            bypass_governance_retention,
        });
        if let Some(code) = inner.single_delete_failures.get(object.key()) {
            return Err(injected_error(code, bucket, Some(object), "delete_object"));
        }
        match inner.delete_one(object) {
            Some(code) => Err(injected_error(&code, bucket, Some(object), "delete_object")),
            None => Ok(()),
        }
    }

    async fn put_object_legal_hold(
        &self,
        bucket: &str,
        object: &ObjectIdentifier,
        status: LegalHoldStatus,
    ) -> Result<()> {
        let cancel_token = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(StorageCall::PutObjectLegalHold {
                object: object.clone(),
                status,
            });
            inner.legal_hold_calls += 1;
            let call = inner.legal_hold_calls;

            let cancel_token = match &inner.cancel_on_legal_hold_call {
                Some((n, token)) if *n == call => Some(token.clone()),
                _ => None,
            };
            match cancel_token {
                Some(token) => token,
                None => return inner.put_legal_hold(bucket, object, status),
            }
        };

        cancel_token.cancel();
        std::future::pending().await
    }

    async fn head_bucket(&self, bucket: &str) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StorageCall::HeadBucket);
        Ok(inner.bucket_exists(bucket))
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StorageCall::DeleteBucket);
        if !inner.bucket_exists(bucket) {
            return Err(injected_error("NoSuchBucket", bucket, None, "delete_bucket"));
        }
        if inner.live().next().is_some() {
            return Err(injected_error("BucketNotEmpty", bucket, None, "delete_bucket"));
        }
        inner.bucket_deleted = !inner.bucket_survives_delete;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions_request(max_keys: i32) -> ListObjectVersionsRequest {
        ListObjectVersionsRequest {
            bucket: "bucket".to_string(),
            max_keys,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn version_listing_orders_newest_first_within_key() {
        let storage = MockStorage::new("bucket");
        let a1 = storage.put_object("a");
        let b1 = storage.put_object("b");
        let a2 = storage.put_delete_marker("a");

        let page = storage
            .list_object_versions(&versions_request(1000))
            .await
            .unwrap();

        assert!(!page.is_truncated);
        assert_eq!(page.delete_markers.len(), 1);
        assert_eq!(page.delete_markers[0].version_id, Some(a2));
        assert!(page.delete_markers[0].is_latest);
        let versions: Vec<_> = page
            .versions
            .iter()
            .map(|v| (v.key.as_str(), v.version_id.clone().unwrap(), v.is_latest))
            .collect();
        assert_eq!(versions, vec![("a", a1, false), ("b", b1, true)]);
    }

    #[tokio::test]
    async fn version_listing_resumes_after_markers() {
        let storage = MockStorage::new("bucket");
        storage.put_object("a");
        storage.put_object("a");
        storage.put_object("b");

        let first = storage
            .list_object_versions(&versions_request(2))
            .await
            .unwrap();
        assert!(first.is_truncated);
        assert_eq!(first.next_key_marker.as_deref(), Some("a"));

        let mut request = versions_request(2);
        request.key_marker = first.next_key_marker;
        request.version_id_marker = first.next_version_id_marker;
        let second = storage.list_object_versions(&request).await.unwrap();

        assert!(!second.is_truncated);
        assert_eq!(second.versions.len(), 1);
        assert_eq!(second.versions[0].key, "b");
    }

    #[tokio::test]
    async fn flat_listing_groups_common_prefixes() {
        let storage = MockStorage::new("bucket");
        for key in ["dir1/a", "dir1/b", "dir2/c", "top"] {
            storage.put_object(key);
        }
        storage.put_object("gone");
        storage.put_delete_marker("gone");

        let page = storage
            .list_objects_v2(&ListObjectsRequest {
                bucket: "bucket".to_string(),
                delimiter: Some("/".to_string()),
                max_keys: 1000,
                fetch_owner: true,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(page.common_prefixes, vec!["dir1/", "dir2/"]);
        assert_eq!(page.contents.len(), 1);
        assert_eq!(page.contents[0].key, "top");
        assert_eq!(page.contents[0].owner.as_deref(), Some(MOCK_OWNER));
    }

    #[tokio::test]
    async fn legal_hold_blocks_deletion_until_cleared() {
        let storage = MockStorage::new("bucket");
        let version_id = storage.put_object_with_legal_hold("held");
        let object = ObjectIdentifier::new("held", Some(version_id));

        let failures = storage
            .delete_objects("bucket", vec![object.clone()], true)
            .await
            .unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].code, "AccessDenied");

        storage
            .put_object_legal_hold("bucket", &object, LegalHoldStatus::Off)
            .await
            .unwrap();
        storage.delete_object("bucket", &object, true).await.unwrap();

        assert!(!storage.exists(&object));
    }
}
