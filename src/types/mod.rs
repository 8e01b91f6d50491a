use std::fmt;
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;

use zeroize_derive::{Zeroize, ZeroizeOnDrop};

use crate::types::error::ItemError;

pub mod error;
pub mod token;

/// One deletable unit in a bucket.
///
/// Either the current object body (`version_id` is `None`) or a specific
/// historical version or delete marker (`version_id` is set). An empty
/// version ID is normalized to `None` so both spellings identify the same
/// unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectIdentifier {
    key: String,
    version_id: Option<String>,
}

impl ObjectIdentifier {
    pub fn new(key: impl Into<String>, version_id: Option<String>) -> Self {
        Self {
            key: key.into(),
            version_id: version_id.filter(|v| !v.is_empty()),
        }
    }

    pub fn current(key: impl Into<String>) -> Self {
        Self::new(key, None)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.version_id {
            Some(version_id) => write!(f, "{}@{}", self.key, version_id),
            None => write!(f, "{}", self.key),
        }
    }
}

/// An entry of a version listing: either an object version or a delete marker,
/// depending on which list of [`VersionListingPage`] it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersionEntry {
    pub key: String,
    pub version_id: Option<String>,
    pub is_latest: bool,
}

impl ObjectVersionEntry {
    pub fn identifier(&self) -> ObjectIdentifier {
        ObjectIdentifier::new(self.key.clone(), self.version_id.clone())
    }
}

/// One page of a ListObjectVersions response.
///
/// The page carries the continuation markers S3 returned, but the paginator
/// that fetched it owns the cursor; pages are consumed once and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionListingPage {
    pub versions: Vec<ObjectVersionEntry>,
    pub delete_markers: Vec<ObjectVersionEntry>,
    pub is_truncated: bool,
    pub next_key_marker: Option<String>,
    pub next_version_id_marker: Option<String>,
}

/// An entry of a flat (ListObjectsV2) listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub owner: Option<String>,
}

/// One page of a ListObjectsV2 response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListingPage {
    pub contents: Vec<ObjectEntry>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// Request parameters for a single ListObjectVersions call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectVersionsRequest {
    pub bucket: String,
    pub prefix: Option<String>,
    pub max_keys: i32,
    pub key_marker: Option<String>,
    pub version_id_marker: Option<String>,
}

/// Request parameters for a single ListObjectsV2 call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsRequest {
    pub bucket: String,
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub max_keys: i32,
    pub continuation_token: Option<String>,
    pub start_after: Option<String>,
    pub fetch_owner: bool,
}

/// A per-item failure reported inside a quiet DeleteObjects response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteItemFailure {
    pub key: String,
    pub version_id: Option<String>,
    pub code: String,
    pub message: String,
}

/// Legal hold status of an object version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegalHoldStatus {
    On,
    Off,
}

/// Aggregate result of emptying a bucket.
///
/// `deleted_count` only ever counts versions whose removal was acknowledged
/// by S3: bulk-delete entries not reported as failures, plus successfully
/// remediated items. `errors` keeps every item-level failure in the order it
/// was encountered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeletionOutcome {
    pub deleted_count: i64,
    pub errors: Vec<ItemError>,
}

impl DeletionOutcome {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Target of a run: a bucket and an optional key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoragePath {
    S3 { bucket: String, prefix: String },
}

impl StoragePath {
    pub fn bucket(&self) -> &str {
        let StoragePath::S3 { bucket, .. } = self;
        bucket
    }

    /// The key prefix, or `None` when the whole bucket is targeted.
    pub fn prefix(&self) -> Option<&str> {
        let StoragePath::S3 { prefix, .. } = self;
        if prefix.is_empty() {
            None
        } else {
            Some(prefix)
        }
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let StoragePath::S3 { bucket, prefix } = self;
        write!(f, "s3://{bucket}/{prefix}")
    }
}

/// AWS configuration file locations.
#[derive(Debug, Clone)]
pub struct ClientConfigLocation {
    pub aws_config_file: Option<PathBuf>,
    pub aws_shared_credentials_file: Option<PathBuf>,
}

/// AWS credential sources.
#[derive(Debug, Clone)]
pub enum S3Credentials {
    Profile(String),
    Credentials { access_keys: AccessKeys },
    FromEnvironment,
}

/// AWS access key pair, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessKeys {
    pub access_key: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Debug for AccessKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys = f.debug_struct("AccessKeys");
        let session_token = self
            .session_token
            .as_ref()
            .map_or("None", |_| "** redacted **");
        keys.field("access_key", &self.access_key)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &session_token);
        keys.finish()
    }
}
