/*!
# Overview
s3purge-rs empties Amazon S3 buckets, versioned ones included.

It removes every object version, then every delete marker, under a bucket
or a key prefix, and can delete the bucket afterwards. Versions protected
by a legal hold can be force-destroyed: the hold is cleared and the version
deleted once more.

## Features
- **Bulk deletion**: one DeleteObjects request per listing page (up to 1000 keys)
- **Two-phase emptying**: versions first, delete markers from a fresh listing
- **Legal hold remediation**: opt-in with `force_destroy`
- **Honest accounting**: deleted count plus every item-level failure, and
  the partial outcome when a page-level failure stops the run
- **Directory buckets**: S3 Express One Zone buckets are drained from the flat listing
- **Flat listing**: capped ListObjectsV2 enumeration with delimiter and owner support

## As a Library
The s3purge CLI is a thin wrapper over this library.

```toml
[dependencies]
s3purge-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use s3purge_rs::config::args::parse_from_args;
use s3purge_rs::{BucketEmptier, Config, create_cancellation_token};

#[tokio::main]
async fn main() {
    let args = vec!["s3purge", "s3://my-bucket/logs/", "--force"];

    let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();
    let emptier = BucketEmptier::from_config(&config, create_cancellation_token()).await;

    match emptier.empty(config.target.bucket(), config.force_destroy).await {
        Ok(outcome) => {
            println!("{} object versions deleted", outcome.deleted_count);
            for error in &outcome.errors {
                eprintln!("{error}");
            }
        }
        Err(e) => eprintln!("{e}"),
    }
}
```
*/

#![allow(clippy::collapsible_if)]

pub mod config;
pub mod deleter;
pub mod emptier;
pub mod lister;
pub mod paginator;
pub mod safety;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;


pub use config::Config;
pub use config::args::{CLIArgs, build_config_from_args, parse_from_args};
pub use deleter::{BatchDeleter, LegalHoldRemediator, PageDeletion, RemediationOutcome};
pub use emptier::{BucketEmptier, SurveyReport};
pub use lister::{BucketObjectListing, ObjectLister};
pub use paginator::objects::{ListObjectsOptions, ListObjectsPaginator};
pub use paginator::versions::ListObjectVersionsPaginator;
pub use safety::SafetyChecker;
pub use storage::{Storage, StorageTrait, create_storage};
pub use types::error::{
    DeletionError, EmptyBucketError, ItemError, RemediationError, S3purgeError,
    exit_code_from_error, is_cancelled_error,
};
pub use types::token::{PurgeCancellationToken, create_cancellation_token};
pub use types::{DeletionOutcome, ObjectIdentifier, StoragePath};
