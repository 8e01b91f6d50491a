pub mod args;

use crate::paginator::objects::ListObjectsOptions;
use crate::types::{ClientConfigLocation, S3Credentials, StoragePath};
use aws_sdk_s3::types::RequestPayer;
use aws_smithy_types::checksum_config::RequestChecksumCalculation;

/// Main configuration for an s3purge-rs run.
///
/// Holds the target bucket/prefix, AWS client settings, safety flags
/// (dry-run, force), and the mode of the run: emptying (the default) or the
/// flat listing data path when `listing` is set.
///
/// # Quick Start
///
/// Use [`Config::for_target`] for a minimal configuration with sensible defaults:
///
/// ```
/// use s3purge_rs::Config;
///
/// let config = Config::for_target("my-bucket", "logs/2024/");
/// assert_eq!(config.max_keys, 1000);
/// assert!(!config.force_destroy);
/// ```
///
/// Then customize fields as needed:
///
/// ```
/// use s3purge_rs::Config;
///
/// let mut config = Config::for_target("my-bucket", "");
/// config.force_destroy = true;
/// config.delete_bucket = true;
/// config.rate_limit_objects = Some(3_500);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub target: StoragePath,
    pub target_client_config: Option<ClientConfig>,
    pub tracing_config: Option<TracingConfig>,
    /// Clear legal holds and bypass governance retention when a version
    /// refuses to be deleted.
    pub force_destroy: bool,
    /// Delete the bucket itself once it has been emptied without errors.
    pub delete_bucket: bool,
    pub dry_run: bool,
    /// Skip the confirmation prompt.
    pub force: bool,
    /// Page size requested from ListObjectVersions / ListObjectsV2.
    pub max_keys: i32,
    pub rate_limit_objects: Option<u32>,
    /// Switches the run to the flat listing data path.
    pub listing: Option<ListObjectsOptions>,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

impl Config {
    /// Create a `Config` with sensible defaults for the given S3 bucket and prefix.
    ///
    /// The `force` flag is set to `true` to skip interactive confirmation
    /// prompts, which is appropriate for programmatic use.
    pub fn for_target(bucket: &str, prefix: &str) -> Self {
        Config {
            target: StoragePath::S3 {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
            },
            force: true,
            ..Config::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target: StoragePath::S3 {
                bucket: String::new(),
                prefix: String::new(),
            },
            target_client_config: None,
            tracing_config: None,
            force_destroy: false,
            delete_bucket: false,
            dry_run: false,
            force: false,
            max_keys: 1000,
            rate_limit_objects: None,
            listing: None,
            auto_complete_shell: None,
        }
    }
}

/// AWS S3 client configuration.
///
/// Turned into an `aws_sdk_s3::Client` by `ClientConfig::create_client()`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_config_location: ClientConfigLocation,
    pub credential: S3Credentials,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub accelerate: bool,
    pub request_payer: Option<RequestPayer>,
    pub retry_config: RetryConfig,
    pub cli_timeout_config: CLITimeoutConfig,
    pub disable_stalled_stream_protection: bool,
    pub request_checksum_calculation: RequestChecksumCalculation,
}

/// Retry configuration for AWS SDK operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub aws_max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CLITimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub operation_attempt_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
    pub read_timeout_milliseconds: Option<u64>,
}

/// Tracing (logging) configuration.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub aws_sdk_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}
