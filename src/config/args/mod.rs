use crate::config::{CLITimeoutConfig, ClientConfig, Config, RetryConfig, TracingConfig};
use crate::paginator::objects::ListObjectsOptions;
use crate::types::{AccessKeys, ClientConfigLocation, S3Credentials, StoragePath};
use aws_sdk_s3::types::RequestPayer;
use aws_smithy_types::checksum_config::RequestChecksumCalculation;
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::ffi::OsString;
use std::path::PathBuf;


const DEFAULT_AWS_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_INITIAL_BACKOFF_MILLISECONDS: u64 = 100;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_AWS_SDK_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;
const DEFAULT_FORCE_PATH_STYLE: bool = false;
const DEFAULT_DRY_RUN: bool = false;
const DEFAULT_MAX_KEYS: i32 = 1000;
const DEFAULT_DISABLE_STALLED_STREAM_PROTECTION: bool = false;
const DEFAULT_ACCELERATE: bool = false;
const DEFAULT_REQUEST_PAYER: bool = false;
const DEFAULT_FORCE: bool = false;
const DEFAULT_FORCE_DESTROY: bool = false;
const DEFAULT_DELETE_BUCKET: bool = false;
const DEFAULT_LIST: bool = false;
const DEFAULT_FETCH_OWNER: bool = false;

const ERROR_MESSAGE_INVALID_TARGET: &str =
    "Target must be an S3 path starting with 's3://' (e.g., s3://bucket/prefix).";
const ERROR_MESSAGE_DELETE_BUCKET_WITH_PREFIX: &str =
    "--delete-bucket cannot be used with a prefix. Target the whole bucket (s3://bucket).";
const ERROR_MESSAGE_LISTING_OPTION_WITHOUT_LIST: &str =
    "--delimiter, --start-after, --fetch-owner and --list-max-keys require --list.";
const ERROR_MESSAGE_ACCESS_KEY_WITHOUT_SECRET: &str =
    "--target-access-key requires --target-secret-key.";

fn check_s3_target(s: &str) -> Result<String, String> {
    if s.starts_with("s3://") && s.len() > 5 {
        Ok(s.to_string())
    } else {
        Err(ERROR_MESSAGE_INVALID_TARGET.to_string())
    }
}

/// s3purge - empty versioned Amazon S3 buckets.
///
/// Deletes every object version and delete marker under the target, and
/// optionally the bucket itself.
///
/// Example:
///   s3purge s3://my-bucket --dry-run
///   s3purge s3://my-bucket/logs/ --force
///   s3purge s3://my-bucket --force-destroy --delete-bucket -v
///   s3purge s3://my-bucket/logs/ --list --delimiter /
#[derive(Parser, Clone, Debug)]
#[command(name = "s3purge", version, about, long_about = None)]
pub struct CLIArgs {
    #[arg(
        env,
        help = "s3://<BUCKET_NAME>[/prefix]",
        value_parser = check_s3_target,
        default_value_if("auto_complete_shell", clap::builder::ArgPredicate::IsPresent, "s3://ignored"),
        required = false,
    )]
    pub target: String,

    /// Count what would be deleted without deleting anything.
    #[arg(short = 'd', long, env, default_value_t = DEFAULT_DRY_RUN, help_heading = "General")]
    pub dry_run: bool,

    /// Skip the confirmation prompt.
    #[arg(short = 'f', long, env, default_value_t = DEFAULT_FORCE, help_heading = "General")]
    pub force: bool,

    #[arg(long, env, default_value_t = DEFAULT_FORCE_DESTROY, help_heading = "Deletion",
        long_help = r#"Delete object versions protected by a legal hold or governance retention.
Versions refused with AccessDenied get their legal hold cleared and are
deleted once more. Bulk deletes bypass governance retention."#)]
    pub force_destroy: bool,

    /// Delete the bucket after it has been emptied without errors.
    #[arg(long, env, default_value_t = DEFAULT_DELETE_BUCKET, conflicts_with = "list", help_heading = "Deletion")]
    pub delete_bucket: bool,

    /// Keys per listing page and per DeleteObjects request (1-1000).
    #[arg(long, env, default_value_t = DEFAULT_MAX_KEYS,
        value_parser = clap::value_parser!(i32).range(1..=1000), help_heading = "Deletion")]
    pub max_keys: i32,

    /// List the current objects under the target instead of deleting.
    #[arg(long, env, default_value_t = DEFAULT_LIST, help_heading = "Listing")]
    pub list: bool,

    /// Group keys up to this delimiter into common prefixes.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "Listing")]
    pub delimiter: Option<String>,

    /// Start listing after this key.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "Listing")]
    pub start_after: Option<String>,

    /// Include the owner of each object.
    #[arg(long, env, default_value_t = DEFAULT_FETCH_OWNER, help_heading = "Listing")]
    pub fetch_owner: bool,

    /// Stop listing after this many keys.
    #[arg(long, env, help_heading = "Listing")]
    pub list_max_keys: Option<usize>,

    /// Maximum objects per second (at least 10).
    #[arg(long, env, value_parser = clap::value_parser!(u32).range(10..), help_heading = "Performance")]
    pub rate_limit_objects: Option<u32>,

    /// Verbosity level. -q (quiet), default (normal), -v, -vv, -vvv.
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Output logs in JSON format.
    #[arg(long, env, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    /// Enable AWS SDK tracing.
    #[arg(long, env, default_value_t = DEFAULT_AWS_SDK_TRACING, help_heading = "Logging")]
    pub aws_sdk_tracing: bool,

    /// Enable tracing span events.
    #[arg(long, env, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Logging")]
    pub span_events_tracing: bool,

    /// Disable colored output in logs.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,

    /// Maximum retry attempts for AWS SDK operations. Default: 10.
    #[arg(long, env, default_value_t = DEFAULT_AWS_MAX_ATTEMPTS, help_heading = "Retry")]
    pub aws_max_attempts: u32,

    /// Initial backoff in milliseconds for retries. Default: 100.
    #[arg(long, env, default_value_t = DEFAULT_INITIAL_BACKOFF_MILLISECONDS, help_heading = "Retry")]
    pub initial_backoff_milliseconds: u64,

    /// Overall operation timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub operation_timeout_milliseconds: Option<u64>,

    /// Per-attempt operation timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub operation_attempt_timeout_milliseconds: Option<u64>,

    /// Connection timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub connect_timeout_milliseconds: Option<u64>,

    /// Read timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub read_timeout_milliseconds: Option<u64>,

    /// AWS config file path.
    #[arg(long, env, help_heading = "AWS")]
    pub aws_config_file: Option<PathBuf>,

    /// AWS shared credentials file path.
    #[arg(long, env, help_heading = "AWS")]
    pub aws_shared_credentials_file: Option<PathBuf>,

    /// AWS profile for the target. If not set, uses the default profile.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(),
        conflicts_with = "target_access_key", help_heading = "AWS")]
    pub target_profile: Option<String>,

    /// AWS access key ID for the target.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub target_access_key: Option<String>,

    /// AWS secret access key for the target.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub target_secret_key: Option<String>,

    /// AWS session token for the target.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub target_session_token: Option<String>,

    /// AWS region for the target.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub target_region: Option<String>,

    /// Custom S3-compatible endpoint URL (e.g. MinIO, Wasabi).
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub target_endpoint_url: Option<String>,

    /// Force path-style access (required for some S3-compatible services).
    #[arg(long, env, default_value_t = DEFAULT_FORCE_PATH_STYLE, help_heading = "AWS")]
    pub target_force_path_style: bool,

    /// Enable S3 Transfer Acceleration.
    #[arg(long, env, default_value_t = DEFAULT_ACCELERATE, help_heading = "AWS")]
    pub target_accelerate: bool,

    /// Enable requester-pays for the target bucket.
    #[arg(long, env, default_value_t = DEFAULT_REQUEST_PAYER, help_heading = "AWS")]
    pub target_request_payer: bool,

    /// Disable stalled stream protection.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_STALLED_STREAM_PROTECTION, help_heading = "AWS")]
    pub disable_stalled_stream_protection: bool,

    /// Generate shell completions.
    #[arg(long, env, help_heading = "Advanced")]
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

/// Parse command-line arguments into a `CLIArgs` struct.
///
/// # Example
///
/// ```
/// use s3purge_rs::config::args::parse_from_args;
///
/// let args = vec!["s3purge", "s3://my-bucket/prefix/", "--dry-run"];
/// let cli_args = parse_from_args(args).unwrap();
/// assert!(cli_args.dry_run);
/// ```
pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

/// Parse arguments and build a Config in one step.
pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(cli_args)
}

impl CLIArgs {
    fn validate(&self, target: &StoragePath) -> Result<(), String> {
        if self.delete_bucket && target.prefix().is_some() {
            return Err(ERROR_MESSAGE_DELETE_BUCKET_WITH_PREFIX.to_string());
        }
        let has_listing_option = self.delimiter.is_some()
            || self.start_after.is_some()
            || self.fetch_owner
            || self.list_max_keys.is_some();
        if has_listing_option && !self.list {
            return Err(ERROR_MESSAGE_LISTING_OPTION_WITHOUT_LIST.to_string());
        }
        if self.target_access_key.is_some() && self.target_secret_key.is_none() {
            return Err(ERROR_MESSAGE_ACCESS_KEY_WITHOUT_SECRET.to_string());
        }
        Ok(())
    }

    fn build_client_config(&self) -> Option<ClientConfig> {
        let credential = if let Some(ref profile) = self.target_profile {
            S3Credentials::Profile(profile.clone())
        } else if let Some(ref access_key) = self.target_access_key {
            S3Credentials::Credentials {
                access_keys: AccessKeys {
                    access_key: access_key.clone(),
                    secret_access_key: self.target_secret_key.clone().unwrap_or_default(),
                    session_token: self.target_session_token.clone(),
                },
            }
        } else {
            S3Credentials::FromEnvironment
        };

        let request_payer = if self.target_request_payer {
            Some(RequestPayer::Requester)
        } else {
            None
        };

        Some(ClientConfig {
            client_config_location: ClientConfigLocation {
                aws_config_file: self.aws_config_file.clone(),
                aws_shared_credentials_file: self.aws_shared_credentials_file.clone(),
            },
            credential,
            region: self.target_region.clone(),
            endpoint_url: self.target_endpoint_url.clone(),
            force_path_style: self.target_force_path_style,
            accelerate: self.target_accelerate,
            request_payer,
            retry_config: RetryConfig {
                aws_max_attempts: self.aws_max_attempts,
                initial_backoff_milliseconds: self.initial_backoff_milliseconds,
            },
            cli_timeout_config: CLITimeoutConfig {
                operation_timeout_milliseconds: self.operation_timeout_milliseconds,
                operation_attempt_timeout_milliseconds: self.operation_attempt_timeout_milliseconds,
                connect_timeout_milliseconds: self.connect_timeout_milliseconds,
                read_timeout_milliseconds: self.read_timeout_milliseconds,
            },
            disable_stalled_stream_protection: self.disable_stalled_stream_protection,
            request_checksum_calculation: RequestChecksumCalculation::WhenRequired,
        })
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let log_level = self.verbosity.log_level()?;

        Some(TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            aws_sdk_tracing: self.aws_sdk_tracing,
            span_events_tracing: self.span_events_tracing,
            disable_color_tracing: self.disable_color_tracing,
        })
    }

    fn build_listing_options(&self, target: &StoragePath) -> Option<ListObjectsOptions> {
        if !self.list {
            return None;
        }

        Some(ListObjectsOptions {
            prefix: target.prefix().map(str::to_string),
            delimiter: self.delimiter.clone(),
            start_after: self.start_after.clone(),
            fetch_owner: self.fetch_owner,
            page_size: self.max_keys,
            max_keys: self.list_max_keys,
        })
    }

    fn parse_target(&self) -> Result<StoragePath, String> {
        let without_scheme = self
            .target
            .strip_prefix("s3://")
            .ok_or_else(|| ERROR_MESSAGE_INVALID_TARGET.to_string())?;

        let (bucket, prefix) = match without_scheme.split_once('/') {
            Some((bucket, prefix)) => (bucket.to_string(), prefix.to_string()),
            None => (without_scheme.to_string(), String::new()),
        };

        if bucket.is_empty() {
            return Err(ERROR_MESSAGE_INVALID_TARGET.to_string());
        }

        Ok(StoragePath::S3 { bucket, prefix })
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        let target = args.parse_target()?;
        args.validate(&target)?;

        let listing = args.build_listing_options(&target);
        let target_client_config = args.build_client_config();
        let tracing_config = args.build_tracing_config();

        Ok(Config {
            target,
            target_client_config,
            tracing_config,
            force_destroy: args.force_destroy,
            delete_bucket: args.delete_bucket,
            dry_run: args.dry_run,
            force: args.force,
            max_keys: args.max_keys,
            rate_limit_objects: args.rate_limit_objects,
            listing,
            auto_complete_shell: args.auto_complete_shell,
        })
    }
}
