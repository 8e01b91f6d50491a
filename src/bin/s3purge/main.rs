use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing::{debug, error, info, trace};

use s3purge_rs::config::Config;
use s3purge_rs::types::error::is_cancelled_error;
use s3purge_rs::{
    BucketEmptier, CLIArgs, ListObjectsOptions, ObjectLister, PurgeCancellationToken,
    SafetyChecker, create_cancellation_token, create_storage,
};

mod ctrl_c_handler;
mod tracing_init;

/// s3purge - empty versioned Amazon S3 buckets.
///
/// This binary is a thin wrapper over the s3purge-rs library.
#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config_exit_if_err();

    if let Some(shell) = config.auto_complete_shell {
        generate(
            shell,
            &mut CLIArgs::command(),
            "s3purge",
            &mut std::io::stdout(),
        );

        return Ok(());
    }

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    let exit_code = run(config).await?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}

#[cfg_attr(coverage_nightly, coverage(off))]
fn load_config_exit_if_err() -> Config {
    match Config::try_from(CLIArgs::parse()) {
        Ok(config) => config,
        Err(error_message) => {
            clap::Error::raw(clap::error::ErrorKind::ValueValidation, error_message).exit()
        }
    }
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    let Some(tracing_config) = config.tracing_config.as_ref() else {
        return false;
    };

    tracing_init::init_tracing(tracing_config);
    true
}

/// Returns the process exit code.
async fn run(config: Config) -> Result<i32> {
    let cancellation_token = create_cancellation_token();
    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    if let Some(options) = config.listing.clone() {
        return list(&config, options, cancellation_token).await;
    }

    if let Err(e) = SafetyChecker::new(&config).check_before_deletion() {
        if is_cancelled_error(&e) {
            println!("Cancelled.");
            return Ok(0);
        }
        return Err(e);
    }

    let bucket = config.target.bucket().to_string();
    let start_time = tokio::time::Instant::now();
    let emptier = BucketEmptier::from_config(&config, cancellation_token).await;

    if config.dry_run {
        let report = emptier.survey(&bucket).await?;
        println!(
            "[dry-run] {} object versions and {} delete markers under {} would be deleted.",
            report.versions, report.delete_markers, config.target
        );
        return Ok(0);
    }

    debug!(bucket = bucket, "s3purge start.");
    let result = if config.delete_bucket {
        emptier
            .empty_and_delete_bucket(&bucket, config.force_destroy)
            .await
    } else {
        emptier.empty(&bucket, config.force_destroy).await
    };
    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());

    match result {
        Ok(outcome) if outcome.has_errors() => {
            for item_error in &outcome.errors {
                error!("{}", item_error);
            }
            error!(
                deleted = outcome.deleted_count,
                failed = outcome.errors.len(),
                duration_sec = duration_sec,
                "s3purge completed with errors. Some object versions remain."
            );
            Ok(3)
        }
        Ok(outcome) => {
            info!(
                deleted = outcome.deleted_count,
                duration_sec = duration_sec,
                "s3purge has been completed."
            );
            println!(
                "{} object versions deleted from {}.",
                outcome.deleted_count, config.target
            );
            Ok(0)
        }
        Err(e) if e.is_cancelled() => {
            debug!(deleted = e.outcome.deleted_count, "s3purge cancelled by user.");
            Ok(0)
        }
        Err(e) => {
            for item_error in &e.outcome.errors {
                error!("{}", item_error);
            }
            error!(duration_sec = duration_sec, "{}", e);
            Ok(e.exit_code())
        }
    }
}

async fn list(
    config: &Config,
    options: ListObjectsOptions,
    cancellation_token: PurgeCancellationToken,
) -> Result<i32> {
    let storage = create_storage(config).await;
    let lister = ObjectLister::new(storage, config.target.bucket(), cancellation_token.clone());

    let listing = match lister.list(options).await {
        Ok(listing) => listing,
        Err(e) if is_cancelled_error(&e) => return Ok(0),
        Err(e) => {
            error!("{:#}", e);
            return Ok(1);
        }
    };

    for prefix in &listing.common_prefixes {
        println!("PRE {prefix}");
    }
    for key in &listing.keys {
        match listing.owners.get(key) {
            Some(owner) => println!("{key}\t{owner}"),
            None => println!("{key}"),
        }
    }

    Ok(0)
}
