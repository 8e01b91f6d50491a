// Initializes the tracing subscriber for the CLI binary.
// Logs go to stderr; stdout carries the listing and the run summary.

use std::env;
use std::io::IsTerminal;

use tracing_subscriber::fmt::format::FmtSpan;

use s3purge_rs::config::TracingConfig;

const EVENT_FILTER_ENV_VAR: &str = "RUST_LOG";

const CRATE_TARGETS: [&str; 2] = ["s3purge_rs", "s3purge"];
const AWS_SDK_TARGETS: [&str; 3] = ["aws_smithy_runtime", "aws_config", "aws_sigv4"];

pub fn init_tracing(config: &TracingConfig) {
    let fmt_span = if config.span_events_tracing {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let (event_filter, show_target) =
        build_event_filter(config, env::var(EVENT_FILTER_ENV_VAR).ok());

    let subscriber_builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .compact()
        .with_ansi(!config.disable_color_tracing && std::io::stderr().is_terminal())
        .with_span_events(fmt_span)
        .with_env_filter(event_filter)
        .with_target(show_target);
    if config.json_tracing {
        subscriber_builder.json().init();
    } else {
        subscriber_builder.init();
    }
}

/// Returns the filter directives and whether event targets are shown.
///
/// `--aws-sdk-tracing` wins over `RUST_LOG`. Targets are only hidden when
/// nothing but this crate can log.
fn build_event_filter(config: &TracingConfig, rust_log: Option<String>) -> (String, bool) {
    let level = config.tracing_level;
    let directives = |targets: &[&str]| {
        targets
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    };

    if config.aws_sdk_tracing {
        let targets: Vec<&str> = CRATE_TARGETS.into_iter().chain(AWS_SDK_TARGETS).collect();
        return (directives(&targets), true);
    }
    match rust_log {
        Some(rust_log) => (rust_log, true),
        None => (directives(&CRATE_TARGETS), false),
    }
}
