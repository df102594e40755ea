use std::env;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber. Logs go to stderr so stdout stays reserved
/// for command output; `JSON_LOG=true` switches to bunyan JSON lines.
pub fn init_logger() -> anyhow::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if !env::var("JSON_LOG").map_or(false, |s| s.parse().unwrap_or_default()) {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    }

    // Redirect the logs from log library to tracing's subscribers.
    LogTracer::init().context("unable to setup log tracer")?;

    let app_name = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION")).to_string();

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);
    let subscriber = Registry::default()
        .with(filter)
        .with(JsonStorageLayer)
        .with(bunyan_formatting_layer);
    tracing::subscriber::set_global_default(subscriber)
        .context("unable to install tracing subscriber")?;
    Ok(Some(guard))
}
