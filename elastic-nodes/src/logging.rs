// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::env;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, Registry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV_VAR: &str = "ELASTIC_NODES_LOG";
pub const LOG_FORMAT_ENV_VAR: &str = "ELASTIC_NODES_LOG_FORMAT";
pub const LOG_SPAN_EVENTS_ENV_VAR: &str = "ELASTIC_NODES_LOG_SPAN_EVENTS";
pub const LOG_FILE_ENV_VAR: &str = "ELASTIC_NODES_LOG_FILE";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LogFormat {
    Json,
    Pretty,
    Compact,
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(verbose: bool) -> Result<()> {
    let filter = EnvFilter::new(filter_directive(env::var(LOG_ENV_VAR).ok(), verbose));
    let span_events = parse_span_events(env::var(LOG_SPAN_EVENTS_ENV_VAR).ok().as_deref());
    let format = parse_format(env::var(LOG_FORMAT_ENV_VAR).ok().as_deref());

    let stdout_layer = fmt_layer(format, span_events.clone(), std::io::stdout, true);
    let mut guard = None;
    let file_layer = build_file_writer().map(|(writer, file_guard)| {
        guard = Some(file_guard);
        fmt_layer(format, span_events, writer, false)
    });

    Registry::default()
        .with(filter)
        .with(tracing_error::ErrorLayer::default())
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    if let Some(guard) = guard {
        let _ = FILE_GUARD.set(guard);
    }
    Ok(())
}

fn fmt_layer<S, W>(
    format: LogFormat,
    span_events: FmtSpan,
    writer: W,
    ansi: bool,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(ansi)
        .with_timer(UtcTime::rfc_3339())
        .with_span_events(span_events)
        .with_writer(writer);
    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

fn filter_directive(from_env: Option<String>, verbose: bool) -> String {
    match from_env {
        Some(value) if !value.trim().is_empty() => value,
        _ if verbose => "debug".to_string(),
        _ => "info".to_string(),
    }
}

fn normalized(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_ascii_lowercase())
}

fn parse_format(value: Option<&str>) -> LogFormat {
    match normalized(value).as_deref() {
        Some("json") => LogFormat::Json,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::Compact,
    }
}

fn parse_span_events(value: Option<&str>) -> FmtSpan {
    match normalized(value).as_deref() {
        Some("new") => FmtSpan::NEW,
        Some("enter") => FmtSpan::ENTER,
        Some("exit") => FmtSpan::EXIT,
        Some("close") => FmtSpan::CLOSE,
        Some("active") => FmtSpan::ACTIVE,
        Some("full") => FmtSpan::FULL,
        _ => FmtSpan::NONE,
    }
}

fn build_file_writer() -> Option<(NonBlocking, WorkerGuard)> {
    let file_path = env::var(LOG_FILE_ENV_VAR)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())?;

    let path = Path::new(&file_path);
    let file_name = path.file_name()?.to_string_lossy().to_string();
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let appender = tracing_appender::rolling::never(dir, file_name);
    Some(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_filter_wins_over_verbosity() {
        assert_eq!(filter_directive(None, false), "info");
        assert_eq!(filter_directive(None, true), "debug");
        assert_eq!(
            filter_directive(Some("elastic_nodes=trace".to_string()), false),
            "elastic_nodes=trace"
        );
        assert_eq!(filter_directive(Some("  ".to_string()), true), "debug");
    }

    #[test]
    fn format_defaults_to_compact() {
        assert_eq!(parse_format(Some(" JSON ")), LogFormat::Json);
        assert_eq!(parse_format(Some("pretty")), LogFormat::Pretty);
        assert_eq!(parse_format(Some("xml")), LogFormat::Compact);
        assert_eq!(parse_format(None), LogFormat::Compact);
    }

    #[test]
    fn span_events_are_case_insensitive() {
        assert_eq!(parse_span_events(Some("Close")), FmtSpan::CLOSE);
        assert_eq!(parse_span_events(Some("full")), FmtSpan::FULL);
        assert_eq!(parse_span_events(Some("")), FmtSpan::NONE);
        assert_eq!(parse_span_events(None), FmtSpan::NONE);
    }
}
