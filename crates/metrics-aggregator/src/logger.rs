// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log line formatting and subscriber setup for processes embedding the
//! aggregator.
//!
//! Lines look like:
//!
//! ```text
//! METRICS | INFO | Initiating metric aggregator shutdown subsystems=2
//! METRICS | WARN | sampler{provider="os"}: Metric provider failed to shut down subsystem="os"
//! ```

use crate::error::AggregatorError;
use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

const PREFIX: &str = "METRICS";

/// Prefixes every event with `METRICS | LEVEL | ` followed by the active span
/// scope, root first.
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(&mut writer, "{PREFIX} | {} | ", event.metadata().level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Installs a global subscriber using [`Formatter`], filtered at `log_level`.
///
/// `log_level` accepts anything `EnvFilter` does, e.g. `info` or
/// `metrics_aggregator=debug,warn`.
pub fn init(log_level: &str) -> Result<(), AggregatorError> {
    let filter = EnvFilter::try_new(log_level)
        .map_err(|e| AggregatorError::Logging(format!("invalid log level '{log_level}': {e}")))?;

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .event_format(Formatter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AggregatorError::Logging(e.to_string()))?;

    tracing::debug!("Logging subsystem enabled");
    Ok(())
}
