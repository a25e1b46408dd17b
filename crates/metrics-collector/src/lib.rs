// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Metric providers for the operating system and the async runtime.
//!
//! [`standard_aggregator`] wires both under [`OS_SUBSYSTEM`] and
//! [`RUNTIME_SUBSYSTEM`]:
//!
//! ```rust,ignore
//! let config = CollectorConfig::from_env()?;
//! metrics_aggregator::logger::init(&config.log_level)?;
//!
//! let aggregator = metrics_collector::standard_aggregator(&config)?;
//! let os = aggregator.status_as::<OsStatus>(OS_SUBSYSTEM);
//! // ...
//! aggregator.shutdown()?;
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod cgroup;
pub mod config;
pub mod os;
pub mod proc;
pub mod runtime;
pub mod sampler;

pub use config::CollectorConfig;
pub use os::{OsMetricsProvider, OsStatus};
pub use runtime::{RuntimeMetricsProvider, RuntimeStatus};

use metrics_aggregator::{AggregatorError, MetricAggregator};

pub const OS_SUBSYSTEM: &str = "os";
pub const RUNTIME_SUBSYSTEM: &str = "runtime";

/// Builds an aggregator over the operating-system and runtime providers, in
/// that order. Must be called from within a tokio runtime.
pub fn standard_aggregator(config: &CollectorConfig) -> Result<MetricAggregator, AggregatorError> {
    config.validate()?;

    MetricAggregator::builder()
        .register(OS_SUBSYSTEM, OsMetricsProvider::spawn(config)?)
        .register(RUNTIME_SUBSYSTEM, RuntimeMetricsProvider::spawn(config)?)
        .build()
}
