// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Metrics Aggregator
//!
//! Composes independent metric providers into a single named registry,
//! exposes a read-only status view over them and tears them all down exactly
//! once, whichever thread asks first.
//!
//! - [`MetricProvider`]: what a subsystem must offer (bundle, status, shutdown)
//! - [`MetricBundle`], [`Counter`], [`Gauge`]: the instruments a provider exposes
//! - [`MetricRegistry`]: immutable subsystem-name to bundle map
//! - [`StatusView`]: live, per-subsystem status access
//! - [`MetricAggregator`]: owns the providers and coordinates shutdown
//!
//! ```rust,ignore
//! let aggregator = MetricAggregator::builder()
//!     .register("os", os_provider)
//!     .register("runtime", runtime_provider)
//!     .build()?;
//!
//! let cpu = aggregator.metrics().metric("os", "cpu.usage");
//! let status = aggregator.status_as::<OsStatus>("os");
//!
//! aggregator.shutdown()?; // later calls are no-ops
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod aggregator;
pub mod error;
pub mod logger;
pub mod metric;
pub mod provider;
pub mod registry;
pub mod shutdown;
pub mod status;

pub use aggregator::{MetricAggregator, MetricAggregatorBuilder};
pub use error::{AggregatorError, ProviderError, ProviderFailure, ShutdownError};
pub use metric::{Counter, Gauge, Metric, MetricBundle};
pub use provider::{MetricProvider, Status};
pub use registry::MetricRegistry;
pub use shutdown::ShutdownLatch;
pub use status::StatusView;
