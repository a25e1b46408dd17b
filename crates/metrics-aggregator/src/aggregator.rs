// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Aggregator over a fixed, ordered set of named metric providers.
//!
//! ## Lifecycle
//!
//! 1. **Construction** (`new()` / `builder()`): names are validated, each
//!    provider's bundle is collected once and the registry is frozen.
//! 2. **Running**: `metrics()` and `status()` are served concurrently from any
//!    number of threads. Reads never block and never mutate.
//! 3. **Shutdown** (`shutdown()`): the first caller shuts every provider down
//!    in registration order. Every other caller, concurrent or later, returns
//!    `Ok(())` without side effects.
//!
//! Reads stay valid after shutdown; the values they return may be stale.

use crate::error::{AggregatorError, ShutdownError};
use crate::provider::{MetricProvider, Status};
use crate::registry::MetricRegistry;
use crate::shutdown::{shutdown_all, ShutdownLatch};
use crate::status::StatusView;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

struct Subsystem {
    name: String,
    provider: Box<dyn MetricProvider>,
}

pub struct MetricAggregator {
    subsystems: Vec<Subsystem>,
    registry: MetricRegistry,
    shutdown: ShutdownLatch,
}

impl fmt::Debug for MetricAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricAggregator")
            .field("subsystems", &self.subsystem_names())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl MetricAggregator {
    /// Creates an aggregator from `(name, provider)` pairs, kept in the order
    /// given.
    ///
    /// Fails without building anything if a name is empty or repeated.
    pub fn new<I, N>(providers: I) -> Result<Self, AggregatorError>
    where
        I: IntoIterator<Item = (N, Box<dyn MetricProvider>)>,
        N: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut subsystems = Vec::new();
        for (name, provider) in providers {
            let name = name.into();
            if name.trim().is_empty() {
                return Err(AggregatorError::EmptySubsystemName);
            }
            if !seen.insert(name.clone()) {
                return Err(AggregatorError::DuplicateSubsystem(name));
            }
            subsystems.push(Subsystem { name, provider });
        }

        let registry = MetricRegistry::build(
            subsystems
                .iter()
                .map(|subsystem| (subsystem.name.clone(), subsystem.provider.metrics())),
        );

        info!(subsystems = subsystems.len(), "Metric aggregator created");

        Ok(Self {
            subsystems,
            registry,
            shutdown: ShutdownLatch::new(),
        })
    }

    #[must_use]
    pub fn builder() -> MetricAggregatorBuilder {
        MetricAggregatorBuilder::default()
    }

    /// The immutable subsystem-name to bundle registry.
    #[must_use]
    pub fn metrics(&self) -> &MetricRegistry {
        &self.registry
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subsystems.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subsystems.is_empty()
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Shuts every provider down, exactly once per aggregator.
    ///
    /// Only the caller that wins the shutdown latch runs the sequence and can
    /// observe a [`ShutdownError`]. A failing provider does not stop the
    /// remaining ones; all failures are returned together. Every other call
    /// returns `Ok(())`.
    pub fn shutdown(&self) -> Result<(), ShutdownError> {
        if !self.shutdown.trigger() {
            debug!("Metric aggregator already shut down, skipping");
            return Ok(());
        }

        info!(
            subsystems = self.subsystems.len(),
            "Initiating metric aggregator shutdown"
        );
        shutdown_all(
            self.subsystems
                .iter()
                .map(|subsystem| (subsystem.name.as_str(), subsystem.provider.as_ref())),
        )
    }

    fn find(&self, name: &str) -> Option<&Subsystem> {
        self.subsystems.iter().find(|subsystem| subsystem.name == name)
    }
}

impl StatusView for MetricAggregator {
    fn status(&self, name: &str) -> Option<Status> {
        self.find(name).map(|subsystem| subsystem.provider.status())
    }

    fn subsystem_names(&self) -> Vec<&str> {
        self.subsystems
            .iter()
            .map(|subsystem| subsystem.name.as_str())
            .collect()
    }
}

/// Collects providers one at a time before building a [`MetricAggregator`].
#[derive(Default)]
pub struct MetricAggregatorBuilder {
    providers: Vec<(String, Box<dyn MetricProvider>)>,
}

impl MetricAggregatorBuilder {
    #[must_use]
    pub fn register<P>(mut self, name: impl Into<String>, provider: P) -> Self
    where
        P: MetricProvider + 'static,
    {
        self.providers.push((name.into(), Box::new(provider)));
        self
    }

    #[must_use]
    pub fn register_boxed(
        mut self,
        name: impl Into<String>,
        provider: Box<dyn MetricProvider>,
    ) -> Self {
        self.providers.push((name.into(), provider));
        self
    }

    pub fn build(self) -> Result<MetricAggregator, AggregatorError> {
        MetricAggregator::new(self.providers)
    }
}
