// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Metric instruments and the per-provider bundle that groups them.
//!
//! Instruments are handles over shared atomic cells. A provider keeps a clone
//! of each handle it registers and updates it from its sampling loop, while
//! every reader of the bundle observes the same cell.

use crate::error::AggregatorError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic counter.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.add(1);
    }

    pub fn add(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    #[must_use]
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Whether both handles point at the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

/// Point-in-time value. Stored as the bit pattern of an `f64`.
#[derive(Debug, Clone)]
pub struct Gauge {
    bits: Arc<AtomicU64>,
}

impl Default for Gauge {
    fn default() -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(0f64.to_bits())),
        }
    }
}

impl Gauge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bits, &other.bits)
    }
}

#[derive(Debug, Clone)]
pub enum Metric {
    Counter(Counter),
    Gauge(Gauge),
}

impl Metric {
    /// Current value as `f64`, whatever the instrument kind.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value(&self) -> f64 {
        match self {
            Metric::Counter(counter) => counter.value() as f64,
            Metric::Gauge(gauge) => gauge.value(),
        }
    }

    #[must_use]
    pub fn as_counter(&self) -> Option<&Counter> {
        match self {
            Metric::Counter(counter) => Some(counter),
            Metric::Gauge(_) => None,
        }
    }

    #[must_use]
    pub fn as_gauge(&self) -> Option<&Gauge> {
        match self {
            Metric::Gauge(gauge) => Some(gauge),
            Metric::Counter(_) => None,
        }
    }
}

/// Named collection of instruments produced by one provider, ordered by name.
///
/// A bundle is assembled with [`MetricBundle::register_counter`] and
/// [`MetricBundle::register_gauge`] and then shared as `Arc<MetricBundle>`,
/// after which it is read-only.
#[derive(Debug, Clone, Default)]
pub struct MetricBundle {
    metrics: BTreeMap<String, Metric>,
}

impl MetricBundle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_counter(
        &mut self,
        name: impl Into<String>,
    ) -> Result<Counter, AggregatorError> {
        let counter = Counter::new();
        self.insert(name.into(), Metric::Counter(counter.clone()))?;
        Ok(counter)
    }

    pub fn register_gauge(&mut self, name: impl Into<String>) -> Result<Gauge, AggregatorError> {
        let gauge = Gauge::new();
        self.insert(name.into(), Metric::Gauge(gauge.clone()))?;
        Ok(gauge)
    }

    fn insert(&mut self, name: String, metric: Metric) -> Result<(), AggregatorError> {
        if self.metrics.contains_key(&name) {
            return Err(AggregatorError::DuplicateMetric(name));
        }
        self.metrics.insert(name, metric);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Metric)> {
        self.metrics.iter().map(|(name, metric)| (name.as_str(), metric))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
