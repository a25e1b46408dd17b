// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Immutable subsystem-name to metric-bundle mapping.
//!
//! The registry is built once by the aggregator and exposes no operation that
//! adds, removes or replaces an entry, so readers on any thread can use it
//! without synchronization. Cloning shares the underlying storage.
//!
//! ```compile_fail
//! use metrics_aggregator::{MetricAggregator, MetricBundle, MetricProvider};
//! use std::sync::Arc;
//!
//! let providers: Vec<(String, Box<dyn MetricProvider>)> = Vec::new();
//! let aggregator = MetricAggregator::new(providers).unwrap();
//! aggregator.metrics().insert("os".to_string(), Arc::new(MetricBundle::new()));
//! ```

use crate::metric::MetricBundle;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct Entries {
    ordered: Vec<(String, Arc<MetricBundle>)>,
    index: HashMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct MetricRegistry {
    entries: Arc<Entries>,
}

impl MetricRegistry {
    /// Builds the registry. Names must already be unique; the aggregator
    /// rejects repeats before calling this.
    pub(crate) fn build<I>(bundles: I) -> Self
    where
        I: IntoIterator<Item = (String, Arc<MetricBundle>)>,
    {
        let ordered: Vec<_> = bundles.into_iter().collect();
        let index = ordered
            .iter()
            .enumerate()
            .map(|(position, (name, _))| (name.clone(), position))
            .collect();
        Self {
            entries: Arc::new(Entries { ordered, index }),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<MetricBundle>> {
        self.entries
            .index
            .get(name)
            .map(|&position| &self.entries.ordered[position].1)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.index.contains_key(name)
    }

    /// Subsystem names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.ordered.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<MetricBundle>)> {
        self.entries
            .ordered
            .iter()
            .map(|(name, bundle)| (name.as_str(), bundle))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.ordered.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.ordered.is_empty()
    }

    /// Looks up a single instrument as `<subsystem>` / `<metric>`.
    #[must_use]
    pub fn metric(&self, subsystem: &str, metric: &str) -> Option<&crate::metric::Metric> {
        self.get(subsystem)?.get(metric)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn bundle_with(metric: &str) -> Arc<MetricBundle> {
        let mut bundle = MetricBundle::new();
        bundle.register_gauge(metric).unwrap();
        Arc::new(bundle)
    }

    #[test]
    fn test_registry_keeps_registration_order() {
        let registry = MetricRegistry::build(vec![
            ("os".to_string(), bundle_with("cpu.load")),
            ("jvm".to_string(), bundle_with("heap.used")),
        ]);

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["os", "jvm"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.metric("os", "cpu.load").is_some());
        assert!(registry.metric("os", "heap.used").is_none());
        assert!(registry.metric("missing", "cpu.load").is_none());
    }

    #[test]
    fn test_registry_clone_shares_bundles() {
        let registry = MetricRegistry::build(vec![("os".to_string(), bundle_with("a"))]);
        let clone = registry.clone();
        assert!(Arc::ptr_eq(registry.get("os").unwrap(), clone.get("os").unwrap()));
    }

    #[test]
    fn test_empty_registry() {
        let registry = MetricRegistry::build(Vec::new());
        assert!(registry.is_empty());
        assert!(!registry.contains("os"));
        assert_eq!(registry.iter().count(), 0);
    }
}
