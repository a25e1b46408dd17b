// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Exactly-once teardown.
//!
//! The latch decides, across every concurrent caller, the single caller that
//! runs the shutdown sequence. The decision is one compare-and-swap; a caller
//! that loses the race returns without touching any provider.

use crate::error::{ProviderError, ProviderFailure, ShutdownError};
use crate::provider::MetricProvider;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// One-shot flag that only ever moves from not-triggered to triggered.
#[derive(Debug, Default)]
pub struct ShutdownLatch {
    triggered: AtomicBool,
}

impl ShutdownLatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for exactly one caller over the latch's lifetime.
    pub fn trigger(&self) -> bool {
        self.triggered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }
}

/// Shuts down every provider in order, continuing past failures.
///
/// A provider that panics is recorded as a failure like any other error.
pub(crate) fn shutdown_all<'a, I>(providers: I) -> Result<(), ShutdownError>
where
    I: IntoIterator<Item = (&'a str, &'a dyn MetricProvider)>,
{
    let mut failures = Vec::new();

    for (name, provider) in providers {
        debug!(subsystem = name, "Shutting down metric provider");
        let outcome = catch_unwind(AssertUnwindSafe(|| provider.shutdown()))
            .unwrap_or_else(|payload| Err(panic_error(payload.as_ref())));
        match outcome {
            Ok(()) => debug!(subsystem = name, "Metric provider shut down"),
            Err(source) => {
                warn!(subsystem = name, error = %source, "Metric provider failed to shut down");
                failures.push(ProviderFailure {
                    subsystem: name.to_string(),
                    source,
                });
            }
        }
    }

    if failures.is_empty() {
        info!("Metric aggregator shutdown complete");
        Ok(())
    } else {
        warn!(
            failed = failures.len(),
            "Metric aggregator shutdown completed with failures"
        );
        Err(ShutdownError { failures })
    }
}

fn panic_error(payload: &(dyn Any + Send)) -> ProviderError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    ProviderError::Shutdown(format!("panicked: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::MetricBundle;
    use crate::provider::Status;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;

    struct StubProvider {
        panics: bool,
        shutdowns: AtomicUsize,
    }

    impl StubProvider {
        fn new(panics: bool) -> Self {
            Self {
                panics,
                shutdowns: AtomicUsize::new(0),
            }
        }
    }

    impl MetricProvider for StubProvider {
        fn metrics(&self) -> Arc<MetricBundle> {
            Arc::new(MetricBundle::new())
        }

        fn status(&self) -> Status {
            Arc::new(())
        }

        fn shutdown(&self) -> Result<(), ProviderError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            if self.panics {
                panic!("sampler poisoned");
            }
            Ok(())
        }
    }

    #[test]
    fn test_shutdown_all_continues_past_panic() {
        let broken = StubProvider::new(true);
        let healthy = StubProvider::new(false);

        let err = shutdown_all([
            ("os", &broken as &dyn MetricProvider),
            ("jvm", &healthy as &dyn MetricProvider),
        ])
        .unwrap_err();

        assert_eq!(healthy.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(err.failed_subsystems().collect::<Vec<_>>(), vec!["os"]);
        assert!(matches!(
            &err.failures[0].source,
            ProviderError::Shutdown(message) if message == "panicked: sampler poisoned"
        ));
    }

    #[test]
    fn test_panic_error_reads_string_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let opaque: Box<dyn Any + Send> = Box::new(42_u8);
        assert!(matches!(
            panic_error(owned.as_ref()),
            ProviderError::Shutdown(message) if message == "panicked: owned"
        ));
        assert!(matches!(
            panic_error(opaque.as_ref()),
            ProviderError::Shutdown(message) if message == "panicked: unknown panic payload"
        ));
    }

    #[test]
    fn test_latch_triggers_once() {
        let latch = ShutdownLatch::new();
        assert!(!latch.is_triggered());
        assert!(latch.trigger());
        assert!(latch.is_triggered());
        assert!(!latch.trigger());
        assert!(latch.is_triggered());
    }

    #[test]
    fn test_latch_has_single_winner_under_contention() {
        const THREADS: usize = 32;
        let latch = Arc::new(ShutdownLatch::new());
        let barrier = Arc::new(Barrier::new(THREADS));
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let latch = Arc::clone(&latch);
                let barrier = Arc::clone(&barrier);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    barrier.wait();
                    if latch.trigger() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("latch thread panicked");
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
