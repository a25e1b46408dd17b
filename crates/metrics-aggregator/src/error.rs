// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// Errors raised while assembling an aggregator or its configuration.
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("Subsystem '{0}' is registered more than once")]
    DuplicateSubsystem(String),

    #[error("Subsystem name cannot be empty")]
    EmptySubsystemName,

    #[error("Metric '{0}' is registered more than once in the same bundle")]
    DuplicateMetric(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Errors reported by a provider while tearing itself down.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider already shut down")]
    AlreadyShutdown,

    #[error("Shutdown failed: {0}")]
    Shutdown(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single provider that failed during the aggregator's shutdown sequence.
#[derive(Debug)]
pub struct ProviderFailure {
    pub subsystem: String,
    pub source: ProviderError,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subsystem, self.source)
    }
}

/// Every provider failure observed by the one shutdown sequence that ran.
///
/// The remaining providers are still shut down when one of them fails, so
/// this carries all failures rather than only the first.
#[derive(Debug, thiserror::Error)]
#[error("{} provider(s) failed to shut down: {}", .failures.len(), join_failures(.failures))]
pub struct ShutdownError {
    pub failures: Vec<ProviderFailure>,
}

impl ShutdownError {
    /// Names of the subsystems that failed, in shutdown order.
    pub fn failed_subsystems(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.subsystem.as_str())
    }
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
