// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use metrics_aggregator::AggregatorError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1000;
const DEFAULT_PROC_PATH: &str = "/proc";
const DEFAULT_CGROUP_PATH: &str = "/sys/fs/cgroup";
const DEFAULT_LOG_LEVEL: &str = "info";
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the operating-system and runtime providers
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// How often each provider refreshes its metrics
    pub sample_interval: Duration,
    /// Root of the proc filesystem
    pub proc_path: PathBuf,
    /// Root of the cgroup v1 hierarchy
    pub cgroup_path: PathBuf,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(DEFAULT_SAMPLE_INTERVAL_MS),
            proc_path: PathBuf::from(DEFAULT_PROC_PATH),
            cgroup_path: PathBuf::from(DEFAULT_CGROUP_PATH),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl CollectorConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, AggregatorError> {
        let sample_interval = env::var("METRICS_SAMPLE_INTERVAL_MS")
            .ok()
            .and_then(|ms| ms.trim().parse::<u64>().ok())
            .map_or(
                Duration::from_millis(DEFAULT_SAMPLE_INTERVAL_MS),
                Duration::from_millis,
            );
        let proc_path = env::var("METRICS_PROC_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_PROC_PATH));
        let cgroup_path = env::var("METRICS_CGROUP_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CGROUP_PATH));
        let log_level = env::var("METRICS_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        let config = Self {
            sample_interval,
            proc_path,
            cgroup_path,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AggregatorError> {
        if self.sample_interval.is_zero() {
            return Err(AggregatorError::InvalidConfig(
                "Sample interval must be greater than 0".to_string(),
            ));
        }

        if self.proc_path.as_os_str().is_empty() {
            return Err(AggregatorError::InvalidConfig(
                "METRICS_PROC_PATH cannot be empty".to_string(),
            ));
        }

        if self.cgroup_path.as_os_str().is_empty() {
            return Err(AggregatorError::InvalidConfig(
                "METRICS_CGROUP_PATH cannot be empty".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(AggregatorError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}
