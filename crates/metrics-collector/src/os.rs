// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Operating-system metric provider.
//!
//! Samples the process's cgroup CPU usage and limit, the host CPU count,
//! system uptime and the process's file descriptor usage and limit.
//!
//! | metric      | kind    | unit         |
//! |-------------|---------|--------------|
//! | `cpu.usage` | gauge   | nanoseconds  |
//! | `cpu.limit` | gauge   | nanocores    |
//! | `cpu.count` | gauge   | logical CPUs |
//! | `uptime`    | gauge   | milliseconds |
//! | `fd.use`    | gauge   | descriptors  |
//! | `fd.max`    | gauge   | descriptors  |
//! | `samples`   | counter | samples      |

use crate::cgroup::CgroupCpuReader;
use crate::config::CollectorConfig;
use crate::proc;
use crate::sampler::Sampler;
use metrics_aggregator::{
    AggregatorError, Counter, Gauge, MetricBundle, MetricProvider, ProviderError, Status,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Live operating-system status. Every accessor reads the current value.
#[derive(Debug)]
pub struct OsStatus {
    cpu_usage: Gauge,
    cpu_limit: Gauge,
    cpu_limit_defaulted: AtomicBool,
    cpu_count: Gauge,
    uptime: Gauge,
    fd_use: Gauge,
    fd_max: Gauge,
    samples: Counter,
}

impl OsStatus {
    fn register(bundle: &mut MetricBundle) -> Result<Self, AggregatorError> {
        Ok(Self {
            cpu_usage: bundle.register_gauge("cpu.usage")?,
            cpu_limit: bundle.register_gauge("cpu.limit")?,
            cpu_limit_defaulted: AtomicBool::new(true),
            cpu_count: bundle.register_gauge("cpu.count")?,
            uptime: bundle.register_gauge("uptime")?,
            fd_use: bundle.register_gauge("fd.use")?,
            fd_max: bundle.register_gauge("fd.max")?,
            samples: bundle.register_counter("samples")?,
        })
    }

    /// Cumulative CPU time consumed by the cgroup, in nanoseconds.
    #[must_use]
    pub fn cpu_usage_ns(&self) -> f64 {
        self.cpu_usage.value()
    }

    /// Effective CPU limit in nanocores.
    #[must_use]
    pub fn cpu_limit_nanocores(&self) -> f64 {
        self.cpu_limit.value()
    }

    /// Whether the CPU limit is the host CPU count rather than a cgroup limit.
    #[must_use]
    pub fn cpu_limit_defaulted(&self) -> bool {
        self.cpu_limit_defaulted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn cpu_count(&self) -> f64 {
        self.cpu_count.value()
    }

    #[must_use]
    pub fn uptime_ms(&self) -> f64 {
        self.uptime.value()
    }

    #[must_use]
    pub fn open_file_descriptors(&self) -> f64 {
        self.fd_use.value()
    }

    #[must_use]
    pub fn file_descriptor_limit(&self) -> f64 {
        self.fd_max.value()
    }

    #[must_use]
    pub fn samples(&self) -> u64 {
        self.samples.value()
    }
}

#[derive(Debug)]
struct OsReader {
    proc_path: PathBuf,
    cpu: CgroupCpuReader,
    pid: u32,
}

impl OsReader {
    fn sample(&self, status: &OsStatus) {
        status.cpu_count.set(num_cpus::get() as f64);

        match self.cpu.read() {
            Some(cpu) => {
                status.cpu_usage.set(cpu.total);
                status.cpu_limit.set(cpu.limit);
                status
                    .cpu_limit_defaulted
                    .store(cpu.defaulted_limit, Ordering::Relaxed);
            }
            None => debug!("Skipping CPU metrics, no cgroup CPU data available"),
        }

        match proc::get_uptime(&self.proc_path) {
            Ok(uptime) => status.uptime.set(uptime),
            Err(e) => debug!("Could not read uptime: {e}"),
        }

        let pids = [self.pid];
        status
            .fd_use
            .set(proc::get_fd_use_data(&self.proc_path, &pids));
        status
            .fd_max
            .set(proc::get_fd_max_data(&self.proc_path, &pids));

        status.samples.increment();
    }
}

/// Metric provider for the operating system the process runs on.
#[derive(Debug)]
pub struct OsMetricsProvider {
    bundle: Arc<MetricBundle>,
    status: Arc<OsStatus>,
    reader: Arc<OsReader>,
    sampler: Sampler,
}

impl OsMetricsProvider {
    /// Takes a first sample and starts sampling every
    /// `config.sample_interval`. Must be called from within a tokio runtime.
    pub fn spawn(config: &CollectorConfig) -> Result<Self, AggregatorError> {
        Self::spawn_for_pid(config, std::process::id())
    }

    /// Like [`OsMetricsProvider::spawn`], but reports descriptors of `pid`.
    pub fn spawn_for_pid(config: &CollectorConfig, pid: u32) -> Result<Self, AggregatorError> {
        config.validate()?;

        let mut bundle = MetricBundle::new();
        let status = Arc::new(OsStatus::register(&mut bundle)?);
        let reader = Arc::new(OsReader {
            proc_path: config.proc_path.clone(),
            cpu: CgroupCpuReader::new(&config.cgroup_path),
            pid,
        });
        reader.sample(&status);

        let sampler = {
            let reader = Arc::clone(&reader);
            let status = Arc::clone(&status);
            Sampler::spawn("os", config.sample_interval, move || reader.sample(&status))
        };

        Ok(Self {
            bundle: Arc::new(bundle),
            status,
            reader,
            sampler,
        })
    }

    /// Refreshes every metric immediately, outside the sampling schedule.
    pub fn sample_now(&self) {
        self.reader.sample(&self.status);
    }

    #[must_use]
    pub fn os_status(&self) -> Arc<OsStatus> {
        Arc::clone(&self.status)
    }
}

impl MetricProvider for OsMetricsProvider {
    fn metrics(&self) -> Arc<MetricBundle> {
        Arc::clone(&self.bundle)
    }

    fn status(&self) -> Status {
        self.status.clone()
    }

    fn shutdown(&self) -> Result<(), ProviderError> {
        self.sampler.stop()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, CollectorConfig) {
        let dir = TempDir::new().unwrap();
        let proc_path = dir.path().join("proc");
        let cgroup_path = dir.path().join("cgroup");

        fs::create_dir_all(proc_path.join("7").join("fd")).unwrap();
        for fd in 0..5 {
            fs::write(proc_path.join("7").join("fd").join(fd.to_string()), "").unwrap();
        }
        fs::write(
            proc_path.join("7").join("limits"),
            "Max open files            4096                 8192                 files\n",
        )
        .unwrap();
        fs::write(proc_path.join("uptime"), "12.5 40.0\n").unwrap();

        fs::create_dir_all(cgroup_path.join("cpu")).unwrap();
        fs::write(cgroup_path.join("cpu").join("cpuacct.usage"), "987654321\n").unwrap();
        fs::write(cgroup_path.join("cpu").join("cpu.cfs_period_us"), "100000\n").unwrap();
        fs::write(cgroup_path.join("cpu").join("cpu.cfs_quota_us"), "150000\n").unwrap();

        let config = CollectorConfig {
            sample_interval: Duration::from_secs(3600),
            proc_path,
            cgroup_path,
            ..CollectorConfig::default()
        };
        (dir, config)
    }

    #[tokio::test]
    async fn test_os_provider_samples_fixture() {
        let (_dir, config) = fixture();
        let provider = OsMetricsProvider::spawn_for_pid(&config, 7).unwrap();
        let status = provider.os_status();

        assert!(status.samples() >= 1);
        assert!((status.cpu_usage_ns() - 987_654_321.0).abs() < f64::EPSILON);
        assert!((status.cpu_limit_nanocores() - 1_500_000_000.0).abs() < 1e-3);
        assert!(!status.cpu_limit_defaulted());
        assert!((status.uptime_ms() - 12_500.0).abs() < f64::EPSILON);
        assert!((status.open_file_descriptors() - 5.0).abs() < f64::EPSILON);
        assert!((status.file_descriptor_limit() - 4096.0).abs() < f64::EPSILON);
        assert!(status.cpu_count() >= 1.0);

        let bundle = provider.metrics();
        assert_eq!(
            bundle.names().collect::<Vec<_>>(),
            vec!["cpu.count", "cpu.limit", "cpu.usage", "fd.max", "fd.use", "samples", "uptime"]
        );
        assert!((bundle.get("fd.use").unwrap().value() - 5.0).abs() < f64::EPSILON);

        provider.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_sample_now_sees_new_values() {
        let (_dir, config) = fixture();
        let provider = OsMetricsProvider::spawn_for_pid(&config, 7).unwrap();
        let samples = provider.os_status().samples();

        fs::write(config.proc_path.join("7").join("fd").join("9"), "").unwrap();
        provider.sample_now();

        let status = provider.os_status();
        assert!(status.samples() > samples);
        assert!((status.open_file_descriptors() - 6.0).abs() < f64::EPSILON);
        provider.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_os_provider_second_shutdown_reports_error() {
        let (_dir, config) = fixture();
        let provider = OsMetricsProvider::spawn_for_pid(&config, 7).unwrap();
        provider.shutdown().unwrap();
        assert!(matches!(
            provider.shutdown(),
            Err(ProviderError::AlreadyShutdown)
        ));
    }

    #[tokio::test]
    async fn test_os_provider_rejects_invalid_config() {
        let config = CollectorConfig {
            sample_interval: Duration::ZERO,
            ..CollectorConfig::default()
        };
        assert!(matches!(
            OsMetricsProvider::spawn(&config),
            Err(AggregatorError::InvalidConfig(_))
        ));
    }
}
