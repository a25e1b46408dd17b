// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use metrics_aggregator::StatusView;
use metrics_collector::{
    standard_aggregator, CollectorConfig, OsStatus, RuntimeStatus, OS_SUBSYSTEM,
    RUNTIME_SUBSYSTEM,
};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

fn config() -> CollectorConfig {
    CollectorConfig {
        sample_interval: Duration::from_millis(50),
        ..CollectorConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_standard_aggregator_wires_os_and_runtime() {
    let aggregator = standard_aggregator(&config()).expect("standard wiring builds");

    assert_eq!(
        aggregator.subsystem_names(),
        vec![OS_SUBSYSTEM, RUNTIME_SUBSYSTEM]
    );
    let registry = aggregator.metrics();
    assert!(registry.metric(OS_SUBSYSTEM, "cpu.count").is_some());
    assert!(registry.metric(RUNTIME_SUBSYSTEM, "runtime.workers").is_some());

    let os = aggregator
        .status_as::<OsStatus>(OS_SUBSYSTEM)
        .expect("os status is an OsStatus");
    let runtime = aggregator
        .status_as::<RuntimeStatus>(RUNTIME_SUBSYSTEM)
        .expect("runtime status is a RuntimeStatus");
    assert!(aggregator.status_as::<RuntimeStatus>(OS_SUBSYSTEM).is_none());

    assert!(os.cpu_count() >= 1.0);
    assert!((runtime.workers() - 2.0).abs() < f64::EPSILON);

    let os_samples = os.samples();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(os.samples() > os_samples, "sampler keeps refreshing");

    aggregator.shutdown().expect("providers shut down cleanly");
    aggregator.shutdown().expect("second call is a no-op");
    assert!(aggregator.is_shut_down());

    // Reads stay valid after shutdown, and values stop moving.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let frozen = os.samples();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(os.samples(), frozen);
    assert!(aggregator.status(OS_SUBSYSTEM).is_some());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_standard_aggregator_reads_live_proc() {
    let aggregator = standard_aggregator(&config()).expect("standard wiring builds");

    let os = aggregator
        .status_as::<OsStatus>(OS_SUBSYSTEM)
        .expect("os status is an OsStatus");
    assert!(os.open_file_descriptors() > 0.0);
    assert!(os.uptime_ms() > 0.0);

    let runtime = aggregator
        .status_as::<RuntimeStatus>(RUNTIME_SUBSYSTEM)
        .expect("runtime status is a RuntimeStatus");
    assert!(runtime.threads() >= 1.0);

    aggregator.shutdown().expect("providers shut down cleanly");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_shutdown_from_many_tasks() {
    let aggregator = Arc::new(standard_aggregator(&config()).expect("standard wiring builds"));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let aggregator = Arc::clone(&aggregator);
            tokio::task::spawn_blocking(move || aggregator.shutdown())
        })
        .collect();

    // A provider shut down twice would report AlreadyShutdown, so every call
    // succeeding means each sampler was stopped exactly once.
    for task in tasks {
        task.await
            .expect("shutdown task panicked")
            .expect("no provider reports a failure");
    }
    assert!(aggregator.is_shut_down());
}

#[test]
#[serial]
fn test_config_from_env_with_defaults() {
    for key in [
        "METRICS_SAMPLE_INTERVAL_MS",
        "METRICS_PROC_PATH",
        "METRICS_CGROUP_PATH",
        "METRICS_LOG_LEVEL",
    ] {
        std::env::remove_var(key);
    }

    let config = CollectorConfig::from_env().expect("defaults are valid");
    assert_eq!(config.sample_interval, Duration::from_secs(1));
    assert_eq!(config.proc_path, std::path::PathBuf::from("/proc"));
    assert_eq!(config.cgroup_path, std::path::PathBuf::from("/sys/fs/cgroup"));
    assert_eq!(config.log_level, "info");
}

#[test]
#[serial]
fn test_config_from_env_overrides() {
    std::env::set_var("METRICS_SAMPLE_INTERVAL_MS", "250");
    std::env::set_var("METRICS_PROC_PATH", "/host/proc");
    std::env::set_var("METRICS_LOG_LEVEL", "DEBUG");

    let config = CollectorConfig::from_env().expect("overrides are valid");
    assert_eq!(config.sample_interval, Duration::from_millis(250));
    assert_eq!(config.proc_path, std::path::PathBuf::from("/host/proc"));
    assert_eq!(config.log_level, "debug");

    std::env::set_var("METRICS_SAMPLE_INTERVAL_MS", "0");
    assert!(CollectorConfig::from_env().is_err());

    std::env::set_var("METRICS_SAMPLE_INTERVAL_MS", "not-a-number");
    let config = CollectorConfig::from_env().expect("unparsable interval falls back");
    assert_eq!(config.sample_interval, Duration::from_secs(1));

    for key in [
        "METRICS_SAMPLE_INTERVAL_MS",
        "METRICS_PROC_PATH",
        "METRICS_LOG_LEVEL",
    ] {
        std::env::remove_var(key);
    }
}
