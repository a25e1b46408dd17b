// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Async-runtime metric provider.
//!
//! Reports on the tokio runtime that spawned it and on the process hosting
//! it: worker count, alive tasks, global queue depth, process thread count
//! and thread limit, and time since the provider started.

use crate::config::CollectorConfig;
use crate::proc;
use crate::sampler::Sampler;
use metrics_aggregator::{
    AggregatorError, Counter, Gauge, MetricBundle, MetricProvider, ProviderError, Status,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::debug;

/// Live runtime status. Every accessor reads the current value.
#[derive(Debug)]
pub struct RuntimeStatus {
    workers: Gauge,
    alive_tasks: Gauge,
    global_queue_depth: Gauge,
    threads: Gauge,
    threads_max: Gauge,
    uptime: Gauge,
    samples: Counter,
}

impl RuntimeStatus {
    fn register(bundle: &mut MetricBundle) -> Result<Self, AggregatorError> {
        Ok(Self {
            workers: bundle.register_gauge("runtime.workers")?,
            alive_tasks: bundle.register_gauge("runtime.tasks.alive")?,
            global_queue_depth: bundle.register_gauge("runtime.queue.depth")?,
            threads: bundle.register_gauge("threads.use")?,
            threads_max: bundle.register_gauge("threads.max")?,
            uptime: bundle.register_gauge("uptime")?,
            samples: bundle.register_counter("samples")?,
        })
    }

    #[must_use]
    pub fn workers(&self) -> f64 {
        self.workers.value()
    }

    #[must_use]
    pub fn alive_tasks(&self) -> f64 {
        self.alive_tasks.value()
    }

    #[must_use]
    pub fn global_queue_depth(&self) -> f64 {
        self.global_queue_depth.value()
    }

    #[must_use]
    pub fn threads(&self) -> f64 {
        self.threads.value()
    }

    #[must_use]
    pub fn threads_max(&self) -> f64 {
        self.threads_max.value()
    }

    /// Milliseconds since the provider was spawned.
    #[must_use]
    pub fn uptime_ms(&self) -> f64 {
        self.uptime.value()
    }

    #[must_use]
    pub fn samples(&self) -> u64 {
        self.samples.value()
    }
}

#[derive(Debug)]
struct RuntimeReader {
    runtime: Handle,
    proc_path: PathBuf,
    pid: u32,
    started: Instant,
}

impl RuntimeReader {
    fn sample(&self, status: &RuntimeStatus) {
        let metrics = self.runtime.metrics();
        status.workers.set(metrics.num_workers() as f64);
        status.alive_tasks.set(metrics.num_alive_tasks() as f64);
        status
            .global_queue_depth
            .set(metrics.global_queue_depth() as f64);

        let pids = [self.pid];
        match proc::get_threads_use_data(&self.proc_path, &pids) {
            Ok(threads) => status.threads.set(threads),
            Err(e) => debug!("Could not read thread count: {e}"),
        }
        status
            .threads_max
            .set(proc::get_threads_max_data(&self.proc_path, &pids));

        status
            .uptime
            .set(self.started.elapsed().as_secs_f64() * 1000.0);
        status.samples.increment();
    }
}

/// Metric provider for the tokio runtime and the threads of its process.
#[derive(Debug)]
pub struct RuntimeMetricsProvider {
    bundle: Arc<MetricBundle>,
    status: Arc<RuntimeStatus>,
    reader: Arc<RuntimeReader>,
    sampler: Sampler,
}

impl RuntimeMetricsProvider {
    /// Takes a first sample and starts sampling every
    /// `config.sample_interval`. Must be called from within a tokio runtime;
    /// that runtime is the one reported on.
    pub fn spawn(config: &CollectorConfig) -> Result<Self, AggregatorError> {
        Self::spawn_for_pid(config, std::process::id())
    }

    /// Like [`RuntimeMetricsProvider::spawn`], but counts threads of `pid`.
    pub fn spawn_for_pid(config: &CollectorConfig, pid: u32) -> Result<Self, AggregatorError> {
        config.validate()?;

        let mut bundle = MetricBundle::new();
        let status = Arc::new(RuntimeStatus::register(&mut bundle)?);
        let reader = Arc::new(RuntimeReader {
            runtime: Handle::current(),
            proc_path: config.proc_path.clone(),
            pid,
            started: Instant::now(),
        });
        reader.sample(&status);

        let sampler = {
            let reader = Arc::clone(&reader);
            let status = Arc::clone(&status);
            Sampler::spawn("runtime", config.sample_interval, move || {
                reader.sample(&status);
            })
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
    pub fn runtime_status(&self) -> Arc<RuntimeStatus> {
        Arc::clone(&self.status)
    }
}

impl MetricProvider for RuntimeMetricsProvider {
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
