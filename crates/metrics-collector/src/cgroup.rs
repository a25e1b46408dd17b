// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! CPU usage and limit from cgroup v1 files.
//!
//! All CPU limits are reported in nanocores (1 core = 1,000,000,000 nanocores).
//! Outside a cgroup v1 hierarchy the files are missing and readers return
//! `None`, which is the normal case on most developer machines.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const NANOCORES_PER_CORE: f64 = 1_000_000_000.0;

// Total CPU time, in nanoseconds, consumed by all tasks in this cgroup
const CPU_USAGE_FILE: &str = "cpu/cpuacct.usage";
// CPUs that tasks in this cgroup are permitted to access
const CPUSET_CPUS_FILE: &str = "cpuset/cpuset.cpus";
// How often, in microseconds, the cgroup's CPU access is reallocated
const CPU_PERIOD_FILE: &str = "cpu/cpu.cfs_period_us";
// Total time, in microseconds, all tasks may run during one period
const CPU_QUOTA_FILE: &str = "cpu/cpu.cfs_quota_us";

/// Raw cgroup values, normalized to nanoseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CgroupStats {
    pub total: Option<u64>,
    pub cpu_count: Option<u64>,
    pub scheduler_period: Option<u64>,
    pub scheduler_quota: Option<u64>,
}

/// Cumulative CPU usage and effective limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuStats {
    /// Cumulative CPU usage in nanoseconds.
    pub total: f64,
    /// CPU limit in nanocores.
    pub limit: f64,
    /// Whether the limit fell back to the host CPU count.
    pub defaulted_limit: bool,
}

/// Reads CPU statistics below a cgroup v1 mount point.
#[derive(Debug, Clone)]
pub struct CgroupCpuReader {
    root: PathBuf,
}

impl CgroupCpuReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn read(&self) -> Option<CpuStats> {
        let cgroup_stats = read_cgroup_stats(&self.root);
        build_cpu_stats(&cgroup_stats, num_cpus::get() as u64)
    }
}

/// Builds CPU stats. Without a usage reading there is nothing to report.
pub fn build_cpu_stats(cgroup_stats: &CgroupStats, host_cpu_count: u64) -> Option<CpuStats> {
    let total = cgroup_stats.total?;

    let (limit, defaulted_limit) = compute_cpu_limit_nc(cgroup_stats, host_cpu_count);

    Some(CpuStats {
        total: total as f64,
        limit,
        defaulted_limit,
    })
}

pub fn read_cgroup_stats(root: &Path) -> CgroupStats {
    let usage_path = root.join(CPU_USAGE_FILE);
    let total = read_trimmed(&usage_path).and_then(|contents| contents.parse::<u64>().ok());
    if total.is_none() {
        debug!("Could not read CPU usage from {}", usage_path.display());
    }

    let cpuset_path = root.join(CPUSET_CPUS_FILE);
    let cpu_count = read_cpu_count_from_file(&cpuset_path).ok();
    if cpu_count.is_none() {
        debug!("Could not read CPU count from {}", cpuset_path.display());
    }

    let period_path = root.join(CPU_PERIOD_FILE);
    let scheduler_period = read_trimmed(&period_path)
        .and_then(|contents| contents.parse::<u64>().ok())
        .and_then(|period_us| period_us.checked_mul(1000));
    if scheduler_period.is_none() {
        debug!("Could not read scheduler period from {}", period_path.display());
    }

    let quota_path = root.join(CPU_QUOTA_FILE);
    let scheduler_quota = read_trimmed(&quota_path)
        .and_then(|contents| contents.parse::<i64>().ok())
        .and_then(|quota_us| {
            // -1 means the cgroup has no quota
            if quota_us < 0 {
                debug!("CFS scheduler quota is {quota_us}, treating as unlimited");
                None
            } else {
                quota_us.unsigned_abs().checked_mul(1000)
            }
        });
    if scheduler_quota.is_none() {
        debug!("Could not read scheduler quota from {}", quota_path.display());
    }

    CgroupStats {
        total,
        cpu_count,
        scheduler_period,
        scheduler_quota,
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|contents| contents.trim().to_string())
}

/// Reads CPU count from cpuset.cpus
///
/// The cpuset.cpus file contains a comma-separated list, with dashes to represent ranges of CPUs,
/// e.g., "0-2,16" represents CPUs 0, 1, 2, and 16
/// This function returns the count of CPUs, in this case 4.
pub fn read_cpu_count_from_file(path: &Path) -> Result<u64, io::Error> {
    let contents = fs::read_to_string(path)?;
    parse_cpuset(contents.trim())
}

pub fn parse_cpuset(cpuset: &str) -> Result<u64, io::Error> {
    if cpuset.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "cpuset is empty"));
    }

    let mut cpu_count: u64 = 0;

    for part in cpuset.split(',') {
        let range: Vec<&str> = part.split('-').collect();
        if range.len() == 2 {
            let start = parse_cpu_index(range[0], &range)?;
            let end = parse_cpu_index(range[1], &range)?;
            if end < start {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Range {range:?} ends before it starts"),
                ));
            }
            cpu_count = (end - start)
                .checked_add(1)
                .and_then(|count| cpu_count.checked_add(count))
                .ok_or_else(|| overflow_error(&range))?;
        } else {
            parse_cpu_index(part, &range)?;
            cpu_count = cpu_count
                .checked_add(1)
                .ok_or_else(|| overflow_error(&range))?;
        }
    }

    debug!("Total CPU count: {cpu_count}");
    Ok(cpu_count)
}

fn overflow_error(range: &[&str]) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("CPU count overflows at range {range:?}"),
    )
}

fn parse_cpu_index(value: &str, range: &[&str]) -> Result<u64, io::Error> {
    value.trim().parse().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse u64 from range {range:?}: {e}"),
        )
    })
}

/// Computes the CPU limit in nanocores, with fallback to host CPU count
fn compute_cpu_limit_nc(cgroup_stats: &CgroupStats, host_cpu_count: u64) -> (f64, bool) {
    match compute_cgroup_cpu_limit_nc(cgroup_stats, host_cpu_count) {
        Some(limit) => (limit, false),
        None => {
            debug!("No CPU limit found, defaulting to host CPU count: {host_cpu_count} CPUs");
            (host_cpu_count as f64 * NANOCORES_PER_CORE, true)
        }
    }
}

/// Computes the CPU limit in nanocores from cgroup statistics
/// Limit is computed using min(CPUSet, CFS CPU Quota)
fn compute_cgroup_cpu_limit_nc(cgroup_stats: &CgroupStats, host_cpu_count: u64) -> Option<f64> {
    let mut limit_nc = None;

    if let Some(cpu_count) = cgroup_stats.cpu_count {
        if cpu_count != host_cpu_count {
            let cpuset_limit_nc = cpu_count as f64 * NANOCORES_PER_CORE;
            limit_nc = Some(cpuset_limit_nc);
            debug!("CPU limit from cpuset: {cpu_count} CPUs ({cpuset_limit_nc} nanocores)");
        }
    }

    if let (Some(scheduler_quota), Some(scheduler_period)) =
        (cgroup_stats.scheduler_quota, cgroup_stats.scheduler_period)
    {
        if scheduler_period == 0 {
            debug!("CFS scheduler period is 0, ignoring quota");
            return limit_nc;
        }
        let quota_limit_nc =
            NANOCORES_PER_CORE * (scheduler_quota as f64 / scheduler_period as f64);
        match limit_nc {
            Some(current_limit_nc) if quota_limit_nc >= current_limit_nc => {
                debug!("Keeping cpuset limit: {current_limit_nc} nanocores");
            }
            _ => {
                limit_nc = Some(quota_limit_nc);
                debug!("CPU limit from cfs quota: {quota_limit_nc} nanocores");
            }
        }
    }
    limit_nc
}
