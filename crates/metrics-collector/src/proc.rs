// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `/proc` parsing for process-level resource usage.
//!
//! ```text
//! /proc/
//!   ├── <pid>/
//!   │   ├── limits          # Resource limits (ulimit values)
//!   │   ├── fd/             # Open file descriptors (symlinks)
//!   │   └── task/           # One directory per thread
//!   └── uptime              # System uptime and idle time
//! ```
//!
//! Every function takes the `/proc` root so tests can point it at fixtures.

use regex::Regex;
use std::fs::{self, File};
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, trace};

/// Fallback when no `Max open files` soft limit can be read.
pub const FILE_DESCRIPTORS_DEFAULT_LIMIT: f64 = 1024.0;

/// Fallback when no `Max processes` soft limit can be read.
pub const PROCESSES_DEFAULT_LIMIT: f64 = 1024.0;

/// System uptime in milliseconds from `<proc>/uptime`.
///
/// The file holds two values, uptime and idle time in seconds; both must be
/// present for the line to be accepted.
pub fn get_uptime(proc_path: &Path) -> Result<f64, io::Error> {
    let file = File::open(proc_path.join("uptime"))?;
    let reader = io::BufReader::new(file);

    let Some(line) = reader.lines().next() else {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "Uptime data not found",
        ));
    };
    let line = line?;
    let mut values = line.split_whitespace();

    let uptime: Option<f64> = values.next().and_then(|s| s.parse().ok());
    let idle: Option<f64> = values.next().and_then(|s| s.parse().ok());

    match (uptime, idle) {
        (Some(uptime_secs), Some(_idle)) => Ok(uptime_secs * 1000.0),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Failed to parse uptime data",
        )),
    }
}

/// Minimum `Max open files` soft limit across `pids`, or
/// [`FILE_DESCRIPTORS_DEFAULT_LIMIT`] when none can be read.
#[must_use]
pub fn get_fd_max_data(proc_path: &Path, pids: &[u32]) -> f64 {
    static MAX_OPEN_FILES: OnceLock<Option<Regex>> = OnceLock::new();
    let re = MAX_OPEN_FILES.get_or_init(|| Regex::new(r"^Max open files\s+(\d+)").ok());
    min_soft_limit(proc_path, pids, re.as_ref(), FILE_DESCRIPTORS_DEFAULT_LIMIT)
}

/// Minimum `Max processes` soft limit across `pids`. This limit caps threads,
/// not processes.
#[must_use]
pub fn get_threads_max_data(proc_path: &Path, pids: &[u32]) -> f64 {
    static MAX_PROCESSES: OnceLock<Option<Regex>> = OnceLock::new();
    let re = MAX_PROCESSES.get_or_init(|| Regex::new(r"^Max processes\s+(\d+)").ok());
    min_soft_limit(proc_path, pids, re.as_ref(), PROCESSES_DEFAULT_LIMIT)
}

fn min_soft_limit(proc_path: &Path, pids: &[u32], re: Option<&Regex>, default: f64) -> f64 {
    let Some(re) = re else {
        return default;
    };
    let mut limit: Option<f64> = None;

    for &pid in pids {
        let limits_path = proc_path.join(pid.to_string()).join("limits");
        // The process may have exited or be unreadable
        let Ok(file) = File::open(&limits_path) else {
            continue;
        };

        let reader = io::BufReader::new(file);
        for line in reader.lines().map_while(Result::ok) {
            if let Some(captures) = re.captures(&line) {
                match captures[1].parse::<f64>() {
                    Ok(pid_limit) => limit = Some(limit.map_or(pid_limit, |l| l.min(pid_limit))),
                    Err(_) => debug!("Soft limit not parsable in {}", limits_path.display()),
                }
                break;
            }
        }
    }

    limit.unwrap_or(default)
}

/// Total number of open file descriptors across `pids`. Unreadable processes
/// are skipped.
#[must_use]
pub fn get_fd_use_data(proc_path: &Path, pids: &[u32]) -> f64 {
    let mut fd_use = 0;

    for &pid in pids {
        let fd_path = proc_path.join(pid.to_string()).join("fd");
        let Ok(files) = fs::read_dir(&fd_path) else {
            trace!("File descriptor use data not found in {}", fd_path.display());
            continue;
        };
        fd_use += files.count();
    }

    fd_use as f64
}

/// Total number of threads across `pids`.
///
/// Unlike the descriptor count, a missing task directory is an error: the
/// thread count would otherwise be silently low.
pub fn get_threads_use_data(proc_path: &Path, pids: &[u32]) -> Result<f64, io::Error> {
    let mut threads_use = 0;

    for &pid in pids {
        let task_path = proc_path.join(pid.to_string()).join("task");
        let Ok(entries) = fs::read_dir(&task_path) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Threads use data not found in {}", task_path.display()),
            ));
        };

        threads_use += entries
            .flatten()
            .filter_map(|entry| entry.file_type().ok())
            .filter(fs::FileType::is_dir)
            .count();
    }

    Ok(threads_use as f64)
}
