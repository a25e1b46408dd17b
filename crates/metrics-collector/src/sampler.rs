// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Background sampling loop shared by the providers.
//!
//! The loop runs on the tokio runtime current at spawn time and calls the
//! sampling closure once per tick until its cancellation token fires.

use metrics_aggregator::{ProviderError, ShutdownLatch};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
pub struct Sampler {
    name: &'static str,
    cancel_token: CancellationToken,
    stopped: ShutdownLatch,
    task: JoinHandle<()>,
}

impl Sampler {
    /// Spawns the loop. Must be called from within a tokio runtime.
    pub fn spawn<F>(name: &'static str, period: Duration, mut sample: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(provider = name, "Sampler started");

            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        debug!(provider = name, "Sampler stopped");
                        break;
                    }
                    _ = ticker.tick() => sample(),
                }
            }
        });

        Self {
            name,
            cancel_token,
            stopped: ShutdownLatch::new(),
            task,
        }
    }

    /// Cancels the loop and aborts its task. A second call reports
    /// [`ProviderError::AlreadyShutdown`].
    pub fn stop(&self) -> Result<(), ProviderError> {
        if !self.stopped.trigger() {
            return Err(ProviderError::AlreadyShutdown);
        }
        debug!(provider = self.name, "Stopping sampler");
        self.cancel_token.cancel();
        self.task.abort();
        Ok(())
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.is_triggered()
    }

    /// Whether the loop task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
