// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ProviderError;
use crate::metric::MetricBundle;
use std::any::Any;
use std::sync::Arc;

/// A provider's live status object, shared rather than copied.
///
/// Use [`crate::StatusView::status_as`] to get it back as its concrete type.
pub type Status = Arc<dyn Any + Send + Sync>;

/// A subsystem that produces metrics and owns resources that must be released.
///
/// The aggregator calls [`MetricProvider::metrics`] once while it is being
/// built and [`MetricProvider::shutdown`] at most once over its lifetime.
/// Implementations should still tolerate a second `shutdown`, typically by
/// returning [`ProviderError::AlreadyShutdown`].
pub trait MetricProvider: Send + Sync {
    /// The provider's bundle of instruments.
    fn metrics(&self) -> Arc<MetricBundle>;

    /// The provider's current status object. Reads must stay valid after
    /// shutdown, even if the values stop changing.
    fn status(&self) -> Status;

    /// Releases sampling tasks and file handles held by the provider.
    fn shutdown(&self) -> Result<(), ProviderError>;
}

impl<P: MetricProvider + ?Sized> MetricProvider for Arc<P> {
    fn metrics(&self) -> Arc<MetricBundle> {
        (**self).metrics()
    }

    fn status(&self) -> Status {
        (**self).status()
    }

    fn shutdown(&self) -> Result<(), ProviderError> {
        (**self).shutdown()
    }
}
