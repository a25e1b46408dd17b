// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::provider::Status;
use std::any::Any;
use std::sync::Arc;

/// Read-only access to the live status of each registered subsystem.
pub trait StatusView {
    /// Status object of the subsystem registered under `name`.
    fn status(&self, name: &str) -> Option<Status>;

    /// Names that [`StatusView::status`] answers for, in registration order.
    fn subsystem_names(&self) -> Vec<&str>;

    /// Typed accessor. Returns `None` for an unknown name or when the status
    /// object is not a `T`.
    fn status_as<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
        Self: Sized,
    {
        self.status(name)?.downcast::<T>().ok()
    }
}
