//! Analytics capability
//!
//! Injected into every pipeline layer. Recording is opportunistic and
//! fire-and-forget: implementations must swallow their own failures and
//! never block or fail the pipeline.

use std::sync::Arc;

/// Shared analytics worker interface.
pub trait Analytics: Send + Sync {
    /// Record that a screen with the given title became current.
    fn record_screen(&self, title: &str);

    /// Record that `method` ran on `class_name`.
    fn record_action(&self, class_name: &str, method: &str);
}

/// Analytics sink that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnalytics;

impl Analytics for NoopAnalytics {
    fn record_screen(&self, _title: &str) {}
    fn record_action(&self, _class_name: &str, _method: &str) {}
}

/// Convenience for the common no-analytics case.
#[must_use]
pub fn noop() -> Arc<dyn Analytics> {
    Arc::new(NoopAnalytics)
}
