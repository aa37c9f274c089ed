//! Worker tasks that back the decision runtime.
//!
//! The batch worker coalesces reasoning requests into tiered service calls;
//! metrics are shared between it and the scheduler.

mod batch;
mod metrics;

pub(crate) use batch::BatchWorker;
pub use metrics::{DecisionMetrics, MetricsSnapshot};
