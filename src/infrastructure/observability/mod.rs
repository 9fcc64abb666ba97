//! Outbound observability: Prometheus metrics rendered from the event stream.
//! Nothing here listens on a socket; callers decide where the text goes.

pub mod metrics;

pub use metrics::{Metrics, MetricsListener};
