//! Prometheus metrics for the proxy
//!
//! - HTTP request counts and latency per matched route
//! - Access decisions by outcome
//! - Downstream failures by service
//!
//! Labels are bounded: paths are route templates, statuses are bucketed and
//! no caller identifiers are ever used as label values.

pub mod endpoint;
pub mod metrics;
pub mod recorder;

pub use endpoint::*;
pub use self::metrics::*;
pub use recorder::*;
