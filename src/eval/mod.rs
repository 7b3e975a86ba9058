pub mod metrics;

pub use metrics::ErrorMetrics;
