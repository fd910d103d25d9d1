//! # Metrics
//!
//! Counters recorded by the handlers and the text exposition served on `/metrics`.
//!
//! Each [`Metrics`] owns its own [`prometheus::Registry`] rather than using the global one,
//! so two supervisors in the same process (as in the integration tests) never share counts.

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::string::FromUtf8Error;
use thiserror::Error;

/// Name of the counter advanced once per completed `/rent` chain.
pub const RENT_REQUESTS_TOTAL: &str = "rent_requests_total";

/// Errors raised while registering or encoding metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),

    #[error("metrics exposition is not valid UTF-8: {0}")]
    Encoding(#[from] FromUtf8Error),
}

/// A named, monotonically increasing counter.
///
/// Cloning is cheap and every clone advances the same underlying atomic, so the counter can
/// be handed to handlers running concurrently on different worker threads.
#[derive(Clone, Debug)]
pub struct RequestCounter {
    inner: IntCounter,
}

impl RequestCounter {
    pub fn new(name: &str, help: &str) -> Result<Self, MetricsError> {
        Ok(Self {
            inner: IntCounter::new(name, help)?,
        })
    }

    pub fn increment(&self) {
        self.inner.inc();
    }

    pub fn value(&self) -> u64 {
        self.inner.get()
    }
}

/// The process-wide metrics registry and the counters the handlers record into.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    rent_requests: RequestCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let rent_requests = RequestCounter::new(
            RENT_REQUESTS_TOTAL,
            "Number of /rent calls whose dependent /check call completed successfully",
        )?;
        registry.register(Box::new(rent_requests.inner.clone()))?;

        Ok(Self {
            registry,
            rent_requests,
        })
    }

    pub fn rent_requests(&self) -> &RequestCounter {
        &self.rent_requests
    }

    /// Renders every registered metric in the Prometheus text format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_is_shared_between_clones() {
        let metrics = Metrics::new().unwrap();
        let counter = metrics.rent_requests().clone();

        counter.increment();
        metrics.rent_requests().increment();

        assert_eq!(metrics.rent_requests().value(), 2);
        assert_eq!(counter.value(), 2);
    }

    #[test]
    fn test_render_exposes_counter() {
        let metrics = Metrics::new().unwrap();
        metrics.rent_requests().increment();

        let text = metrics.render().unwrap();
        assert!(text.contains("# TYPE rent_requests_total counter"));
        assert!(text.contains("rent_requests_total 1"));
    }

    #[test]
    fn test_registries_are_isolated() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();

        first.rent_requests().increment();
        assert_eq!(second.rent_requests().value(), 0);
    }
}
