// Prometheus metrics for the execution endpoint

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Duration;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

lazy_static! {
    pub static ref EXECUTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("judgebox_executions_total", "Executions by language and outcome"),
        &["language", "outcome"]
    )
    .expect("valid executions_total metric");

    pub static ref EXECUTION_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "judgebox_execution_duration_seconds",
            "Wall-clock time from request to outcome, compile included"
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0]),
        &["language"]
    )
    .expect("valid execution_duration metric");

    pub static ref EXECUTIONS_IN_FLIGHT: IntGauge = IntGauge::new(
        "judgebox_executions_in_flight",
        "Executions currently compiling, running or waiting for a slot"
    )
    .expect("valid in_flight metric");

    static ref REGISTRY: Registry = {
        let registry = Registry::new();
        registry
            .register(Box::new(EXECUTIONS_TOTAL.clone()))
            .expect("register executions_total");
        registry
            .register(Box::new(EXECUTION_DURATION.clone()))
            .expect("register execution_duration");
        registry
            .register(Box::new(EXECUTIONS_IN_FLIGHT.clone()))
            .expect("register in_flight");
        registry
    };
}

/// Holds the in-flight gauge up until dropped, including when the request is abandoned.
pub struct InFlight;

impl InFlight {
    pub fn enter() -> Self {
        EXECUTIONS_IN_FLIGHT.inc();
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        EXECUTIONS_IN_FLIGHT.dec();
    }
}

pub fn observe(language: &str, outcome: &str, elapsed: Duration) {
    EXECUTIONS_TOTAL.with_label_values(&[language, outcome]).inc();
    EXECUTION_DURATION
        .with_label_values(&[language])
        .observe(elapsed.as_secs_f64());
}

pub fn render() -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
