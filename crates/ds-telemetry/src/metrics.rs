//! Prometheus metrics for the sync engine.
//!
//! All metrics follow the naming convention: `ds_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., calls_dispatched_total)
//! - **Gauge**: Value that can go up or down (e.g., calls_pending)
//! - **Histogram**: Distribution of values (e.g., snapshot_cycle_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Engine metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DISPATCH METRICS
    // =========================================================================

    /// Actions submitted and registered for correlation
    pub static ref CALLS_DISPATCHED: IntCounter = IntCounter::new(
        "ds_dispatch_calls_dispatched_total",
        "Total actions submitted to the ledger"
    ).expect("metric creation failed");

    /// Dispatch attempts that failed before a call existed
    pub static ref DISPATCH_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("ds_dispatch_failures_total", "Dispatch failures by reason"),
        &["reason"] // not_ready, rejected, encode, gas, signing, register
    ).expect("metric creation failed");

    // =========================================================================
    // CORRELATION METRICS
    // =========================================================================

    /// Calls resolved
    pub static ref CALLS_RESOLVED: IntCounterVec = IntCounterVec::new(
        Opts::new("ds_correlator_calls_resolved_total", "Calls resolved by kind"),
        &["kind"] // reply, acknowledged
    ).expect("metric creation failed");

    /// Calls rejected
    pub static ref CALLS_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("ds_correlator_calls_rejected_total", "Calls rejected by reason"),
        &["reason"] // business, decode
    ).expect("metric creation failed");

    /// Calls that ran out of retries
    pub static ref CALLS_TIMED_OUT: IntCounter = IntCounter::new(
        "ds_correlator_calls_timed_out_total",
        "Total calls that exhausted their retry budget"
    ).expect("metric creation failed");

    /// Calls currently awaiting a reply
    pub static ref CALLS_PENDING: IntGauge = IntGauge::new(
        "ds_correlator_calls_pending",
        "Number of calls awaiting settlement"
    ).expect("metric creation failed");

    /// Events admitted by the tap
    pub static ref EVENTS_TAPPED: IntCounter = IntCounter::new(
        "ds_tap_events_total",
        "Total broadcast events delivered by the event tap"
    ).expect("metric creation failed");

    // =========================================================================
    // STATE SYNC METRICS
    // =========================================================================

    /// Aggregation cycles
    pub static ref SNAPSHOT_CYCLES: IntCounterVec = IntCounterVec::new(
        Opts::new("ds_state_snapshot_cycles_total", "Aggregation cycles by outcome"),
        &["outcome"] // ok, failed, superseded
    ).expect("metric creation failed");

    /// Version of the last published snapshot
    pub static ref SNAPSHOT_VERSION: IntGauge = IntGauge::new(
        "ds_state_snapshot_version",
        "Version of the currently published snapshot"
    ).expect("metric creation failed");

    /// Aggregation cycle duration
    pub static ref SNAPSHOT_CYCLE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "ds_state_snapshot_cycle_duration_seconds",
            "Time spent reading and publishing one snapshot"
        ).buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])
    ).expect("metric creation failed");

    /// Phase moves not present in the phase table
    pub static ref PHASE_VIOLATIONS: IntCounter = IntCounter::new(
        "ds_state_phase_violations_total",
        "Total observed phase transitions that are not allowed"
    ).expect("metric creation failed");

    /// Side effects emitted by reconciliation
    pub static ref SIDE_EFFECTS: IntCounterVec = IntCounterVec::new(
        Opts::new("ds_state_side_effects_total", "Side effects emitted by kind"),
        &["effect"]
    ).expect("metric creation failed");
}

/// Register all metrics with the engine registry.
///
/// Registering twice is not an error.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Dispatch
        Box::new(CALLS_DISPATCHED.clone()),
        Box::new(DISPATCH_FAILURES.clone()),
        // Correlation
        Box::new(CALLS_RESOLVED.clone()),
        Box::new(CALLS_REJECTED.clone()),
        Box::new(CALLS_TIMED_OUT.clone()),
        Box::new(CALLS_PENDING.clone()),
        Box::new(EVENTS_TAPPED.clone()),
        // State sync
        Box::new(SNAPSHOT_CYCLES.clone()),
        Box::new(SNAPSHOT_VERSION.clone()),
        Box::new(SNAPSHOT_CYCLE_DURATION.clone()),
        Box::new(PHASE_VIOLATIONS.clone()),
        Box::new(SIDE_EFFECTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics in the Prometheus text exposition format.
pub fn gather() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
