use std::net::SocketAddr;

use crate::config::EngineConfig;

// ── Booking path ────────────────────────────────────────────────

/// Counter: reservations committed.
pub const RESERVATIONS_CREATED_TOTAL: &str = "courtside_reservations_created_total";

/// Counter: booking attempts rejected. Labels: reason.
pub const BOOKINGS_REJECTED_TOTAL: &str = "courtside_bookings_rejected_total";

/// Histogram: time spent inside the booking critical section, in seconds.
pub const BOOKING_COMMIT_DURATION_SECONDS: &str = "courtside_booking_commit_duration_seconds";

/// Counter: advisory quotes served. Labels: status.
pub const QUOTES_TOTAL: &str = "courtside_quotes_total";

// ── Lifecycle ───────────────────────────────────────────────────

/// Counter: lifecycle transitions applied. Labels: action, status.
pub const TRANSITIONS_TOTAL: &str = "courtside_transitions_total";

/// Counter: cancellations that kept a non-zero fee.
pub const CANCELLATIONS_WITH_FEE_TOTAL: &str = "courtside_cancellations_with_fee_total";

/// Counter: reservations marked no-show by the sweeper.
pub const NO_SHOWS_SWEPT_TOTAL: &str = "courtside_no_shows_swept_total";

// ── Payments ────────────────────────────────────────────────────

/// Counter: ledger entries posted or updated. Labels: status.
pub const PAYMENTS_TOTAL: &str = "courtside_payments_total";

// ── Facility ────────────────────────────────────────────────────

/// Gauge: registered courts.
pub const COURTS_REGISTERED: &str = "courtside_courts_registered";

/// Install Prometheus metrics exporter on `config.metrics_port`. No-op if unset.
pub fn init(config: &EngineConfig) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = config.metrics_port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Install the fmt subscriber. Safe to call more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt().try_init();
}
