use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

/// How far around the start time a check-in is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInWindow {
    pub early_minutes: i64,
    pub late_minutes: i64,
}

impl Default for CheckInWindow {
    fn default() -> Self {
        Self {
            early_minutes: 15,
            late_minutes: 30,
        }
    }
}

/// Notice thresholds for the cancellation fee.
///
/// With at least `free_hours` of notice nothing is charged; with at least
/// `half_fee_hours` half the deposit is kept; otherwise the whole deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancellationPolicy {
    pub free_hours: i64,
    pub half_fee_hours: i64,
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self {
            free_hours: 24,
            half_fee_hours: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub check_in: CheckInWindow,
    pub cancellation: CancellationPolicy,
    /// Share of the final amount required as deposit when the caller gives none.
    pub deposit_ratio: Decimal,
    pub sweep_interval: Duration,
    pub metrics_port: Option<u16>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_in: CheckInWindow::default(),
            cancellation: CancellationPolicy::default(),
            deposit_ratio: Decimal::new(30, 2),
            sweep_interval: Duration::from_secs(60),
            metrics_port: None,
        }
    }
}

/// Parse a raw setting, keeping `default` when it is missing or malformed.
fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    parse_or(std::env::var(key).ok(), default)
}

impl EngineConfig {
    /// Load from `COURTSIDE_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        let check_in = CheckInWindow {
            early_minutes: env_or("COURTSIDE_CHECKIN_EARLY_MINUTES", d.check_in.early_minutes),
            late_minutes: env_or("COURTSIDE_CHECKIN_LATE_MINUTES", d.check_in.late_minutes),
        };
        let cancellation = CancellationPolicy {
            free_hours: env_or("COURTSIDE_CANCEL_FREE_HOURS", d.cancellation.free_hours),
            half_fee_hours: env_or("COURTSIDE_CANCEL_HALF_HOURS", d.cancellation.half_fee_hours),
        };
        let deposit_ratio = env_or("COURTSIDE_DEPOSIT_RATIO", d.deposit_ratio);
        let deposit_ratio = if deposit_ratio < Decimal::ZERO || deposit_ratio > Decimal::ONE {
            tracing::warn!("COURTSIDE_DEPOSIT_RATIO {deposit_ratio} out of [0, 1], using default");
            d.deposit_ratio
        } else {
            deposit_ratio
        };
        let sweep_secs: u64 = env_or("COURTSIDE_SWEEP_INTERVAL_SECS", d.sweep_interval.as_secs());
        let metrics_port: Option<u16> = std::env::var("COURTSIDE_METRICS_PORT")
            .ok()
            .and_then(|s| s.parse().ok());

        Self {
            check_in,
            cancellation,
            deposit_ratio,
            sweep_interval: Duration::from_secs(sweep_secs.max(1)),
            metrics_port,
        }
    }
}
