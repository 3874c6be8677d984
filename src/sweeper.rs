use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::info;

use crate::engine::Engine;
use crate::observability::NO_SHOWS_SWEPT_TOTAL;

/// Mark every overdue confirmed reservation as a no-show. Returns how many
/// were marked.
pub async fn sweep_no_shows(engine: &Engine, now: NaiveDateTime) -> usize {
    let mut marked = 0;
    for (reservation_id, court_id) in engine.collect_no_shows(now) {
        match engine.mark_no_show(reservation_id, now).await {
            Ok(_) => {
                marked += 1;
                metrics::counter!(NO_SHOWS_SWEPT_TOTAL).increment(1);
                info!("marked reservation {reservation_id} on court {court_id} as no-show");
            }
            Err(e) => {
                // checked in or cancelled since collection
                tracing::debug!("no-show sweep skip {reservation_id}: {e}");
            }
        }
    }
    marked
}

/// Background task that sweeps no-shows every `config.sweep_interval` using
/// the local clock.
pub async fn run_no_show_sweeper(engine: Arc<Engine>) {
    let mut interval = tokio::time::interval(engine.config.sweep_interval);
    loop {
        interval.tick().await;
        let now = chrono::Local::now().naive_local();
        sweep_no_shows(&engine, now).await;
    }
}
