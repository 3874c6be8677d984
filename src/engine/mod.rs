pub mod calendar;
pub mod cancellation;
pub mod conflict;
mod error;
mod lifecycle;
mod mutations;
pub mod payment;
pub mod pricing;
mod queries;

pub use calendar::{check_advance, check_open, is_open, open_slots};
pub use cancellation::{cancellation_fee, refund_due};
pub use conflict::{find_conflict, has_conflict};
pub use error::EngineError;
pub use lifecycle::Charges;
pub use mutations::{BookingRequest, CancellationOutcome};
pub use payment::derive_payment_status;
pub use pricing::{price, quote, select_rule};

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::model::*;
use crate::notify::EventHub;

pub type SharedCourtState = Arc<RwLock<CourtState>>;

/// Authoritative in-memory store for courts and their reservations.
///
/// Each court sits behind its own write lock. Every booking re-checks the
/// calendar and conflicts and inserts while holding that lock, so two requests
/// for overlapping slots on one court can never both commit. Lifecycle and
/// payment updates take the same lock.
pub struct Engine {
    pub(super) courts: DashMap<Ulid, SharedCourtState>,
    /// Reverse lookup: window/blackout/rule/reservation id → court id
    pub(super) entity_to_court: DashMap<Ulid, Ulid>,
    /// Reverse lookup: payment id → reservation id
    pub(super) payment_to_reservation: DashMap<Ulid, Ulid>,
    pub notify: Arc<EventHub>,
    pub config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig, notify: Arc<EventHub>) -> Self {
        Self {
            courts: DashMap::new(),
            entity_to_court: DashMap::new(),
            payment_to_reservation: DashMap::new(),
            notify,
            config,
        }
    }

    pub fn get_court(&self, id: &Ulid) -> Option<SharedCourtState> {
        self.courts.get(id).map(|e| e.value().clone())
    }

    pub fn get_court_for_entity(&self, entity_id: &Ulid) -> Option<Ulid> {
        self.entity_to_court.get(entity_id).map(|e| *e.value())
    }

    /// Get court state by id and acquire its write lock.
    pub(super) async fn court_write(
        &self,
        court_id: Ulid,
    ) -> Result<OwnedRwLockWriteGuard<CourtState>, EngineError> {
        let cs = self.get_court(&court_id).ok_or(EngineError::NotFound(court_id))?;
        Ok(cs.write_owned().await)
    }

    /// Lookup entity → court, get court, acquire write lock.
    pub(super) async fn resolve_entity_write(
        &self,
        entity_id: &Ulid,
    ) -> Result<(Ulid, OwnedRwLockWriteGuard<CourtState>), EngineError> {
        let court_id = self
            .get_court_for_entity(entity_id)
            .ok_or(EngineError::NotFound(*entity_id))?;
        let guard = self.court_write(court_id).await?;
        Ok((court_id, guard))
    }
}
