//! Public façade of the smart charging core.
//!
//! All mutations (`set_profile`, the clear operations) serialize behind the
//! write half of one `RwLock`. Composite queries take the read half just
//! long enough to snapshot the applicable profiles, then compute outside
//! the critical section, so a query observes either the full effect of a
//! prior mutation or none of it.

use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::application::composer::Composer;
use crate::application::store::{ClearProfileCriteria, ProfileStore};
use crate::application::validator::ProfileValidator;
use crate::domain::charging::{
    ChargingProfile, ChargingRateUnit, CompositeSchedule, ProfilePurpose,
    ProfileValidationResult, STATION_WIDE_EVSE_ID,
};
use crate::domain::evse::EvseRegistry;
use crate::infrastructure::persistence::ProfilePersistence;
use crate::support::clock::Clock;
use crate::support::errors::OperationalError;

/// Filter for [`SmartChargingService::get_reported_profiles`]
/// (GetChargingProfiles criteria).
#[derive(Debug, Clone, Default)]
pub struct ReportCriteria {
    pub evse_id: Option<i32>,
    pub purpose: Option<ProfilePurpose>,
    pub stack_level: Option<i32>,
    pub profile_ids: Option<Vec<i32>>,
}

impl ReportCriteria {
    fn matches(&self, evse_id: i32, profile: &ChargingProfile) -> bool {
        if let Some(target) = self.evse_id {
            if evse_id != target {
                return false;
            }
        }
        if let Some(purpose) = self.purpose {
            if profile.purpose != purpose {
                return false;
            }
        }
        if let Some(stack_level) = self.stack_level {
            if profile.stack_level != stack_level {
                return false;
            }
        }
        if let Some(ids) = &self.profile_ids {
            if !ids.contains(&profile.id) {
                return false;
            }
        }
        true
    }
}

/// Accepts, stores and flattens charging profiles for one station.
pub struct SmartChargingService {
    registry: Arc<dyn EvseRegistry>,
    clock: Arc<dyn Clock>,
    store: RwLock<ProfileStore>,
}

impl SmartChargingService {
    pub fn new(
        registry: Arc<dyn EvseRegistry>,
        clock: Arc<dyn Clock>,
        persistence: Arc<dyn ProfilePersistence>,
    ) -> Self {
        Self {
            registry,
            clock,
            store: RwLock::new(ProfileStore::new(persistence)),
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Reloads the stored profiles from persistence (boot).
    pub async fn restore_profiles(&self) -> Result<usize, OperationalError> {
        self.store.write().await.load_all().await
    }

    /// Validates and, if valid, durably stores `profile` for `evse_id`.
    ///
    /// Validation failures are values, not errors. A persistence failure is
    /// fatal to the call and leaves the stored set unchanged.
    pub async fn set_profile(
        &self,
        evse_id: i32,
        mut profile: ChargingProfile,
    ) -> Result<ProfileValidationResult, OperationalError> {
        let mut store = self.store.write().await;

        let result = ProfileValidator::new(self.registry.as_ref())
            .validate(&mut profile, evse_id, &store);
        if !result.is_valid() {
            info!(
                evse_id,
                profile_id = profile.id,
                reason = result.as_str(),
                "SetChargingProfile rejected"
            );
            return Ok(result);
        }

        let profile_id = profile.id;
        store.add(evse_id, profile).await?;
        info!(evse_id, profile_id, "SetChargingProfile accepted");
        Ok(result)
    }

    /// Removes one profile by id. Returns whether it existed.
    pub async fn clear_profile(&self, profile_id: i32) -> Result<bool, OperationalError> {
        self.store.write().await.remove(profile_id).await
    }

    /// Removes every profile matching `criteria`, returning the count.
    pub async fn clear_profiles_matching(
        &self,
        criteria: &ClearProfileCriteria,
    ) -> Result<usize, OperationalError> {
        self.store.write().await.clear_matching(criteria).await
    }

    /// Erases the TxProfiles of a finished transaction.
    pub async fn clear_transaction_profiles(
        &self,
        transaction_id: &str,
    ) -> Result<usize, OperationalError> {
        self.store.write().await.clear_transaction(transaction_id).await
    }

    /// Composite schedule for `[start, end)` on `evse_id`, without a deadline.
    pub async fn get_composite_schedule(
        &self,
        evse_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        unit: ChargingRateUnit,
    ) -> Result<CompositeSchedule, OperationalError> {
        self.get_composite_schedule_with_deadline(evse_id, start, end, unit, None)
            .await
    }

    /// Composite schedule with an optional calculation budget.
    pub async fn get_composite_schedule_with_deadline(
        &self,
        evse_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        unit: ChargingRateUnit,
        budget: Option<StdDuration>,
    ) -> Result<CompositeSchedule, OperationalError> {
        if evse_id != STATION_WIDE_EVSE_ID && self.registry.info(evse_id).is_none() {
            return Err(OperationalError::EvseUnavailable(evse_id));
        }

        let snapshot: Vec<ChargingProfile> = {
            let store = self.store.read().await;
            store.list_for(evse_id).into_iter().cloned().collect()
        };

        let deadline = budget.map(|b| Instant::now() + b);
        Composer::new(self.registry.as_ref()).calculate(
            &snapshot,
            start,
            end,
            evse_id,
            unit,
            deadline,
        )
    }

    /// Stored profiles matching `criteria`, with the EVSE each is installed
    /// on (GetChargingProfiles / ReportChargingProfiles).
    pub async fn get_reported_profiles(
        &self,
        criteria: &ReportCriteria,
    ) -> Vec<(i32, ChargingProfile)> {
        let store = self.store.read().await;
        let mut rows: Vec<(i32, ChargingProfile)> = store
            .iter_all()
            .filter(|(evse_id, profile)| criteria.matches(*evse_id, profile))
            .map(|(evse_id, profile)| (evse_id, profile.clone()))
            .collect();
        rows.sort_by_key(|(evse_id, profile)| (*evse_id, profile.id));
        rows
    }
}
