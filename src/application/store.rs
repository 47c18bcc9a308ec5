//! Authoritative in-memory profile cache backed by durable persistence.
//!
//! Profiles are partitioned into a station-wide bucket (`evse_id == 0`) and
//! one bucket per EVSE. Every mutation is recorded durably *before* the
//! in-memory state changes, so a persistence failure leaves the cache
//! exactly as it was.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::charging::{ChargingProfile, ProfilePurpose, STATION_WIDE_EVSE_ID};
use crate::infrastructure::persistence::ProfilePersistence;
use crate::support::errors::OperationalError;

/// Which side of the TxDefault partition to compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxDefaultScope {
    StationWide,
    EvseSpecific,
}

/// Filter for [`ProfileStore::clear_matching`].
///
/// With `check_id_only` set, only `profile_id` is consulted; otherwise every
/// present field must match.
#[derive(Debug, Clone, Default)]
pub struct ClearProfileCriteria {
    pub profile_id: Option<i32>,
    pub evse_id: Option<i32>,
    pub purpose: Option<ProfilePurpose>,
    pub stack_level: Option<i32>,
    pub check_id_only: bool,
}

impl ClearProfileCriteria {
    fn matches(&self, evse_id: i32, profile: &ChargingProfile) -> bool {
        if self.check_id_only {
            return self.profile_id == Some(profile.id);
        }
        if let Some(id) = self.profile_id {
            if profile.id != id {
                return false;
            }
        }
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
        true
    }
}

/// Station-wide + per-EVSE profile buckets (single writer, see the façade).
pub struct ProfileStore {
    station_wide: Vec<ChargingProfile>,
    per_evse: BTreeMap<i32, Vec<ChargingProfile>>,
    persistence: Arc<dyn ProfilePersistence>,
}

impl ProfileStore {
    pub fn new(persistence: Arc<dyn ProfilePersistence>) -> Self {
        Self {
            station_wide: Vec::new(),
            per_evse: BTreeMap::new(),
            persistence,
        }
    }

    pub fn len(&self) -> usize {
        self.station_wide.len() + self.per_evse.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Durably records and installs a profile. Replaces any stored profile
    /// with the same id (profile ids are unique within the station).
    pub async fn add(
        &mut self,
        evse_id: i32,
        profile: ChargingProfile,
    ) -> Result<(), OperationalError> {
        self.persistence.upsert_profile(evse_id, &profile).await?;

        let profile_id = profile.id;
        self.remove_in_memory(profile_id);
        self.bucket_mut(evse_id).push(profile);
        info!(evse_id, profile_id, "Charging profile stored");
        Ok(())
    }

    /// Durably deletes a profile. Returns whether it was present.
    pub async fn remove(&mut self, profile_id: i32) -> Result<bool, OperationalError> {
        if self.evse_id_of(profile_id).is_none() {
            return Ok(false);
        }
        self.persistence.delete_profile(profile_id).await?;
        let removed = self.remove_in_memory(profile_id);
        info!(profile_id, "Charging profile removed");
        Ok(removed)
    }

    /// Deletes every stored profile matching `criteria`, returning how many
    /// were removed.
    pub async fn clear_matching(
        &mut self,
        criteria: &ClearProfileCriteria,
    ) -> Result<usize, OperationalError> {
        let matches: Vec<i32> = self
            .iter_all()
            .filter(|(evse_id, profile)| criteria.matches(*evse_id, profile))
            .map(|(_, profile)| profile.id)
            .collect();

        for profile_id in &matches {
            self.persistence.delete_profile(*profile_id).await?;
            self.remove_in_memory(*profile_id);
        }
        debug!(cleared = matches.len(), ?criteria, "Cleared profiles by criteria");
        Ok(matches.len())
    }

    /// Erases every TxProfile bound to `transaction_id` (transaction end).
    pub async fn clear_transaction(
        &mut self,
        transaction_id: &str,
    ) -> Result<usize, OperationalError> {
        let matches: Vec<i32> = self
            .iter_all()
            .filter(|(_, p)| {
                p.purpose == ProfilePurpose::TxProfile
                    && p.transaction_id.as_deref() == Some(transaction_id)
            })
            .map(|(_, p)| p.id)
            .collect();

        for profile_id in &matches {
            self.persistence.delete_profile(*profile_id).await?;
            self.remove_in_memory(*profile_id);
        }
        if !matches.is_empty() {
            info!(transaction_id, cleared = matches.len(), "Erased transaction profiles");
        }
        Ok(matches.len())
    }

    /// Profiles that apply to `evse_id`: station-wide first, then its own.
    pub fn list_for(&self, evse_id: i32) -> Vec<&ChargingProfile> {
        let own = self
            .per_evse
            .get(&evse_id)
            .map(|bucket| bucket.iter())
            .into_iter()
            .flatten();
        self.station_wide.iter().chain(own).collect()
    }

    /// TxDefault profiles on one side of the station/EVSE partition.
    pub fn list_tx_default(&self, scope: TxDefaultScope) -> Vec<&ChargingProfile> {
        let profiles: Box<dyn Iterator<Item = &ChargingProfile>> = match scope {
            TxDefaultScope::StationWide => Box::new(self.station_wide.iter()),
            TxDefaultScope::EvseSpecific => {
                Box::new(self.per_evse.values().flat_map(|bucket| bucket.iter()))
            }
        };
        profiles
            .filter(|p| p.purpose == ProfilePurpose::TxDefaultProfile)
            .collect()
    }

    /// TxProfiles bound to `transaction_id`.
    pub fn list_tx(&self, transaction_id: &str) -> Vec<&ChargingProfile> {
        self.iter_all()
            .map(|(_, p)| p)
            .filter(|p| {
                p.purpose == ProfilePurpose::TxProfile
                    && p.transaction_id.as_deref() == Some(transaction_id)
            })
            .collect()
    }

    /// Every stored profile with the EVSE it is installed on.
    pub fn iter_all(&self) -> impl Iterator<Item = (i32, &ChargingProfile)> {
        let station = self
            .station_wide
            .iter()
            .map(|p| (STATION_WIDE_EVSE_ID, p));
        let per_evse = self
            .per_evse
            .iter()
            .flat_map(|(evse_id, bucket)| bucket.iter().map(move |p| (*evse_id, p)));
        station.chain(per_evse)
    }

    pub fn evse_id_of(&self, profile_id: i32) -> Option<i32> {
        self.iter_all()
            .find(|(_, p)| p.id == profile_id)
            .map(|(evse_id, _)| evse_id)
    }

    /// Reloads the cache from persistence, ascending by profile id.
    ///
    /// Two durable records claiming the same profile id mean the station's
    /// id-uniqueness invariant was broken at some earlier point; the load
    /// stops so the damage can be inspected instead of silently picking one.
    pub async fn load_all(&mut self) -> Result<usize, OperationalError> {
        let mut records = self.persistence.load_all().await?;
        records.sort_by_key(|(_, profile)| profile.id);

        for window in records.windows(2) {
            if window[0].1.id == window[1].1.id {
                return Err(OperationalError::InternalInvariantViolated {
                    profile_id: window[0].1.id,
                    detail: "duplicate profile id in durable storage".to_string(),
                });
            }
        }

        self.station_wide.clear();
        self.per_evse.clear();
        let count = records.len();
        for (evse_id, profile) in records {
            self.bucket_mut(evse_id).push(profile);
        }
        info!(profiles = count, "Charging profiles restored from persistence");
        Ok(count)
    }

    fn bucket_mut(&mut self, evse_id: i32) -> &mut Vec<ChargingProfile> {
        if evse_id == STATION_WIDE_EVSE_ID {
            &mut self.station_wide
        } else {
            self.per_evse.entry(evse_id).or_default()
        }
    }

    fn remove_in_memory(&mut self, profile_id: i32) -> bool {
        let before = self.len();
        self.station_wide.retain(|p| p.id != profile_id);
        for bucket in self.per_evse.values_mut() {
            bucket.retain(|p| p.id != profile_id);
        }
        self.per_evse.retain(|_, bucket| !bucket.is_empty());
        before != self.len()
    }
}
