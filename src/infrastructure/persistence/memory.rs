//! In-memory persistence for development and testing.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{decode_envelope, encode_envelope, ProfilePersistence};
use crate::domain::charging::ChargingProfile;
use crate::support::errors::PersistenceError;

/// Volatile [`ProfilePersistence`] keeping the same blob encoding as the
/// durable adapters, so round-trip behavior matches production.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    blobs: DashMap<i32, String>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl ProfilePersistence for InMemoryPersistence {
    async fn upsert_profile(
        &self,
        evse_id: i32,
        profile: &ChargingProfile,
    ) -> Result<(), PersistenceError> {
        let blob = encode_envelope(evse_id, profile)?;
        self.blobs.insert(profile.id, blob);
        Ok(())
    }

    async fn delete_profile(&self, profile_id: i32) -> Result<(), PersistenceError> {
        self.blobs.remove(&profile_id);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<(i32, ChargingProfile)>, PersistenceError> {
        self.blobs
            .iter()
            .map(|entry| decode_envelope(entry.value()))
            .collect()
    }
}
