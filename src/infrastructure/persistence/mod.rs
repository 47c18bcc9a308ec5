//! Durable profile storage.
//!
//! The core only requires the narrow [`ProfilePersistence`] interface; the
//! blob format is the canonical OCPP 2.0.1 JSON of the profile wrapped in a
//! small envelope that remembers which EVSE it was installed on.

mod file;
mod memory;

use async_trait::async_trait;
use rust_ocpp::v2_0_1::datatypes::charging_profile_type::ChargingProfileType;
use serde::{Deserialize, Serialize};

use crate::domain::charging::{wire, ChargingProfile};
use crate::support::errors::PersistenceError;

pub use file::JsonFilePersistence;
pub use memory::InMemoryPersistence;

/// Durable key-value storage for accepted charging profiles.
///
/// Implementations must be crash-safe: once `upsert_profile` returns, the
/// record survives a restart.
#[async_trait]
pub trait ProfilePersistence: Send + Sync {
    async fn upsert_profile(
        &self,
        evse_id: i32,
        profile: &ChargingProfile,
    ) -> Result<(), PersistenceError>;

    async fn delete_profile(&self, profile_id: i32) -> Result<(), PersistenceError>;

    async fn load_all(&self) -> Result<Vec<(i32, ChargingProfile)>, PersistenceError>;
}

/// On-disk record: the profile in canonical OCPP JSON plus its target EVSE.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileEnvelope {
    evse_id: i32,
    charging_profile: ChargingProfileType,
}

fn encode_envelope(evse_id: i32, profile: &ChargingProfile) -> Result<String, PersistenceError> {
    let envelope = ProfileEnvelope {
        evse_id,
        charging_profile: wire::profile_to_ocpp(profile),
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

fn decode_envelope(blob: &str) -> Result<(i32, ChargingProfile), PersistenceError> {
    let envelope: ProfileEnvelope = serde_json::from_str(blob)?;
    let profile = wire::profile_from_ocpp(&envelope.charging_profile)
        .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
    Ok((envelope.evse_id, profile))
}
