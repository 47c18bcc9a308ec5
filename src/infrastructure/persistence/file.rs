//! File-backed persistence: one JSON envelope per profile.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::warn;

use super::{decode_envelope, encode_envelope, ProfilePersistence};
use crate::domain::charging::ChargingProfile;
use crate::support::errors::PersistenceError;

const PROFILE_PREFIX: &str = "profile-";
const PROFILE_SUFFIX: &str = ".json";

/// Durable [`ProfilePersistence`] writing `profile-<id>.json` files under a
/// directory. Writes go through a temporary file and a rename, so a crash
/// mid-write leaves the previous record intact.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    dir: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn profile_path(&self, profile_id: i32) -> PathBuf {
        self.dir
            .join(format!("{PROFILE_PREFIX}{profile_id}{PROFILE_SUFFIX}"))
    }

    fn is_profile_file(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(PROFILE_PREFIX) && name.ends_with(PROFILE_SUFFIX))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ProfilePersistence for JsonFilePersistence {
    async fn upsert_profile(
        &self,
        evse_id: i32,
        profile: &ChargingProfile,
    ) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir).await?;

        let blob = encode_envelope(evse_id, profile)?;
        let path = self.profile_path(profile.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, blob.as_bytes()).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete_profile(&self, profile_id: i32) -> Result<(), PersistenceError> {
        match fs::remove_file(self.profile_path(profile_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_all(&self) -> Result<Vec<(i32, ChargingProfile)>, PersistenceError> {
        let mut profiles = Vec::new();

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(profiles),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !Self::is_profile_file(&path) {
                continue;
            }
            let blob = fs::read_to_string(&path).await?;
            match decode_envelope(&blob) {
                Ok(record) => profiles.push(record),
                Err(e) => {
                    // A single bad file must not take the station down on boot.
                    warn!(path = %path.display(), error = %e, "Skipping unreadable profile record");
                }
            }
        }

        Ok(profiles)
    }
}
