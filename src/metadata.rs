//! Metadata stored beside the database to track refresh checks.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::fs::write_atomic;
use crate::Result;

/// When the database was last verified against the remote source, and
/// the checksum it had then.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateMetadata {
    #[serde(with = "system_time_serde")]
    pub last_updated: Option<SystemTime>,
    pub checksum: Option<String>,
}

mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => {
                let duration = t.duration_since(UNIX_EPOCH).unwrap_or_default();
                Some(duration.as_secs()).serialize(serializer)
            }
            None => None::<u64>.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(|s| UNIX_EPOCH + Duration::from_secs(s)))
    }
}

impl UpdateMetadata {
    /// Create metadata with current time and the verified checksum.
    pub fn now_with_checksum(checksum: impl Into<String>) -> Self {
        Self {
            last_updated: Some(SystemTime::now()),
            checksum: Some(checksum.into()),
        }
    }

    /// Metadata path for a database file (`dlc.dat` -> `dlc.dat.meta`).
    pub fn path_for(database: &Path) -> PathBuf {
        let mut name = database.as_os_str().to_os_string();
        name.push(".meta");
        PathBuf::from(name)
    }

    /// Load metadata from a file.
    ///
    /// Returns default metadata if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save metadata to a file, replacing it atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(path.as_ref(), content.as_bytes())
    }

    /// Whether `interval` has passed since the last check, or there never
    /// was one.
    pub fn needs_update(&self, interval: Duration) -> bool {
        match self.last_updated {
            None => true,
            Some(last) => {
                let elapsed = SystemTime::now().duration_since(last).unwrap_or(Duration::MAX);
                elapsed >= interval
            }
        }
    }
}
