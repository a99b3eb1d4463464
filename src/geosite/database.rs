//! On-disk geosite database with atomic hot reload.

use arc_swap::ArcSwap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::index::GeositeIndex;
use crate::checksum::sha256_hex;
use crate::fs::write_atomic;
use crate::Result;

/// The raw bytes of a loaded database together with their index.
///
/// Published as a unit so the bytes, checksum and index a reader sees always
/// belong to the same database.
#[derive(Debug)]
pub struct Snapshot {
    bytes: Vec<u8>,
    checksum: String,
    index: Arc<GeositeIndex>,
}

impl Snapshot {
    /// Parse `bytes` into a snapshot.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let index = GeositeIndex::load(&bytes)?;
        Ok(Self {
            checksum: sha256_hex(&bytes),
            bytes,
            index: Arc::new(index),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Upper-case hex SHA-256 of the bytes.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn index(&self) -> &Arc<GeositeIndex> {
        &self.index
    }
}

/// Geosite database backed by a file.
///
/// # Example
///
/// ```ignore
/// use geopac::geosite::GeositeDatabase;
/// use std::path::Path;
///
/// let db = GeositeDatabase::open(Path::new("dlc.dat"), geopac::DEFAULT_DATABASE)?;
/// let cn = db.index().get("cn")?.len();
/// ```
pub struct GeositeDatabase {
    path: PathBuf,
    current: ArcSwap<Snapshot>,
}

impl GeositeDatabase {
    /// Open the database at `path`, seeding it from `seed` when the file is
    /// missing or empty.
    ///
    /// A file that exists but fails to parse is also replaced by the seed.
    pub fn open(path: &Path, seed: &[u8]) -> Result<Self> {
        let cached = match fs::read(path) {
            Ok(bytes) if !bytes.is_empty() => match Snapshot::from_bytes(bytes) {
                Ok(snapshot) => {
                    log::info!("Loaded geosite database: {:?}", path);
                    Some(snapshot)
                }
                Err(e) => {
                    log::warn!("Failed to load geosite database, reseeding: {}", e);
                    None
                }
            },
            _ => None,
        };

        let snapshot = match cached {
            Some(snapshot) => snapshot,
            None => {
                let snapshot = Snapshot::from_bytes(seed.to_vec())?;
                log::info!("Seeding geosite database: {:?}", path);
                write_atomic(path, seed)?;
                snapshot
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            current: ArcSwap::from_pointee(snapshot),
        })
    }

    /// Build a database from bytes without touching the disk until the next
    /// [`replace`](Self::replace).
    pub fn from_bytes(path: &Path, bytes: Vec<u8>) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            current: ArcSwap::from_pointee(Snapshot::from_bytes(bytes)?),
        })
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Current index.
    pub fn index(&self) -> Arc<GeositeIndex> {
        Arc::clone(self.current.load().index())
    }

    /// Replace the database with `bytes`.
    ///
    /// The bytes are parsed before anything is written; on failure both the
    /// file and the active snapshot are left as they were.
    pub fn replace(&self, bytes: Vec<u8>) -> Result<Arc<Snapshot>> {
        let snapshot = Arc::new(Snapshot::from_bytes(bytes)?);
        write_atomic(&self.path, snapshot.bytes())?;
        self.current.store(Arc::clone(&snapshot));

        log::info!(
            "Replaced geosite database: {} groups, sha256 {}",
            snapshot.index().len(),
            snapshot.checksum()
        );
        Ok(snapshot)
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
