//! Checksum-gated refresh of the geosite database.
//!
//! A refresh first fetches the published SHA-256 of the remote database.
//! Only when it differs from the local bytes is the database downloaded,
//! and the download is accepted only if it hashes to the published digest.
//! Nothing on disk or in memory changes unless every step succeeds.

use std::time::Duration;

use crate::checksum::{checksum_eq, parse_remote_checksum, sha256_hex};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::geosite::GeositeDatabase;
use crate::metadata::UpdateMetadata;
use crate::{Error, GeositeConfig, Result};

/// Outcome of one check against the remote source.
#[derive(Debug)]
pub enum UpdateResult {
    /// The local database already matches the published checksum
    Unchanged,
    /// Verified replacement bytes
    Replaced(Vec<u8>),
    /// Network, checksum or verification failure
    Failed(Error),
}

/// Checks a remote geosite source and refreshes a [`GeositeDatabase`].
///
/// # Example
///
/// ```ignore
/// use geopac::{GeositeConfig, SourceSynchronizer};
///
/// let sync = SourceSynchronizer::http(std::time::Duration::from_secs(30))?;
/// if sync.sync(&database, &GeositeConfig::default()).await? {
///     println!("Geosite database updated");
/// }
/// ```
pub struct SourceSynchronizer<F = HttpFetcher> {
    fetcher: F,
}

impl SourceSynchronizer<HttpFetcher> {
    /// Synchronizer over HTTP whose requests time out after `timeout`.
    pub fn http(timeout: Duration) -> Result<Self> {
        Ok(Self::new(HttpFetcher::with_timeout(timeout)?))
    }
}

impl<F: Fetcher> SourceSynchronizer<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Compare `local` against the remote source and fetch a verified
    /// replacement if it is out of date. Pure with respect to local state.
    pub async fn check_and_update(
        &self,
        source_url: &str,
        checksum_url: &str,
        local: &[u8],
    ) -> UpdateResult {
        match self.fetch_if_outdated(source_url, checksum_url, local).await {
            Ok(Some(bytes)) => UpdateResult::Replaced(bytes),
            Ok(None) => UpdateResult::Unchanged,
            Err(e) => {
                log::error!("Geosite update failed: {}", e);
                UpdateResult::Failed(e)
            }
        }
    }

    async fn fetch_if_outdated(
        &self,
        source_url: &str,
        checksum_url: &str,
        local: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        log::info!("Checking Geosite from {}", source_url);

        let remote = parse_remote_checksum(&self.fetcher.fetch_text(checksum_url).await?)?;
        log::info!("Remote SHA256 sum: {}", remote);

        let local_sum = sha256_hex(local);
        log::info!("Local SHA256 sum: {}", local_sum);

        if checksum_eq(&remote, &local_sum) {
            log::info!("Local GeoSite DB is up to date.");
            return Ok(None);
        }

        let downloaded = self.fetcher.fetch_bytes(source_url).await?;
        let actual = sha256_hex(&downloaded);
        log::info!("Actual SHA256 sum: {}", actual);

        if !checksum_eq(&remote, &actual) {
            log::warn!("Sha256sum Verification: FAILED. Downloaded GeoSite DB is corrupted. Aborting the update.");
            return Err(Error::ChecksumMismatch {
                expected: remote,
                actual,
            });
        }

        log::info!("Sha256sum Verification: PASSED. Applying to local GeoSite DB.");
        Ok(Some(downloaded))
    }

    /// Run one check for `config`'s source and apply a verified replacement
    /// to `database`.
    ///
    /// Returns `true` if the database was replaced. On error the database
    /// file and index are untouched.
    pub async fn sync(&self, database: &GeositeDatabase, config: &GeositeConfig) -> Result<bool> {
        let snapshot = database.snapshot();
        let result = self
            .check_and_update(&config.source_url(), &config.checksum_url(), snapshot.bytes())
            .await;

        let replaced = match result {
            UpdateResult::Unchanged => false,
            UpdateResult::Replaced(bytes) => {
                database.replace(bytes)?;
                true
            }
            UpdateResult::Failed(e) => return Err(e),
        };

        let checksum = database.snapshot().checksum().to_string();
        let meta = UpdateMetadata::now_with_checksum(checksum);
        if let Err(e) = meta.save(UpdateMetadata::path_for(database.path())) {
            log::warn!("Failed to save geosite metadata: {}", e);
        }

        Ok(replaced)
    }

    /// Whether `interval` has elapsed since the last successful check.
    pub fn needs_update(&self, database: &GeositeDatabase, interval: Duration) -> bool {
        UpdateMetadata::load(UpdateMetadata::path_for(database.path()))
            .unwrap_or_default()
            .needs_update(interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geosite::{DomainEntry, GeositeBuilder};
    use crate::MatchType;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const SUM_URL: &str = "https://example.test/dlc.dat.sha256sum";
    const DB_URL: &str = "https://example.test/dlc.dat";

    /// Serves canned bodies; missing URLs fail like a 404.
    #[derive(Default)]
    struct ScriptedFetcher {
        texts: HashMap<String, String>,
        bytes: HashMap<String, Vec<u8>>,
        downloads: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn with_text(mut self, url: &str, body: &str) -> Self {
            self.texts.insert(url.to_string(), body.to_string());
            self
        }

        fn with_bytes(mut self, url: &str, body: Vec<u8>) -> Self {
            self.bytes.insert(url.to_string(), body);
            self
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String> {
            self.texts
                .get(url)
                .cloned()
                .ok_or_else(|| Error::Config(format!("404 {}", url)))
        }

        async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            self.bytes
                .get(url)
                .cloned()
                .ok_or_else(|| Error::Config(format!("404 {}", url)))
        }
    }

    fn db_with(domain: &str) -> Vec<u8> {
        let mut builder = GeositeBuilder::new();
        builder.add_entry("cn", DomainEntry::new(MatchType::Domain, domain));
        builder.encode()
    }

    fn sum_body(data: &[u8]) -> String {
        format!("{}  dlc.dat\n", sha256_hex(data).to_lowercase())
    }

    fn config() -> GeositeConfig {
        GeositeConfig {
            url: DB_URL.to_string(),
            ..Default::default()
        }
    }

    fn open_db(dir: &std::path::Path, seed: &[u8]) -> GeositeDatabase {
        GeositeDatabase::open(&dir.join("dlc.dat"), seed).unwrap()
    }

    #[tokio::test]
    async fn test_unchanged_skips_download() {
        let local = db_with("old.cn");
        let fetcher = ScriptedFetcher::default().with_text(SUM_URL, &sum_body(&local));
        let sync = SourceSynchronizer::new(fetcher);

        let result = sync.check_and_update(DB_URL, SUM_URL, &local).await;
        assert!(matches!(result, UpdateResult::Unchanged));
        assert_eq!(sync.fetcher.downloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unchanged_keeps_index_reference() {
        let dir = tempfile::tempdir().unwrap();
        let local = db_with("old.cn");
        let db = open_db(dir.path(), &local);
        let before = db.index();

        let sync =
            SourceSynchronizer::new(ScriptedFetcher::default().with_text(SUM_URL, &sum_body(&local)));

        assert!(!sync.sync(&db, &config()).await.unwrap());
        assert!(Arc::ptr_eq(&before, &db.index()));
    }

    #[tokio::test]
    async fn test_verified_download_replaces_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(dir.path(), &db_with("old.cn"));
        let remote = db_with("new.cn");

        let fetcher = ScriptedFetcher::default()
            .with_text(SUM_URL, &sum_body(&remote))
            .with_bytes(DB_URL, remote.clone());
        let sync = SourceSynchronizer::new(fetcher);

        assert!(sync.sync(&db, &config()).await.unwrap());
        assert_eq!(db.index().get("cn").unwrap()[0].value, "new.cn");
        assert_eq!(fs::read(db.path()).unwrap(), remote);

        let meta = UpdateMetadata::load(UpdateMetadata::path_for(db.path())).unwrap();
        assert_eq!(meta.checksum.as_deref(), Some(sha256_hex(&remote).as_str()));
        assert!(!sync.needs_update(&db, Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn test_checksum_mismatch_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let local = db_with("old.cn");
        let db = open_db(dir.path(), &local);
        let before = db.index();

        // Published digest is for one file, the server returns another
        let fetcher = ScriptedFetcher::default()
            .with_text(SUM_URL, &sum_body(&db_with("published.cn")))
            .with_bytes(DB_URL, db_with("tampered.cn"));
        let sync = SourceSynchronizer::new(fetcher);

        let result = sync.sync(&db, &config()).await;
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
        assert_eq!(fs::read(db.path()).unwrap(), local);
        assert!(Arc::ptr_eq(&before, &db.index()));
        assert!(!UpdateMetadata::path_for(db.path()).exists());
    }

    #[tokio::test]
    async fn test_checksum_fetch_failure() {
        let local = db_with("old.cn");
        let sync = SourceSynchronizer::new(ScriptedFetcher::default());

        let result = sync.check_and_update(DB_URL, SUM_URL, &local).await;
        assert!(matches!(result, UpdateResult::Failed(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_download_failure() {
        let local = db_with("old.cn");
        let fetcher =
            ScriptedFetcher::default().with_text(SUM_URL, &sum_body(&db_with("new.cn")));
        let sync = SourceSynchronizer::new(fetcher);

        let result = sync.check_and_update(DB_URL, SUM_URL, &local).await;
        assert!(matches!(result, UpdateResult::Failed(_)));
        assert_eq!(sync.fetcher.downloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_checksum_body() {
        let local = db_with("old.cn");
        let sync =
            SourceSynchronizer::new(ScriptedFetcher::default().with_text(SUM_URL, "<html>404</html>"));

        let result = sync.check_and_update(DB_URL, SUM_URL, &local).await;
        assert!(matches!(result, UpdateResult::Failed(Error::InvalidChecksum(_))));
    }

    #[tokio::test]
    async fn test_verified_but_unparsable_download_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let local = db_with("old.cn");
        let db = open_db(dir.path(), &local);
        let garbage = vec![0x0a, 0xff, 0xff];

        let fetcher = ScriptedFetcher::default()
            .with_text(SUM_URL, &sum_body(&garbage))
            .with_bytes(DB_URL, garbage);
        let sync = SourceSynchronizer::new(fetcher);

        assert!(matches!(sync.sync(&db, &config()).await, Err(Error::Parse(_))));
        assert_eq!(fs::read(db.path()).unwrap(), local);
    }

    #[tokio::test]
    async fn test_timed_out_fetch_keeps_state() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Hold every connection open without replying
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let dir = tempfile::tempdir().unwrap();
        let local = db_with("old.cn");
        let db = open_db(dir.path(), &local);
        let before = db.index();

        let config = GeositeConfig {
            url: format!("http://{}/dlc.dat", addr),
            ..Default::default()
        };
        let sync = SourceSynchronizer::http(Duration::from_millis(500)).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), sync.sync(&db, &config))
            .await
            .expect("sync did not honor the fetch timeout");
        assert!(matches!(result, Err(Error::Download(_))));
        assert_eq!(fs::read(db.path()).unwrap(), local);
        assert!(Arc::ptr_eq(&before, &db.index()));
        assert!(!UpdateMetadata::path_for(db.path()).exists());
    }

    #[test]
    fn test_needs_update_without_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(dir.path(), &db_with("old.cn"));
        let sync = SourceSynchronizer::new(ScriptedFetcher::default());
        assert!(sync.needs_update(&db, Duration::from_secs(60)));
    }
}
