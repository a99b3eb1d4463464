//! PAC file maintenance: defaults, merging, source updates and watching.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::merge::{compose_pac, process_user_rules, DEFAULT_TEMPLATE, DEFAULT_USER_RULES};
use super::watch::{FileWatcher, DEFAULT_DEBOUNCE};
use crate::fetch::Fetcher;
use crate::fs::{read_shared, write_atomic};
use crate::geosite::GeositeDatabase;
use crate::{generate_rules, GeositeConfig, Result, RoutingPolicy, SourceSynchronizer};

/// Generated PAC script.
pub const PAC_FILE: &str = "pac.txt";
/// User-maintained ABP rules, merged ahead of the generated ones.
pub const USER_RULE_FILE: &str = "user-rule.txt";
/// Optional user override of the PAC template.
pub const USER_ABP_FILE: &str = "abp.txt";

const EVENT_CAPACITY: usize = 16;

/// Locations of the files a [`PacDaemon`] reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacPaths {
    pub pac_file: PathBuf,
    pub user_rule_file: PathBuf,
    pub user_abp_file: PathBuf,
}

impl PacPaths {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            pac_file: dir.join(PAC_FILE),
            user_rule_file: dir.join(USER_RULE_FILE),
            user_abp_file: dir.join(USER_ABP_FILE),
        }
    }
}

/// Notifications published by a [`PacDaemon`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacEvent {
    /// A source update finished; `success` is whether the PAC file changed
    UpdateCompleted { success: bool },
    /// The synchronizer or the merge failed
    UpdateFailed { reason: String },
    /// The PAC file was edited on disk
    PacFileChanged,
    /// The user-rule file was edited on disk
    UserRuleFileChanged,
}

/// Keeps the PAC file in step with the geosite database and user rules.
///
/// # Example
///
/// ```ignore
/// use geopac::{GeositeConfig, PacDaemon};
///
/// let daemon = PacDaemon::new("/var/lib/geopac", database);
/// daemon.ensure_defaults()?;
/// let changed = daemon.merge_and_write(&GeositeConfig::default().policy())?;
/// ```
pub struct PacDaemon {
    paths: PacPaths,
    database: Arc<GeositeDatabase>,
    events: broadcast::Sender<PacEvent>,
    write_lock: Mutex<()>,
    debounce: Duration,
}

impl PacDaemon {
    pub fn new(dir: impl AsRef<Path>, database: Arc<GeositeDatabase>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            paths: PacPaths::new(dir),
            database,
            events,
            write_lock: Mutex::new(()),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Set the file-watch debounce delay.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn paths(&self) -> &PacPaths {
        &self.paths
    }

    pub fn database(&self) -> &Arc<GeositeDatabase> {
        &self.database
    }

    /// Receive events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<PacEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: PacEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Create the user-rule file from the packaged default if missing.
    pub fn touch_user_rule_file(&self) -> Result<()> {
        if !self.paths.user_rule_file.exists() {
            write_atomic(&self.paths.user_rule_file, DEFAULT_USER_RULES.as_bytes())?;
            log::info!("Created {:?}", self.paths.user_rule_file);
        }
        Ok(())
    }

    /// Create the PAC file from the packaged template, with no rules, if
    /// missing.
    pub fn touch_pac_file(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        if !self.paths.pac_file.exists() {
            let content = compose_pac(&[], &[], DEFAULT_TEMPLATE)?;
            write_atomic(&self.paths.pac_file, content.as_bytes())?;
            log::info!("Created {:?}", self.paths.pac_file);
        }
        Ok(())
    }

    /// Make sure the PAC and user-rule files exist. Idempotent.
    pub fn ensure_defaults(&self) -> Result<()> {
        self.touch_user_rule_file()?;
        self.touch_pac_file()
    }

    /// Current PAC file content, creating the file first if needed.
    ///
    /// A file created here has empty rule arrays and proxies nothing;
    /// call [`merge_and_write`](Self::merge_and_write) first to serve the
    /// configured groups.
    pub fn get_content(&self) -> Result<String> {
        self.touch_pac_file()?;
        read_shared(&self.paths.pac_file)
    }

    fn template(&self) -> Result<String> {
        if self.paths.user_abp_file.exists() {
            log::debug!("Using PAC template {:?}", self.paths.user_abp_file);
            read_shared(&self.paths.user_abp_file)
        } else {
            Ok(DEFAULT_TEMPLATE.to_string())
        }
    }

    fn user_rules(&self) -> Result<Vec<String>> {
        if self.paths.user_rule_file.exists() {
            Ok(process_user_rules(&read_shared(&self.paths.user_rule_file)?))
        } else {
            Ok(process_user_rules(DEFAULT_USER_RULES))
        }
    }

    /// Build the PAC script for `policy` without writing it.
    pub fn merge(&self, policy: &RoutingPolicy) -> Result<String> {
        let template = self.template()?;
        let user_rules = self.user_rules()?;
        let rules = generate_rules(&self.database.index(), policy)?;
        compose_pac(&user_rules, &rules, &template)
    }

    /// Merge and write the PAC file if its content changed.
    ///
    /// Returns whether the file was written.
    pub fn merge_and_write(&self, policy: &RoutingPolicy) -> Result<bool> {
        let _guard = self.write_lock.lock();

        let content = self.merge(policy)?;
        if self.paths.pac_file.exists() && read_shared(&self.paths.pac_file)? == content {
            log::info!("PAC file is up to date");
            return Ok(false);
        }

        write_atomic(&self.paths.pac_file, content.as_bytes())?;
        log::info!("PAC file updated: {:?}", self.paths.pac_file);
        Ok(true)
    }

    /// Refresh the geosite database and re-merge the PAC file.
    ///
    /// Group lists of `config` that reference missing groups are replaced
    /// by the defaults for the merge. Publishes [`PacEvent::UpdateFailed`]
    /// for each failure and always finishes with
    /// [`PacEvent::UpdateCompleted`]. Returns whether the PAC file changed.
    pub async fn update_from_source<F: Fetcher>(
        &self,
        sync: &SourceSynchronizer<F>,
        config: &GeositeConfig,
    ) -> bool {
        match sync.sync(&self.database, config).await {
            Ok(true) => log::info!("Geosite database replaced"),
            Ok(false) => {}
            Err(e) => self.publish(PacEvent::UpdateFailed {
                reason: e.to_string(),
            }),
        }

        let policy = config.validated(&self.database.index()).policy();
        let changed = match self.merge_and_write(&policy) {
            Ok(changed) => changed,
            Err(e) => {
                log::error!("Failed to merge PAC file: {}", e);
                self.publish(PacEvent::UpdateFailed {
                    reason: e.to_string(),
                });
                false
            }
        };

        self.publish(PacEvent::UpdateCompleted { success: changed });
        changed
    }

    /// Watch the PAC and user-rule files, publishing
    /// [`PacEvent::PacFileChanged`] and [`PacEvent::UserRuleFileChanged`].
    ///
    /// Watching stops when the returned handle is dropped.
    pub fn watch(&self) -> Result<PacWatchers> {
        let events = self.events.clone();
        let pac = FileWatcher::spawn("PAC file", &self.paths.pac_file, self.debounce, move || {
            let _ = events.send(PacEvent::PacFileChanged);
        })?;

        let events = self.events.clone();
        let user_rule = FileWatcher::spawn(
            "User Rule file",
            &self.paths.user_rule_file,
            self.debounce,
            move || {
                let _ = events.send(PacEvent::UserRuleFileChanged);
            },
        )?;

        Ok(PacWatchers { pac, user_rule })
    }
}

/// Running watchers of a [`PacDaemon`].
pub struct PacWatchers {
    pac: FileWatcher,
    user_rule: FileWatcher,
}

impl PacWatchers {
    /// Whether neither watcher is debouncing.
    pub fn is_idle(&self) -> bool {
        self.pac.is_idle() && self.user_rule.is_idle()
    }
}
