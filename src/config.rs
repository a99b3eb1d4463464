//! Configuration types.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::geosite::GeositeIndex;
use crate::{GroupSelector, Result, RoutingPolicy};

/// Upstream geosite database.
pub const DEFAULT_GEOSITE_URL: &str =
    "https://github.com/v2fly/domain-list-community/raw/release/dlc.dat";

/// Suffix of the published checksum next to the database.
pub const CHECKSUM_SUFFIX: &str = ".sha256sum";

/// Longest wait between two update checks of a running daemon.
pub const MAX_CHECK_PERIOD: Duration = Duration::from_secs(3600);

/// Groups routed directly unless configured otherwise.
pub fn default_direct_groups() -> Vec<String> {
    vec!["cn".to_string(), "geolocation-!cn@cn".to_string()]
}

/// Groups routed through the proxy unless configured otherwise.
pub fn default_proxied_groups() -> Vec<String> {
    vec!["geolocation-!cn".to_string()]
}

/// Geosite routing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeositeConfig {
    /// Custom database URL; empty means the upstream default
    pub url: String,
    /// Custom checksum URL; empty means `<url>.sha256sum`
    pub checksum_url: String,
    /// Groups connected without the proxy
    pub direct_groups: Vec<String>,
    /// Groups connected via the proxy
    pub proxied_groups: Vec<String>,
    /// Blacklist mode
    pub prefer_direct: bool,
}

impl Default for GeositeConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            checksum_url: String::new(),
            direct_groups: default_direct_groups(),
            proxied_groups: default_proxied_groups(),
            prefer_direct: false,
        }
    }
}

impl GeositeConfig {
    /// Database URL to download from.
    pub fn source_url(&self) -> String {
        if self.url.trim().is_empty() {
            DEFAULT_GEOSITE_URL.to_string()
        } else {
            self.url.trim().to_string()
        }
    }

    /// URL of the published SHA-256 of the database.
    pub fn checksum_url(&self) -> String {
        if self.checksum_url.trim().is_empty() {
            format!("{}{}", self.source_url(), CHECKSUM_SUFFIX)
        } else {
            self.checksum_url.trim().to_string()
        }
    }

    /// The routing policy described by this config.
    pub fn policy(&self) -> RoutingPolicy {
        RoutingPolicy::new(
            self.direct_groups.clone(),
            self.proxied_groups.clone(),
            self.prefer_direct,
        )
    }

    /// A copy with every group list that references a missing group reset
    /// to its default.
    pub fn validated(&self, index: &GeositeIndex) -> Self {
        let mut config = self.clone();
        if !validate_group_list(index, &config.direct_groups) {
            config.direct_groups = default_direct_groups();
        }
        if !validate_group_list(index, &config.proxied_groups) {
            config.proxied_groups = default_proxied_groups();
        }
        config
    }
}

/// Check that `selector` is well-formed and names an existing group.
pub fn check_group(index: &GeositeIndex, selector: &str) -> bool {
    match GroupSelector::parse(selector) {
        Ok(sel) => index.contains(&sel.group),
        Err(_) => false,
    }
}

/// Check every selector in `groups`.
pub fn validate_group_list<S: AsRef<str>>(index: &GeositeIndex, groups: &[S]) -> bool {
    for group in groups {
        if !check_group(index, group.as_ref()) {
            log::debug!("Available groups: {}", index.group_names().join(", "));
            log::warn!(
                "The geosite group {} doesn't exist. Resetting to default groups.",
                group.as_ref()
            );
            return false;
        }
    }
    true
}

/// Daemon configuration, usually loaded from YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding pac.txt, user-rule.txt and abp.txt
    pub working_dir: PathBuf,
    /// Geosite database file; defaults to `<working_dir>/dlc.dat`
    pub database_path: Option<PathBuf>,
    pub geosite: GeositeConfig,
    /// Upper bound on each download
    pub fetch_timeout_secs: u64,
    /// How often the daemon checks for a new database
    pub update_interval_secs: u64,
    /// File-watch debounce delay
    pub debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            database_path: None,
            geosite: GeositeConfig::default(),
            fetch_timeout_secs: 30,
            update_interval_secs: 86400,
            debounce_ms: 10,
        }
    }
}

impl Config {
    /// Load from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse from YAML text. An empty document yields the defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.working_dir.join("dlc.dat"))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    /// How often a running daemon asks whether an update is due.
    ///
    /// Shorter than the update interval so a failed check is retried
    /// within the hour; never below one second.
    pub fn check_period(&self) -> Duration {
        self.update_interval()
            .min(MAX_CHECK_PERIOD)
            .max(Duration::from_secs(1))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geosite::DomainEntry;
    use crate::MatchType;

    fn index() -> GeositeIndex {
        GeositeIndex::from_groups([
            ("cn", vec![DomainEntry::new(MatchType::Domain, "example.cn")]),
            (
                "geolocation-!cn",
                vec![DomainEntry::new(MatchType::Domain, "example.com")],
            ),
        ])
    }

    #[test]
    fn test_defaults() {
        let config = GeositeConfig::default();
        assert_eq!(config.direct_groups, vec!["cn", "geolocation-!cn@cn"]);
        assert_eq!(config.proxied_groups, vec!["geolocation-!cn"]);
        assert!(!config.prefer_direct);
        assert_eq!(config.source_url(), DEFAULT_GEOSITE_URL);
        assert_eq!(
            config.checksum_url(),
            "https://github.com/v2fly/domain-list-community/raw/release/dlc.dat.sha256sum"
        );
    }

    #[test]
    fn test_custom_urls() {
        let config = GeositeConfig {
            url: " https://mirror.example/dlc.dat ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.source_url(), "https://mirror.example/dlc.dat");
        assert_eq!(config.checksum_url(), "https://mirror.example/dlc.dat.sha256sum");

        let config = GeositeConfig {
            checksum_url: "https://mirror.example/sum".to_string(),
            ..config
        };
        assert_eq!(config.checksum_url(), "https://mirror.example/sum");
    }

    #[test]
    fn test_check_group() {
        let index = index();
        assert!(check_group(&index, "cn"));
        assert!(check_group(&index, "CN@cn"));
        assert!(!check_group(&index, "private"));
        assert!(!check_group(&index, "cn@a@b"));
    }

    #[test]
    fn test_validated_resets_only_bad_lists() {
        let config = GeositeConfig {
            direct_groups: vec!["cn".to_string(), "nope".to_string()],
            proxied_groups: vec!["geolocation-!cn".to_string()],
            prefer_direct: true,
            ..Default::default()
        };

        let fixed = config.validated(&index());
        assert_eq!(fixed.direct_groups, default_direct_groups());
        assert_eq!(fixed.proxied_groups, vec!["geolocation-!cn"]);
        assert!(fixed.prefer_direct);
        // The input is untouched
        assert_eq!(config.direct_groups, vec!["cn", "nope"]);
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
working_dir: /var/lib/geopac
geosite:
  direct_groups: [cn]
  prefer_direct: true
update_interval_secs: 3600
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.working_dir, PathBuf::from("/var/lib/geopac"));
        assert_eq!(config.database_path(), PathBuf::from("/var/lib/geopac/dlc.dat"));
        assert_eq!(config.geosite.direct_groups, vec!["cn"]);
        assert_eq!(config.geosite.proxied_groups, default_proxied_groups());
        assert!(config.geosite.prefer_direct);
        assert_eq!(config.update_interval(), Duration::from_secs(3600));
        assert_eq!(config.debounce(), Duration::from_millis(10));
    }

    #[test]
    fn test_check_period() {
        assert_eq!(Config::default().check_period(), MAX_CHECK_PERIOD);

        let config = Config {
            update_interval_secs: 600,
            ..Default::default()
        };
        assert_eq!(config.check_period(), Duration::from_secs(600));

        let config = Config {
            update_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.check_period(), Duration::from_secs(1));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("  \n").unwrap(), Config::default());
    }

    #[test]
    fn test_policy() {
        let policy = GeositeConfig::default().policy();
        assert_eq!(policy.direct_groups, default_direct_groups());
        assert!(!policy.prefer_direct);
    }
}
