//! Geopac - Geosite-driven PAC script generation.
//!
//! This crate turns the v2fly geosite domain database into Adblock Plus
//! style rules and keeps a Proxy Auto-Config script built from them up to
//! date.
//!
//! # Features
//!
//! - **Geosite groups**: Load `dlc.dat` and select groups as `name` or `name@attribute`
//! - **Rule generation**: Deterministic ABP rules for blacklist and whitelist routing
//! - **Checksum-gated updates**: Download a new database only when its published SHA-256 verifies
//! - **PAC merging**: Combine user rules, generated rules and a template, writing only on change
//! - **File watching**: Debounced notifications when the PAC or user-rule file is edited
//!
//! # Quick Start
//!
//! ```ignore
//! use geopac::{generate_rules, GeositeConfig, geosite::GeositeDatabase, DEFAULT_DATABASE};
//! use std::path::Path;
//!
//! let database = GeositeDatabase::open(Path::new("dlc.dat"), DEFAULT_DATABASE)?;
//! let rules = generate_rules(&database.index(), &GeositeConfig::default().policy())?;
//! assert_eq!(rules[0], "/.*/");
//! ```
//!
//! # Daemon
//!
//! [`PacDaemon`] owns the working directory files and publishes [`PacEvent`]s:
//!
//! ```ignore
//! use geopac::{Config, PacDaemon, SourceSynchronizer};
//!
//! let daemon = PacDaemon::new(&config.working_dir, database);
//! daemon.ensure_defaults()?;
//!
//! let sync = SourceSynchronizer::http(config.fetch_timeout())?;
//! daemon.update_from_source(&sync, &config.geosite).await;
//! ```
//!
//! # Rule Lines
//!
//! | Entry type | Rule lines                     |
//! |------------|--------------------------------|
//! | Plain      | `value`                        |
//! | Regex      | `/value/`                      |
//! | Domain     | `\|\|value`                    |
//! | Full       | `\|http://value`, `\|https://value` |
//!
//! Exception rules are the same lines prefixed with `@@`.

mod checksum;
mod config;
mod error;
mod fetch;
mod fs;
mod match_type;
mod metadata;
mod rules;
mod selector;
mod sync;

pub mod geosite;
pub mod pac;

// Re-export core types
pub use error::{Error, Result};
pub use match_type::MatchType;
pub use selector::GroupSelector;

// Re-export rule generation
pub use rules::{generate_rules, RoutingPolicy, RuleGenerator, EXCEPTION_PREFIX, MATCH_ALL_RULE};

// Re-export configuration
pub use config::{
    check_group, default_direct_groups, default_proxied_groups, validate_group_list, Config,
    GeositeConfig, DEFAULT_GEOSITE_URL,
};

// Re-export source synchronization
pub use checksum::{parse_remote_checksum, sha256_hex};
pub use fetch::{Fetcher, HttpFetcher, DEFAULT_FETCH_TIMEOUT};
pub use sync::{SourceSynchronizer, UpdateResult};

// Re-export PAC maintenance
pub use pac::{PacDaemon, PacEvent};

// Re-export metadata
pub use metadata::UpdateMetadata;

/// Packaged geosite database used to seed a missing database file.
pub const DEFAULT_DATABASE: &[u8] = include_bytes!("../assets/dlc.dat");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_database_loads() {
        let index = geosite::GeositeIndex::load(DEFAULT_DATABASE).unwrap();
        for group in ["cn", "geolocation-!cn", "private"] {
            assert!(index.contains(group), "missing {}", group);
        }
        assert!(validate_group_list(&index, &default_direct_groups()));
        assert!(validate_group_list(&index, &default_proxied_groups()));
    }

    #[test]
    fn test_default_policy_on_default_database() {
        let index = geosite::GeositeIndex::load(DEFAULT_DATABASE).unwrap();
        let rules = generate_rules(&index, &GeositeConfig::default().policy()).unwrap();
        assert_eq!(rules[0], MATCH_ALL_RULE);
        assert!(rules[1..].iter().all(|r| r.starts_with(EXCEPTION_PREFIX)));
    }
}
