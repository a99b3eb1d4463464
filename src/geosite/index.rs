//! In-memory index of a geosite database.

use ahash::AHashMap;
use prost::Message;

use super::proto::{ProtoDomain, ProtoGeoSiteList};
use crate::{Error, MatchType, Result};

/// A single domain-match entry of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEntry {
    pub match_type: MatchType,
    pub value: String,
    /// Attribute keys attached upstream, e.g. `cn` for `@cn`
    pub attributes: Vec<String>,
}

impl DomainEntry {
    pub fn new(match_type: MatchType, value: impl Into<String>) -> Self {
        Self {
            match_type,
            value: value.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>) -> Self {
        self.attributes.push(key.into());
        self
    }

    /// Presence-only check; the stored value of the attribute is ignored.
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.iter().any(|a| a == key)
    }
}

impl From<ProtoDomain> for DomainEntry {
    fn from(d: ProtoDomain) -> Self {
        Self {
            match_type: MatchType::from_i32(d.domain_type),
            value: d.value,
            attributes: d.attribute.into_iter().map(|a| a.key).collect(),
        }
    }
}

/// Group name to entries, keyed by lower-cased group name.
///
/// Entries keep database order. An index is never mutated after it is
/// built; a refresh builds a new one.
#[derive(Debug, Default, Clone)]
pub struct GeositeIndex {
    groups: AHashMap<String, Vec<DomainEntry>>,
    /// Group names in database order
    names: Vec<String>,
}

impl GeositeIndex {
    /// Parse a raw database blob.
    pub fn load(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::Parse("empty database".to_string()));
        }

        let list = ProtoGeoSiteList::decode(data)?;
        let mut index = Self::default();
        for site in list.entry {
            let entries = site.domain.into_iter().map(DomainEntry::from).collect();
            index.insert(&site.country_code, entries);
        }

        log::debug!("Loaded {} geosite groups", index.len());
        Ok(index)
    }

    /// Build an index from already-parsed groups.
    pub fn from_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<DomainEntry>)>,
        S: AsRef<str>,
    {
        let mut index = Self::default();
        for (name, entries) in groups {
            index.insert(name.as_ref(), entries);
        }
        index
    }

    fn insert(&mut self, name: &str, entries: Vec<DomainEntry>) {
        let key = name.to_lowercase();
        // A repeated group name replaces the earlier one.
        if self.groups.insert(key.clone(), entries).is_none() {
            self.names.push(key);
        }
    }

    /// Look up a group (case-insensitive).
    pub fn get(&self, group: &str) -> Result<&[DomainEntry]> {
        self.groups
            .get(&group.to_lowercase())
            .map(Vec::as_slice)
            .ok_or_else(|| Error::GroupNotFound(group.to_string()))
    }

    /// Check whether a group exists (case-insensitive).
    pub fn contains(&self, group: &str) -> bool {
        self.groups.contains_key(&group.to_lowercase())
    }

    /// Group names in database order.
    pub fn group_names(&self) -> &[String] {
        &self.names
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
