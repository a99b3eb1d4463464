//! Geosite database writer and text source parser.

use prost::Message;
use std::io::{BufRead, BufReader, Read};

use super::index::DomainEntry;
use super::proto::{AttributeValue, ProtoAttribute, ProtoDomain, ProtoGeoSite, ProtoGeoSiteList};
use crate::{Error, MatchType, Result};

/// Accumulates groups and encodes them to the binary database format.
#[derive(Debug, Default)]
pub struct GeositeBuilder {
    groups: Vec<(String, Vec<DomainEntry>)>,
}

impl GeositeBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to `group`, creating the group on first use.
    pub fn add_entry(&mut self, group: &str, entry: DomainEntry) -> &mut Self {
        match self.groups.iter_mut().find(|(name, _)| name == group) {
            Some((_, entries)) => entries.push(entry),
            None => self.groups.push((group.to_string(), vec![entry])),
        }
        self
    }

    /// Ensure `group` exists even if it never receives entries.
    pub fn add_group(&mut self, group: &str) -> &mut Self {
        if !self.groups.iter().any(|(name, _)| name == group) {
            self.groups.push((group.to_string(), Vec::new()));
        }
        self
    }

    /// Number of groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Total number of entries across all groups.
    pub fn entry_count(&self) -> usize {
        self.groups.iter().map(|(_, e)| e.len()).sum()
    }

    /// Encode to database bytes.
    pub fn encode(&self) -> Vec<u8> {
        let list = ProtoGeoSiteList {
            entry: self
                .groups
                .iter()
                .map(|(name, entries)| ProtoGeoSite {
                    country_code: name.clone(),
                    domain: entries.iter().map(to_proto).collect(),
                })
                .collect(),
        };
        list.encode_to_vec()
    }
}

fn to_proto(entry: &DomainEntry) -> ProtoDomain {
    ProtoDomain {
        domain_type: entry.match_type.as_i32(),
        value: entry.value.clone(),
        attribute: entry
            .attributes
            .iter()
            .map(|key| ProtoAttribute {
                key: key.clone(),
                typed_value: Some(AttributeValue::BoolValue(true)),
            })
            .collect(),
    }
}

/// Parser for the plain-text group source.
///
/// ```text
/// # comment
/// [cn]
/// domain:example.cn
/// full:www.gov.cn @cn
/// keyword:taobao
/// regexp:^ad[0-9]+\.
/// baidu.com
/// ```
pub struct TextParser;

impl TextParser {
    /// Parse groups from a reader.
    pub fn parse<R: Read>(reader: R) -> Result<GeositeBuilder> {
        let mut builder = GeositeBuilder::new();
        let mut current_group: Option<String> = None;

        for (lineno, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;

            // Remove comments
            let line = match line.find('#') {
                Some(idx) => &line[..idx],
                None => &line,
            };
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let name = line[1..line.len() - 1].trim();
                if name.is_empty() {
                    return Err(Error::Config(format!("line {}: empty group name", lineno + 1)));
                }
                builder.add_group(name);
                current_group = Some(name.to_string());
                continue;
            }

            let group = current_group.as_deref().ok_or_else(|| {
                Error::Config(format!("line {}: entry outside of a group", lineno + 1))
            })?;
            builder.add_entry(group, parse_entry(line, lineno + 1)?);
        }

        Ok(builder)
    }
}

fn parse_entry(line: &str, lineno: usize) -> Result<DomainEntry> {
    let mut parts = line.split_whitespace();
    let rule = parts.next().unwrap_or_default();

    // Regexes may contain ':', so only split on a known prefix.
    let (match_type, value) = match rule.split_once(':') {
        Some((prefix, rest)) => match MatchType::parse(prefix) {
            Some(t) => (t, rest),
            None => (MatchType::Domain, rule),
        },
        None => (MatchType::Domain, rule),
    };
    if value.is_empty() {
        return Err(Error::Config(format!("line {}: empty value", lineno)));
    }

    let mut entry = DomainEntry::new(match_type, value);
    for attr in parts {
        match attr.strip_prefix('@') {
            Some(key) if !key.is_empty() => entry = entry.with_attribute(key),
            _ => {
                return Err(Error::Config(format!(
                    "line {}: unexpected token '{}'",
                    lineno, attr
                )))
            }
        }
    }
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geosite::GeositeIndex;

    #[test]
    fn test_add_entry_groups_by_name() {
        let mut builder = GeositeBuilder::new();
        builder
            .add_entry("cn", DomainEntry::new(MatchType::Domain, "a.cn"))
            .add_entry("us", DomainEntry::new(MatchType::Domain, "a.us"))
            .add_entry("cn", DomainEntry::new(MatchType::Domain, "b.cn"));

        assert_eq!(builder.group_count(), 2);
        assert_eq!(builder.entry_count(), 3);
    }

    #[test]
    fn test_parse_text_source() {
        let text = r#"
# Comment
[cn]
domain:example.cn
full:www.gov.cn @cn
keyword:taobao
regexp:^ad[0-9]+\.example:8080
baidu.com

[empty]
"#;

        let builder = TextParser::parse(text.as_bytes()).unwrap();
        let index = GeositeIndex::load(&builder.encode()).unwrap();

        let cn = index.get("cn").unwrap();
        assert_eq!(cn.len(), 5);
        assert_eq!(cn[1].match_type, MatchType::Full);
        assert!(cn[1].has_attribute("cn"));
        assert_eq!(cn[2].match_type, MatchType::Plain);
        assert_eq!(cn[3].value, "^ad[0-9]+\\.example:8080");
        assert_eq!(cn[4], DomainEntry::new(MatchType::Domain, "baidu.com"));
        assert!(index.get("empty").unwrap().is_empty());
    }

    #[test]
    fn test_entry_outside_group() {
        assert!(TextParser::parse("example.com\n".as_bytes()).is_err());
    }

    #[test]
    fn test_bad_attribute_token() {
        assert!(TextParser::parse("[cn]\nexample.cn cn\n".as_bytes()).is_err());
    }
}
