//! Domain match type definitions.

use std::fmt;

/// MatchType represents how a geosite entry matches a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    /// Substring (keyword) match
    Plain,
    /// Regular expression match
    Regex,
    /// Domain suffix match
    Domain,
    /// Exact host match
    Full,
    /// A type this version does not know about
    Unknown(i32),
}

impl MatchType {
    /// Parse a match type from its text-source prefix (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "keyword" | "plain" => Some(MatchType::Plain),
            "regexp" | "regex" => Some(MatchType::Regex),
            "domain" => Some(MatchType::Domain),
            "full" => Some(MatchType::Full),
            _ => None,
        }
    }

    /// Get the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Plain => "keyword",
            MatchType::Regex => "regexp",
            MatchType::Domain => "domain",
            MatchType::Full => "full",
            MatchType::Unknown(_) => "unknown",
        }
    }

    /// Convert to the wire value.
    pub fn as_i32(&self) -> i32 {
        match self {
            MatchType::Plain => 0,
            MatchType::Regex => 1,
            MatchType::Domain => 2,
            MatchType::Full => 3,
            MatchType::Unknown(v) => *v,
        }
    }

    /// Convert from the wire value.
    pub fn from_i32(v: i32) -> Self {
        match v {
            0 => MatchType::Plain,
            1 => MatchType::Regex,
            2 => MatchType::Domain,
            3 => MatchType::Full,
            other => MatchType::Unknown(other),
        }
    }

    /// Append the ABP rule lines for `value` to `out`.
    ///
    /// Unknown types produce nothing.
    pub fn push_rule_lines(&self, value: &str, out: &mut Vec<String>) {
        match self {
            MatchType::Plain => out.push(value.to_string()),
            MatchType::Regex => out.push(format!("/{}/", value)),
            MatchType::Domain => out.push(format!("||{}", value)),
            MatchType::Full => {
                out.push(format!("|http://{}", value));
                out.push(format!("|https://{}", value));
            }
            MatchType::Unknown(_) => {}
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
