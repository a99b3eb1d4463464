//! Group selectors of the form `group` or `group@attribute`.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// A reference to a geosite group, optionally narrowed to entries carrying
/// one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupSelector {
    pub group: String,
    pub attribute: Option<String>,
}

impl GroupSelector {
    /// Split `group@attribute`. More than one `@` is rejected.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split('@');
        let group = parts.next().unwrap_or_default().to_string();
        let attribute = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Err(Error::InvalidSelector(s.to_string()));
        }

        Ok(Self {
            group,
            // `cn@` selects the whole group
            attribute: attribute.filter(|a| !a.is_empty()),
        })
    }
}

impl FromStr for GroupSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for GroupSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attribute {
            Some(attr) => write!(f, "{}@{}", self.group, attr),
            None => write!(f, "{}", self.group),
        }
    }
}
