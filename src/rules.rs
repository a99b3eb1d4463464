//! ABP rule generation from geosite groups.
//!
//! Output order decides matching precedence in the PAC script, so it is
//! fully determined by the input: blocking rules before exception rules,
//! selectors in caller order, entries in database order.

use crate::geosite::GeositeIndex;
use crate::{GroupSelector, Result};

/// Rule that matches every URL.
pub const MATCH_ALL_RULE: &str = "/.*/";

/// Prefix turning a blocking rule into an exception rule.
pub const EXCEPTION_PREFIX: &str = "@@";

/// Which groups go direct, which go through the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingPolicy {
    pub direct_groups: Vec<String>,
    pub proxied_groups: Vec<String>,
    /// Blacklist mode: proxy only `proxied_groups`, minus `direct_groups`.
    /// Otherwise proxy everything except `direct_groups`.
    pub prefer_direct: bool,
}

impl RoutingPolicy {
    pub fn new(
        direct_groups: Vec<String>,
        proxied_groups: Vec<String>,
        prefer_direct: bool,
    ) -> Self {
        Self {
            direct_groups,
            proxied_groups,
            prefer_direct,
        }
    }
}

/// Generates rule lines against one index.
pub struct RuleGenerator<'a> {
    index: &'a GeositeIndex,
}

impl<'a> RuleGenerator<'a> {
    pub fn new(index: &'a GeositeIndex) -> Self {
        Self { index }
    }

    /// Rules matching the domains of `selectors`.
    ///
    /// Fails on the first malformed selector or unknown group.
    pub fn blocking_rules<S: AsRef<str>>(&self, selectors: &[S]) -> Result<Vec<String>> {
        let mut lines = Vec::new();

        for selector in selectors {
            let selector = GroupSelector::parse(selector.as_ref())?;
            let entries = self.index.get(&selector.group)?;

            let filtered = entries.iter().filter(|entry| match &selector.attribute {
                Some(attr) => entry.has_attribute(attr),
                None => true,
            });
            for entry in filtered {
                entry.match_type.push_rule_lines(&entry.value, &mut lines);
            }
        }

        Ok(lines)
    }

    /// [`blocking_rules`](Self::blocking_rules) with every line prefixed `@@`.
    pub fn exception_rules<S: AsRef<str>>(&self, selectors: &[S]) -> Result<Vec<String>> {
        Ok(self
            .blocking_rules(selectors)?
            .into_iter()
            .map(|rule| format!("{}{}", EXCEPTION_PREFIX, rule))
            .collect())
    }

    /// All rule lines for a policy.
    pub fn generate(&self, policy: &RoutingPolicy) -> Result<Vec<String>> {
        let mut lines = if policy.prefer_direct {
            self.blocking_rules(&policy.proxied_groups)?
        } else {
            // proxied_groups are already covered by the catch-all
            vec![MATCH_ALL_RULE.to_string()]
        };
        lines.extend(self.exception_rules(&policy.direct_groups)?);
        Ok(lines)
    }
}

/// Generate the rule lines for `policy` against `index`.
pub fn generate_rules(index: &GeositeIndex, policy: &RoutingPolicy) -> Result<Vec<String>> {
    RuleGenerator::new(index).generate(policy)
}
