//! Composition of the PAC script from rules and a template.

use crate::Result;

/// Packaged PAC template used when no user template exists.
pub const DEFAULT_TEMPLATE: &str = include_str!("../../assets/abp.js");

/// Initial content of the user-rule file.
pub const DEFAULT_USER_RULES: &str = include_str!("../../assets/user-rule.txt");

/// Keep the directive lines of a user-rule file.
///
/// Blank lines and lines starting with `!` or `[` are dropped; everything
/// else passes through unchanged.
pub fn process_user_rules(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| {
            !line.trim().is_empty() && !line.starts_with('!') && !line.starts_with('[')
        })
        .map(str::to_string)
        .collect()
}

/// Prepend the user rules and generated rules to `template` as two JS
/// arrays.
pub fn compose_pac(user_rules: &[String], rules: &[String], template: &str) -> Result<String> {
    Ok(format!(
        "var __USERRULES__ = {};\nvar __RULES__ = {};\n{}",
        serde_json::to_string_pretty(user_rules)?,
        serde_json::to_string_pretty(rules)?,
        template
    ))
}
