//! PAC script generation and the files around it.
//!
//! A working directory holds three files:
//!
//! - `pac.txt`: the generated script served to clients
//! - `user-rule.txt`: ABP rules maintained by hand, merged first
//! - `abp.txt`: optional replacement for the packaged PAC template

mod daemon;
mod merge;
mod watch;

pub use daemon::{PacDaemon, PacEvent, PacPaths, PacWatchers, PAC_FILE, USER_ABP_FILE, USER_RULE_FILE};
pub use merge::{compose_pac, process_user_rules, DEFAULT_TEMPLATE, DEFAULT_USER_RULES};
pub use watch::{FileWatcher, DEFAULT_DEBOUNCE};
