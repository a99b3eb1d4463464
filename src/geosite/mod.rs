//! Geosite domain database.
//!
//! The database is the v2fly `dlc.dat` protobuf blob: a list of named
//! groups, each an ordered list of typed domain entries with optional
//! attributes. Loading it yields an immutable [`GeositeIndex`]; the
//! [`GeositeDatabase`] owns the on-disk file and swaps whole indexes on
//! refresh.

mod builder;
mod database;
mod index;
mod proto;

pub use builder::{GeositeBuilder, TextParser};
pub use database::{GeositeDatabase, Snapshot};
pub use index::{DomainEntry, GeositeIndex};
