//! Data models.

mod notam;

pub use notam::{NotamRecord, NOTAM_ID_RE, UNKNOWN_SERIES};
