//! Canonical NOTAM record model.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Natural-key shape: series letter, four digits, a slash, two-digit year
/// (e.g. `A1234/26`).
pub static NOTAM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]\d{4}/\d{2}").unwrap());

/// Series used when a row arrives without an identifier.
pub const UNKNOWN_SERIES: &str = "U";

/// A single notice as consumed by the map frontend.
///
/// Records are constructed once per run from merged export artifacts and
/// handed wholesale to the store reconciler; they are never updated
/// incrementally. `start_date`/`end_date` are the source's UTC strings,
/// passed through without validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotamRecord {
    pub notam_id: String,
    pub series: String,
    pub content: String,
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: String,
    pub end_date: String,
}

impl NotamRecord {
    /// Coarse category of a notice: the first character of its identifier,
    /// or [`UNKNOWN_SERIES`] for an empty identifier.
    pub fn series_of(notam_id: &str) -> String {
        notam_id
            .chars()
            .next()
            .map(|c| c.to_string())
            .unwrap_or_else(|| UNKNOWN_SERIES.to_string())
    }
}
