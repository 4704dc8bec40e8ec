//! Coordinate extraction from NOTAM body text.
//!
//! NOTAM bodies embed their location as a degrees-minutes token with no
//! separator: `DDMM` + hemisphere letter, immediately followed by `DDDMM` +
//! hemisphere letter (e.g. `3726N12706E`). Extraction is total: a notice
//! without a parseable token gets the fixed fallback location so that one
//! malformed record can never abort a batch.

use std::sync::LazyLock;

use regex::Regex;

/// Fallback location (Seoul) for notices without a coordinate token.
pub const FALLBACK_LAT: f64 = 37.5665;
pub const FALLBACK_LON: f64 = 126.9780;

static COORD_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2})(\d{2})([NS])(\d{3})(\d{2})([EW])").unwrap());

/// Extract the first coordinate token from `text` as decimal degrees.
///
/// Returns `(FALLBACK_LAT, FALLBACK_LON)` when no token is present or any
/// part of it fails to parse.
pub fn extract_coords(text: &str) -> (f64, f64) {
    parse_token(text).unwrap_or((FALLBACK_LAT, FALLBACK_LON))
}

fn parse_token(text: &str) -> Option<(f64, f64)> {
    let caps = COORD_TOKEN.captures(text)?;

    let lat_deg: f64 = caps.get(1)?.as_str().parse().ok()?;
    let lat_min: f64 = caps.get(2)?.as_str().parse().ok()?;
    let lon_deg: f64 = caps.get(4)?.as_str().parse().ok()?;
    let lon_min: f64 = caps.get(5)?.as_str().parse().ok()?;

    let mut latitude = lat_deg + lat_min / 60.0;
    if caps.get(3)?.as_str() == "S" {
        latitude = -latitude;
    }

    let mut longitude = lon_deg + lon_min / 60.0;
    if caps.get(6)?.as_str() == "W" {
        longitude = -longitude;
    }

    Some((latitude, longitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn north_east_token() {
        let (lat, lon) = extract_coords("QRTCA E) AIRSPACE CLSD 3726N12706E RADIUS 5NM");
        assert_close(lat, 37.0 + 26.0 / 60.0);
        assert_close(lon, 127.0 + 6.0 / 60.0);
    }

    #[test]
    fn south_west_token_negates() {
        let (lat, lon) = extract_coords("3726S12706W");
        assert_close(lat, -(37.0 + 26.0 / 60.0));
        assert_close(lon, -(127.0 + 6.0 / 60.0));
    }

    #[test]
    fn missing_token_falls_back() {
        let (lat, lon) = extract_coords("RWY 15L/33R CLSD DUE TO MAINT");
        assert_close(lat, FALLBACK_LAT);
        assert_close(lon, FALLBACK_LON);
    }

    #[test]
    fn empty_text_falls_back() {
        assert_eq!(extract_coords(""), (FALLBACK_LAT, FALLBACK_LON));
    }

    #[test]
    fn separator_between_halves_is_not_a_token() {
        // The portal's token has no whitespace between latitude and longitude.
        let (lat, lon) = extract_coords("3726N 12706E");
        assert_close(lat, FALLBACK_LAT);
        assert_close(lon, FALLBACK_LON);
    }

    #[test]
    fn first_token_wins() {
        let (lat, _) = extract_coords("3726N12706E AND ALSO 1000N01000E");
        assert_close(lat, 37.0 + 26.0 / 60.0);
    }
}
