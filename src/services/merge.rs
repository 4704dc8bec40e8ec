//! Export-artifact merging and row projection.
//!
//! The portal's "excel" export is an HTML table behind a spreadsheet
//! extension, with column headers in whichever language the session was in.
//! Each artifact is parsed into raw rows, headers are mapped to semantic
//! fields by their literal text, rows are projected into [`NotamRecord`]s,
//! and the concatenated result is deduplicated by natural key. Pagination
//! desync can make later pages re-show rows already exported; this is the
//! single place that duplication gets corrected, first occurrence winning.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::models::NotamRecord;
use crate::services::geo::extract_coords;

/// Literal source headers accepted for each semantic field, lowercased.
/// The portal emits Korean headers for a ko_KR session and English ones for
/// the international view; both have drifted across portal revisions.
const ID_HEADERS: &[&str] = &["notam no", "notam no.", "notam번호", "series/no"];
const CONTENT_HEADERS: &[&str] = &["e) text", "contents", "본문", "내용"];
const START_HEADERS: &[&str] = &["start date", "start date(utc)", "시작일(utc)", "유효시작일"];
const END_HEADERS: &[&str] = &["end date", "end date(utc)", "종료일(utc)", "유효종료일"];

/// Result of merging all captured artifacts.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub records: Vec<NotamRecord>,
    pub artifacts_used: usize,
    pub artifacts_skipped: usize,
    pub duplicates_dropped: usize,
}

/// Merge artifacts in page order into a deduplicated record sequence.
///
/// An artifact that fails to parse is skipped with a warning; the merge
/// proceeds with whatever is valid. Zero valid artifacts yields an empty
/// outcome, which the caller treats as a soft no-op.
pub fn merge_artifacts(paths: &[PathBuf]) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    let mut seen: HashSet<String> = HashSet::new();

    for path in paths {
        let rows = match parse_artifact(path) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(artifact = %path.display(), "skipping unparseable artifact: {e:#}");
                outcome.artifacts_skipped += 1;
                continue;
            }
        };

        debug!(artifact = %path.display(), rows = rows.len(), "artifact parsed");
        outcome.artifacts_used += 1;

        for row in rows {
            let record = project(row);
            if seen.insert(record.notam_id.clone()) {
                outcome.records.push(record);
            } else {
                outcome.duplicates_dropped += 1;
            }
        }
    }

    outcome
}

/// A source row reduced to the fields the record model consumes.
struct RawRow {
    id: String,
    content: String,
    start: String,
    end: String,
}

fn project(row: RawRow) -> NotamRecord {
    let notam_id = row.id.trim().to_string();
    let (latitude, longitude) = extract_coords(&row.content);
    NotamRecord {
        series: NotamRecord::series_of(&notam_id),
        notam_id,
        content: row.content,
        latitude,
        longitude,
        start_date: row.start,
        end_date: row.end,
    }
}

fn parse_artifact(path: &Path) -> Result<Vec<RawRow>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    if text.trim_start().starts_with('<') {
        parse_html_table(&text)
    } else {
        parse_csv(&text)
    }
}

/// Column indexes for the semantic fields, resolved from literal headers.
struct ColumnMap {
    id: usize,
    content: usize,
    start: Option<usize>,
    end: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &[String]) -> Result<Self> {
        let find = |accepted: &[&str]| {
            headers
                .iter()
                .position(|h| accepted.contains(&h.trim().to_lowercase().as_str()))
        };

        let Some(id) = find(ID_HEADERS) else {
            bail!("no NOTAM id column among headers {headers:?}");
        };
        let Some(content) = find(CONTENT_HEADERS) else {
            bail!("no content column among headers {headers:?}");
        };

        Ok(Self {
            id,
            content,
            start: find(START_HEADERS),
            end: find(END_HEADERS),
        })
    }

    fn row(&self, cells: &[String]) -> RawRow {
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| cells.get(i))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        RawRow {
            id: cell(Some(self.id)),
            content: cell(Some(self.content)),
            start: cell(self.start),
            end: cell(self.end),
        }
    }
}

fn parse_html_table(html: &str) -> Result<Vec<RawRow>> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table").unwrap();
    let row_sel = Selector::parse("tr").unwrap();
    let header_sel = Selector::parse("th, td").unwrap();
    let cell_sel = Selector::parse("td").unwrap();

    let Some(table) = document.select(&table_sel).next() else {
        bail!("no table element in artifact");
    };

    let mut rows = table.select(&row_sel);
    let Some(header_row) = rows.next() else {
        bail!("table has no rows");
    };

    let headers: Vec<String> = header_row
        .select(&header_sel)
        .map(|cell| cell.text().collect::<String>())
        .collect();
    let map = ColumnMap::from_headers(&headers)?;

    let mut parsed = Vec::new();
    for row in rows {
        let cells: Vec<String> = row
            .select(&cell_sel)
            .map(|cell| cell.text().collect::<String>())
            .collect();
        if cells.is_empty() {
            continue;
        }
        parsed.push(map.row(&cells));
    }

    Ok(parsed)
}

fn parse_csv(text: &str) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("reading csv headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let map = ColumnMap::from_headers(&headers)?;

    let mut parsed = Vec::new();
    for result in reader.records() {
        let record = result.context("reading csv row")?;
        let cells: Vec<String> = record.iter().map(|c| c.to_string()).collect();
        if cells.is_empty() {
            continue;
        }
        parsed.push(map.row(&cells));
    }

    Ok(parsed)
}
