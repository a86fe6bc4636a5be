use regex::Regex;

use crate::models::LocationSource;
use crate::pdf::TextTable;
use crate::settings::LocationPlaceholder;

use super::fields::labeled_pair;

#[derive(Debug, Clone, PartialEq)]
pub struct TripLocations {
    pub start: String,
    pub end: String,
    pub source: LocationSource,
}

impl TripLocations {
    fn new(start: String, end: String, source: LocationSource) -> Self {
        Self { start, end, source }
    }

    fn missing() -> Self {
        Self::new(String::new(), String::new(), LocationSource::Missing)
    }
}

/// Resolve a taxi trip's start and end points.
///
/// Tried in order: labeled `起点：… 终点：…` pairs, a trip table with
/// 起点/终点 header cells, the vendor trip-list line layout, and finally the
/// configured placeholder. Without a placeholder the result is empty and
/// flagged [`LocationSource::Missing`].
pub fn resolve_taxi_locations(
    text: &str,
    tables: &[TextTable],
    placeholder: Option<&LocationPlaceholder>,
) -> TripLocations {
    if let Some((start, end)) = labeled_pair(
        text,
        &[("起点", "终点"), ("出发", "到达"), ("(?i:Start)", "(?i:End)")],
    ) {
        return TripLocations::new(start, end, LocationSource::Labeled);
    }
    if let Some((start, end)) = from_tables(tables) {
        return TripLocations::new(start, end, LocationSource::VendorLayout);
    }
    if let Some((start, end)) = from_trip_list(text) {
        return TripLocations::new(start, end, LocationSource::VendorLayout);
    }
    match placeholder {
        Some(p) => TripLocations::new(p.start.clone(), p.end.clone(), LocationSource::Placeholder),
        None => TripLocations::missing(),
    }
}

fn from_tables(tables: &[TextTable]) -> Option<(String, String)> {
    for table in tables {
        let Some((header_idx, start_col, end_col)) = table.iter().enumerate().find_map(|(i, row)| {
            let start = row.iter().position(|c| c.contains("起点"))?;
            let end = row.iter().position(|c| c.contains("终点"))?;
            Some((i, start, end))
        }) else {
            continue;
        };
        for row in &table[header_idx + 1..] {
            let start = row.get(start_col).map(|c| strip_currency(c)).unwrap_or_default();
            let end = row.get(end_col).map(|c| strip_currency(c)).unwrap_or_default();
            if !start.is_empty() && !end.is_empty() {
                return Some((start, end));
            }
        }
    }
    None
}

/// Whitespace-separated trip list: a header line naming 序号, 起点 and 终点,
/// then numbered rows. Pickup times split into an extra `HH:MM` token that
/// shifts the columns right.
fn from_trip_list(text: &str) -> Option<(String, String)> {
    let ws = Regex::new(r"\s+").ok()?;
    let row_re = Regex::new(r"^\d+\s").ok()?;
    let time_re = Regex::new(r"^\d{2}:\d{2}$").ok()?;

    let mut columns: Option<(usize, usize)> = None;
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.contains("序号") && line.contains("起点") && line.contains("终点") {
            let parts: Vec<&str> = ws.split(line).collect();
            let start = parts.iter().position(|p| p.contains("起点"));
            let end = parts.iter().position(|p| p.contains("终点"));
            columns = start.zip(end);
            continue;
        }
        let Some((start_col, end_col)) = columns else { continue };
        if !row_re.is_match(line) {
            continue;
        }

        let parts: Vec<&str> = ws.split(line).collect();
        let shift = parts
            .iter()
            .take(start_col.min(parts.len()))
            .skip(1)
            .filter(|p| time_re.is_match(p))
            .count();
        let (Some(start), Some(end)) = (parts.get(start_col + shift), parts.get(end_col + shift)) else {
            continue;
        };
        let start = strip_currency(start);
        let end = strip_currency(end);
        if !start.is_empty() && !end.is_empty() {
            return Some((start, end));
        }
    }
    None
}

fn strip_currency(cell: &str) -> String {
    cell.replace('元', "").trim().to_string()
}
