use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::dates::{excel_serial_to_date, parse_with_formats};
use crate::error::{ReimburseError, Result};
use crate::models::WorkDayRecord;
use crate::settings::ExcelSettings;

// ---------------------------------------------------------------------------
// Table model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl From<&calamine::Data> for CellValue {
    fn from(data: &calamine::Data) -> Self {
        use calamine::Data;
        match data {
            Data::Empty | Data::Error(_) => CellValue::Empty,
            Data::String(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::DateTimeIso(s) => match NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                Ok(dt) => CellValue::DateTime(dt),
                Err(_) => CellValue::Text(s.clone()),
            },
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Text(b.to_string()),
            Data::DateTime(dt) => match excel_serial_to_date(dt.as_f64()) {
                Some(date) => CellValue::Date(date),
                None => CellValue::Empty,
            },
        }
    }
}

impl CellValue {
    fn header_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Date(d) => d.to_string(),
            CellValue::DateTime(dt) => dt.to_string(),
        }
    }
}

static EMPTY_CELL: CellValue = CellValue::Empty;

/// A header row plus data rows, already past the skipped preamble.
#[derive(Debug, Clone, Default)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

// ---------------------------------------------------------------------------
// Schema resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSchema {
    pub date_col: usize,
    pub hours_col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMismatch {
    pub expected: Vec<String>,
}

impl std::fmt::Display for SchemaMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "未找到工作时长列（候选列名: {}），请检查Excel文件结构", self.expected.join(", "))
    }
}

/// First alias present among the headers wins. The date is always column 0.
pub fn resolve_schema(headers: &[String], aliases: &[String]) -> std::result::Result<ResolvedSchema, SchemaMismatch> {
    for alias in aliases {
        if let Some(idx) = headers.iter().position(|h| h.trim() == alias.trim()) {
            return Ok(ResolvedSchema {
                date_col: 0,
                hours_col: idx,
            });
        }
    }
    Err(SchemaMismatch {
        expected: aliases.to_vec(),
    })
}

// ---------------------------------------------------------------------------
// Row parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AttendanceParse {
    pub records: Vec<WorkDayRecord>,
    pub skipped_rows: usize,
    pub error: Option<String>,
}

impl AttendanceParse {
    fn failed(message: String) -> Self {
        Self {
            records: Vec::new(),
            skipped_rows: 0,
            error: Some(message),
        }
    }
}

fn parse_hours(cell: &CellValue, rest_markers: &[String]) -> Option<f64> {
    match cell {
        CellValue::Number(n) if n.is_finite() && *n >= 0.0 => Some(*n),
        CellValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() || rest_markers.iter().any(|m| m.trim() == s) {
                return None;
            }
            s.parse::<f64>().ok().filter(|h| h.is_finite() && *h >= 0.0)
        }
        _ => None,
    }
}

fn parse_day(cell: &CellValue, formats: &[String]) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(d) => Some(*d),
        CellValue::DateTime(dt) => Some(dt.date()),
        CellValue::Text(s) => parse_with_formats(s, formats),
        _ => None,
    }
}

pub fn parse_table(table: &SheetTable, excel: &ExcelSettings, date_formats: &[String]) -> AttendanceParse {
    let schema = match resolve_schema(&table.headers, &excel.work_hours_columns) {
        Ok(s) => s,
        Err(mismatch) => {
            warn!(headers = ?table.headers, "Work-hours column not found");
            return AttendanceParse::failed(mismatch.to_string());
        }
    };

    let mut records = Vec::new();
    let mut skipped_rows = 0usize;
    for row in &table.rows {
        let cell = |idx: usize| row.get(idx).unwrap_or(&EMPTY_CELL);
        let Some(work_hours) = parse_hours(cell(schema.hours_col), &excel.rest_markers) else {
            skipped_rows += 1;
            continue;
        };
        let Some(date) = parse_day(cell(schema.date_col), date_formats) else {
            skipped_rows += 1;
            continue;
        };
        records.push(WorkDayRecord { date, work_hours });
    }

    debug!(records = records.len(), skipped = skipped_rows, "Attendance table parsed");
    AttendanceParse {
        records,
        skipped_rows,
        error: None,
    }
}

// ---------------------------------------------------------------------------
// Workbook loading
// ---------------------------------------------------------------------------

/// Load a sheet, skipping `skip_rows` physical rows above the header row.
/// Falls back to the first sheet when the named one is missing.
pub fn read_sheet(file_path: &Path, sheet_name: &str, skip_rows: usize) -> Result<SheetTable> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| ReimburseError::Spreadsheet(format!("Failed to open {}: {e}", file_path.display())))?;

    let range = match workbook.worksheet_range(sheet_name) {
        Ok(range) => range,
        Err(_) => {
            warn!(sheet = sheet_name, "Sheet not found, falling back to the first sheet");
            workbook
                .worksheet_range_at(0)
                .ok_or_else(|| ReimburseError::Spreadsheet("Workbook has no sheets".to_string()))?
                .map_err(|e| ReimburseError::Spreadsheet(e.to_string()))?
        }
    };

    // calamine ranges begin at the first non-empty row, not at row 0
    let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
    let skip = skip_rows.saturating_sub(first_row);

    let mut rows = range.rows().skip(skip);
    let headers = match rows.next() {
        Some(header) => header.iter().map(|c| CellValue::from(c).header_text()).collect(),
        None => Vec::new(),
    };
    let rows = rows
        .map(|r| r.iter().map(CellValue::from).collect())
        .collect();
    Ok(SheetTable { headers, rows })
}

/// Parse an attendance export end to end. Never fails: total failures come
/// back as an empty record list plus a message.
pub fn parse_attendance_file(file_path: &Path, excel: &ExcelSettings, date_formats: &[String]) -> AttendanceParse {
    let table = match read_sheet(file_path, &excel.checkin_sheet_name, excel.checkin_skip_rows) {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, file = %file_path.display(), "Failed to read attendance file");
            return AttendanceParse::failed(format!("解析Excel文件失败: {e}"));
        }
    };
    let parsed = parse_table(&table, excel, date_formats);
    if parsed.error.is_none() {
        info!(
            file = %file_path.display(),
            records = parsed.records.len(),
            skipped = parsed.skipped_rows,
            "Attendance parsed"
        );
    }
    parsed
}
