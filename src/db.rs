use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::dates::parse_loose;
use crate::error::Result;
use crate::models::{
    DateSource, InvoiceType, LocationSource, ReceiptDetails, ReceiptRecord, WorkDayRecord,
};
use crate::period::ReimburseMonth;
use crate::reconciler::{to_cents, InvoiceLedger};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS config (
    id INTEGER PRIMARY KEY,
    key TEXT UNIQUE NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS checkin_records (
    id INTEGER PRIMARY KEY,
    date TEXT NOT NULL,
    work_hours REAL NOT NULL,
    month_folder TEXT NOT NULL,
    source_file TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    UNIQUE(date, month_folder)
);

CREATE TABLE IF NOT EXISTS invoice_records (
    id INTEGER PRIMARY KEY,
    invoice_type TEXT NOT NULL DEFAULT 'taxi',
    date TEXT NOT NULL,
    date_source TEXT,
    amount REAL NOT NULL,
    start_location TEXT,
    end_location TEXT,
    location_source TEXT,
    company TEXT,
    details TEXT,
    source_file TEXT,
    month_folder TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    month_folder TEXT,
    import_kind TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    checksum TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS export_history (
    id INTEGER PRIMARY KEY,
    month_folder TEXT NOT NULL,
    export_type TEXT NOT NULL,
    file_path TEXT NOT NULL,
    record_count INTEGER,
    total_amount REAL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_invoice_month ON invoice_records(month_folder, date);
";

pub const RULES_KEY: &str = "reimburse_rules";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    if let Some(dir) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM config WHERE key = ?1", [key], |row| row.get(0))
        .optional()?;
    Ok(raw.map(|text| serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))))
}

pub fn set_config(conn: &Connection, key: &str, value: &serde_json::Value) -> Result<()> {
    conn.execute(
        "INSERT INTO config (key, value, updated_at) VALUES (?1, ?2, datetime('now')) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        rusqlite::params![key, serde_json::to_string(value)?],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Attendance
// ---------------------------------------------------------------------------

fn date_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Upsert by (date, month); a re-import replaces the hours.
pub fn save_checkin_records(
    conn: &Connection,
    records: &[WorkDayRecord],
    month: &ReimburseMonth,
    source_file: &str,
) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO checkin_records (date, work_hours, month_folder, source_file) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(date, month_folder) DO UPDATE SET work_hours = excluded.work_hours, source_file = excluded.source_file",
        )?;
        for r in records {
            stmt.execute(rusqlite::params![date_text(r.date), r.work_hours, month.to_string(), source_file])?;
        }
    }
    tx.commit()?;
    Ok(records.len())
}

pub fn load_checkin_records(conn: &Connection, month: &ReimburseMonth) -> Result<Vec<WorkDayRecord>> {
    let mut stmt = conn.prepare(
        "SELECT date, work_hours FROM checkin_records WHERE month_folder = ?1 ORDER BY date",
    )?;
    let rows = stmt.query_map([month.to_string()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
    })?;
    let mut records = Vec::new();
    for row in rows {
        let (date, work_hours) = row?;
        match parse_loose(&date) {
            Some(date) => records.push(WorkDayRecord { date, work_hours }),
            None => warn!(date = %date, "Skipping stored attendance row with bad date"),
        }
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Invoices
// ---------------------------------------------------------------------------

fn enum_text<T: Serialize>(value: &T) -> Result<String> {
    Ok(match serde_json::to_value(value)? {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

fn text_enum<T: DeserializeOwned>(text: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(text.to_string())).ok()
}

/// Insert receipts that passed validation. Receipts without a date are
/// never stored.
pub fn save_invoice_records(conn: &Connection, records: &[ReceiptRecord], month: &ReimburseMonth) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut saved = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO invoice_records \
             (invoice_type, date, date_source, amount, start_location, end_location, location_source, company, details, source_file, month_folder) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        for r in records {
            let Some(date) = r.date else { continue };
            stmt.execute(rusqlite::params![
                r.invoice_type.key(),
                date_text(date),
                enum_text(&r.date_source)?,
                r.amount,
                r.start_location,
                r.end_location,
                enum_text(&r.location_source)?,
                r.company,
                serde_json::to_string(&r.details)?,
                r.source_file,
                month.to_string(),
            ])?;
            saved += 1;
        }
    }
    tx.commit()?;
    Ok(saved)
}

/// Same date and amount (to the cent) already stored for this month.
pub fn invoice_exists(conn: &Connection, date: NaiveDate, amount: f64, month: &ReimburseMonth) -> Result<bool> {
    let mut stmt = conn.prepare(
        "SELECT 1 FROM invoice_records WHERE date = ?1 AND CAST(ROUND(amount * 100) AS INTEGER) = ?2 AND month_folder = ?3",
    )?;
    Ok(stmt.exists(rusqlite::params![date_text(date), to_cents(amount), month.to_string()])?)
}

pub fn load_invoices(conn: &Connection, month: &ReimburseMonth) -> Result<Vec<ReceiptRecord>> {
    let mut stmt = conn.prepare(
        "SELECT invoice_type, date, date_source, amount, start_location, end_location, location_source, company, details, source_file \
         FROM invoice_records WHERE month_folder = ?1 ORDER BY date, id",
    )?;
    let rows = stmt.query_map([month.to_string()], |row| {
        let invoice_type = InvoiceType::from_key(&row.get::<_, String>(0)?).unwrap_or(InvoiceType::Other);
        let details = row
            .get::<_, Option<String>>(8)?
            .and_then(|d| serde_json::from_str::<ReceiptDetails>(&d).ok())
            .unwrap_or(ReceiptDetails::Other { purpose: String::new() });
        Ok(ReceiptRecord {
            invoice_type,
            amount: row.get(3)?,
            date: parse_loose(&row.get::<_, String>(1)?),
            date_source: row
                .get::<_, Option<String>>(2)?
                .and_then(|s| text_enum(&s))
                .unwrap_or(DateSource::Labeled),
            start_location: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            end_location: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            location_source: row
                .get::<_, Option<String>>(6)?
                .and_then(|s| text_enum(&s))
                .unwrap_or(LocationSource::Missing),
            company: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            details,
            source_file: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// Imports and exports
// ---------------------------------------------------------------------------

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

pub fn import_exists(conn: &Connection, checksum: &str, month: &ReimburseMonth) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM imports WHERE checksum = ?1 AND month_folder = ?2")?;
    Ok(stmt.exists(rusqlite::params![checksum, month.to_string()])?)
}

pub fn record_import(
    conn: &Connection,
    file_path: &Path,
    month: &ReimburseMonth,
    kind: &str,
    record_count: usize,
    checksum: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO imports (filename, month_folder, import_kind, record_count, checksum) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            file_path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            month.to_string(),
            kind,
            record_count as i64,
            checksum,
        ],
    )?;
    Ok(())
}

pub fn save_export_history(
    conn: &Connection,
    month: &ReimburseMonth,
    export_type: &str,
    file_path: &Path,
    record_count: usize,
    total_amount: f64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO export_history (month_folder, export_type, file_path, record_count, total_amount) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            month.to_string(),
            export_type,
            file_path.display().to_string(),
            record_count as i64,
            total_amount,
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MonthSummary {
    pub month: String,
    pub checkin_days: i64,
    pub invoices: i64,
    pub invoice_total: f64,
}

#[derive(Debug, Default)]
pub struct Statistics {
    pub checkin_records: i64,
    pub invoice_records: i64,
    pub invoice_total: f64,
    pub exports: i64,
    pub months: Vec<MonthSummary>,
}

pub fn statistics(conn: &Connection) -> Result<Statistics> {
    let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };
    let checkin_records = count("SELECT count(*) FROM checkin_records")?;
    let invoice_records = count("SELECT count(*) FROM invoice_records")?;
    let exports = count("SELECT count(*) FROM export_history")?;
    let invoice_total: f64 =
        conn.query_row("SELECT COALESCE(SUM(amount), 0) FROM invoice_records", [], |r| r.get(0))?;

    let mut stmt = conn.prepare(
        "SELECT m.month_folder, \
                (SELECT count(*) FROM checkin_records c WHERE c.month_folder = m.month_folder), \
                (SELECT count(*) FROM invoice_records i WHERE i.month_folder = m.month_folder), \
                (SELECT COALESCE(SUM(amount), 0) FROM invoice_records i WHERE i.month_folder = m.month_folder) \
         FROM (SELECT month_folder FROM checkin_records UNION SELECT month_folder FROM invoice_records) m \
         ORDER BY m.month_folder DESC",
    )?;
    let months = stmt
        .query_map([], |row| {
            Ok(MonthSummary {
                month: row.get(0)?,
                checkin_days: row.get(1)?,
                invoices: row.get(2)?,
                invoice_total: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Statistics {
        checkin_records,
        invoice_records,
        invoice_total,
        exports,
        months,
    })
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Open database handle; also the duplicate ledger for reconciliation.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = get_connection(db_path)?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl InvoiceLedger for Store {
    fn exists(&self, date: NaiveDate, amount: f64, month: &ReimburseMonth) -> bool {
        invoice_exists(&self.conn, date, amount, month).unwrap_or_else(|e| {
            warn!(error = %e, "Ledger lookup failed, treating invoice as new");
            false
        })
    }
}
