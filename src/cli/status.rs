use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};
use rusqlite::Connection;

use crate::db::{get_connection, load_checkin_records, load_invoices, statistics};
use crate::error::Result;
use crate::fmt::{hours, money};
use crate::period::ReimburseMonth;
use crate::settings::load_config;

pub fn run(config_path: &Path, month: Option<&str>) -> Result<()> {
    let month: Option<ReimburseMonth> = month.map(str::parse).transpose()?;
    let config = load_config(config_path);
    let db_path = config.db_path();

    let config_note = if config_path.exists() { "" } else { " (not found, using defaults)" };
    println!("Config:     {}{config_note}", config_path.display());
    println!("Database:   {}", db_path.display());
    println!("Match mode: {:?}", config.reconciliation.match_mode);

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `reimburse init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    match month {
        Some(m) => month_detail(&conn, &m),
        None => summary(&conn),
    }
}

fn summary(conn: &Connection) -> Result<()> {
    let stats = statistics(conn)?;
    println!();
    println!("Attendance days:  {}", stats.checkin_records);
    println!("Invoices:         {}", stats.invoice_records);
    println!("Invoice total:    {}", money(stats.invoice_total));
    println!("Reports written:  {}", stats.exports);

    if !stats.months.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Month", "Days", "Invoices", "Total"]);
        for m in &stats.months {
            table.add_row(vec![
                Cell::new(&m.month),
                Cell::new(m.checkin_days),
                Cell::new(m.invoices),
                Cell::new(money(m.invoice_total)),
            ]);
        }
        println!("\n{table}");
    }
    Ok(())
}

fn month_detail(conn: &Connection, month: &ReimburseMonth) -> Result<()> {
    let days = load_checkin_records(conn, month)?;
    let invoices = load_invoices(conn, month)?;
    let (start, end) = month.expense_window();
    println!();
    println!("{month}: expenses from {start} to {end}");
    println!(
        "{} attendance days, {} over 0 hours",
        days.len(),
        days.iter().filter(|d| d.work_hours > 0.0).count()
    );

    let mut table = Table::new();
    table.set_header(vec!["Date", "Type", "Amount", "Route", "Hours", "File"]);
    for inv in &invoices {
        let date = inv
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "bad date".red().to_string());
        let worked = inv
            .date
            .and_then(|d| days.iter().find(|w| w.date == d))
            .map(|w| hours(w.work_hours))
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(date),
            Cell::new(inv.invoice_type.key()),
            Cell::new(money(inv.amount)),
            Cell::new(format!("{} -> {}", inv.start_location, inv.end_location)),
            Cell::new(worked),
            Cell::new(&inv.source_file),
        ]);
    }
    println!("Stored invoices\n{table}");
    Ok(())
}
