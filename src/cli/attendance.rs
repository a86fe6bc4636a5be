use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::attendance::parse_attendance_file;
use crate::cli::open_session;
use crate::dates::weekday_name;
use crate::eligibility::meal_allowance;
use crate::error::{ReimburseError, Result};
use crate::fmt::{hours, money};

pub fn run(config_path: &Path, file: &Path) -> Result<()> {
    let (session, _store) = open_session(config_path)?;
    let cfg = session.config();
    let rule = session.rule();

    let parsed = parse_attendance_file(file, &cfg.excel_settings, &cfg.date_formats);
    if let Some(message) = parsed.error {
        return Err(ReimburseError::Spreadsheet(message));
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Weekday", "Hours", "Dinner", "Night"]);
    let (mut dinner_total, mut night_total) = (0.0, 0.0);
    for day in &parsed.records {
        let (dinner, night) = meal_allowance(day.work_hours, &rule);
        dinner_total += dinner;
        night_total += night;
        table.add_row(vec![
            Cell::new(day.date),
            Cell::new(weekday_name(day.date)),
            Cell::new(hours(day.work_hours)),
            Cell::new(if dinner > 0.0 { money(dinner) } else { String::new() }),
            Cell::new(if night > 0.0 { money(night) } else { String::new() }),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(""),
        Cell::new(""),
        Cell::new(money(dinner_total).bold()),
        Cell::new(money(night_total).bold()),
    ]);
    println!("Attendance\n{table}");
    println!("{} days, {} rows skipped", parsed.records.len(), parsed.skipped_rows);
    Ok(())
}
