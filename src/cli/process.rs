use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{open_session, today};
use crate::error::Result;
use crate::fmt::money;
use crate::models::{DateSource, Verdict};
use crate::pdf::default_source;
use crate::pipeline::{MonthOutcome, Pipeline, ProcessOptions, Session};
use crate::retry::ThreadSleeper;

pub fn run(config_path: &Path, base: &Path, month: Option<&str>, dry_run: bool, no_db: bool) -> Result<()> {
    let opts = ProcessOptions {
        dry_run,
        today: today(),
    };
    let reader = default_source();

    let outcomes = if no_db {
        let session = Session::from_path(config_path);
        let pipeline = Pipeline {
            session: &session,
            reader: reader.as_ref(),
            sleeper: &ThreadSleeper,
            store: None,
        };
        pipeline.process(base, month, &opts)?
    } else {
        let (session, store) = open_session(config_path)?;
        let pipeline = Pipeline {
            session: &session,
            reader: reader.as_ref(),
            sleeper: &ThreadSleeper,
            store: Some(&store),
        };
        pipeline.process(base, month, &opts)?
    };

    if outcomes.is_empty() {
        println!("No months processed.");
        return Ok(());
    }
    print_summary(&outcomes);
    for outcome in &outcomes {
        print_problems(outcome);
    }
    Ok(())
}

fn print_summary(outcomes: &[MonthOutcome]) {
    let mut table = Table::new();
    table.set_header(vec!["Month", "Days", "Dinner", "Night", "Taxi", "Valid", "Invalid", "Dup", "Total"]);
    for o in outcomes {
        let taxi_total = o.taxi.total;
        table.add_row(vec![
            Cell::new(o.month),
            Cell::new(o.workdays.len()),
            Cell::new(money(o.meal.total_dinner)),
            Cell::new(money(o.meal.total_night)),
            Cell::new(money(taxi_total)),
            Cell::new(format!(
                "{} ({})",
                o.reconcile.valid().count(),
                money(o.reconcile.valid_total())
            )),
            Cell::new(o.reconcile.invalid().count()),
            Cell::new(o.reconcile.duplicates().count()),
            Cell::new(money(o.meal.grand_total() + taxi_total).bold()),
        ]);
    }
    println!("Reimbursement\n{table}");

    for o in outcomes {
        if o.written.is_empty() {
            println!("{}: no reports written in {}", o.month, o.folder.display());
        }
        for report in &o.written {
            println!("Wrote {}", report.path.display());
        }
    }
}

fn print_problems(outcome: &MonthOutcome) {
    let month = outcome.month;
    if outcome.skipped_rows > 0 {
        println!("{month}: {} attendance rows skipped", outcome.skipped_rows);
    }
    if outcome.receipts_failed > 0 {
        println!(
            "{}",
            format!("{month}: {} receipt files could not be read", outcome.receipts_failed).red()
        );
    }
    if outcome.receipts_dropped > 0 {
        println!("{month}: {} receipts had no amount", outcome.receipts_dropped);
    }
    if !outcome.pairing.is_complete() {
        for path in &outcome.pairing.without_invoice {
            println!("{}", format!("{month}: {} has no matching invoice", path.display()).yellow());
        }
        for path in &outcome.pairing.without_itinerary {
            println!("{}", format!("{month}: {} has no itinerary, not claimed", path.display()).yellow());
        }
    }

    for r in &outcome.reconcile.records {
        let line = match r.verdict {
            Verdict::Valid => {
                let mut notes = Vec::new();
                if !r.receipt.location_source.is_verified() {
                    notes.push("locations unverified");
                }
                if r.receipt.date_source == DateSource::Fallback {
                    notes.push("date guessed");
                }
                if notes.is_empty() {
                    continue;
                }
                format!("{month}: {} valid, {}", r.receipt.source_file, notes.join(", ")).yellow()
            }
            Verdict::Invalid(_) => format!("{month}: {} {}", r.receipt.source_file, r.reason).yellow(),
            Verdict::Duplicate => format!("{month}: {} {}", r.receipt.source_file, r.reason).dimmed(),
        };
        println!("{line}");
    }
}
