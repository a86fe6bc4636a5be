use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::today;
use crate::error::{ReimburseError, Result};
use crate::fmt::money;
use crate::models::{DateSource, InvoiceType, ReceiptDetails};
use crate::pdf::default_source;
use crate::pipeline::Session;
use crate::receipt::extract_receipt_file;
use crate::retry::ThreadSleeper;

pub fn run(config_path: &Path, file: &Path, invoice_type: &str) -> Result<()> {
    let invoice_type = InvoiceType::from_key(invoice_type)
        .ok_or_else(|| ReimburseError::Other(format!("Unknown receipt type: {invoice_type}")))?;
    let session = Session::from_path(config_path);
    let settings = &session.config().pdf_extraction;

    let reader = default_source();
    let receipt = extract_receipt_file(reader.as_ref(), &ThreadSleeper, file, invoice_type, settings, today())
        .ok_or_else(|| {
            ReimburseError::Pdf(format!(
                "{}: unreadable after {} attempts",
                file.display(),
                settings.retry_attempts.max(1)
            ))
        })?;

    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec![Cell::new("Type"), Cell::new(receipt.invoice_type.key())]);
    let amount = if receipt.amount > 0.0 {
        money(receipt.amount)
    } else {
        "not found".red().to_string()
    };
    table.add_row(vec![Cell::new("Amount"), Cell::new(amount)]);

    let date = receipt.date.map(|d| d.to_string()).unwrap_or_default();
    let date = if receipt.date_source == DateSource::Fallback {
        format!("{date} (guessed)").yellow().to_string()
    } else {
        date
    };
    table.add_row(vec![Cell::new("Date"), Cell::new(date)]);
    table.add_row(vec![Cell::new("Company"), Cell::new(&receipt.company)]);

    if matches!(receipt.invoice_type, InvoiceType::Taxi | InvoiceType::Transport) {
        let route = format!("{} -> {}", receipt.start_location, receipt.end_location);
        let route = if receipt.location_source.is_verified() {
            route
        } else {
            format!("{route} ({:?})", receipt.location_source).yellow().to_string()
        };
        table.add_row(vec![Cell::new("Route"), Cell::new(route)]);
    }
    match &receipt.details {
        ReceiptDetails::Meal { items } => {
            table.add_row(vec![Cell::new("Items"), Cell::new(items)]);
        }
        ReceiptDetails::Accommodation { days, location } => {
            table.add_row(vec![Cell::new("Nights"), Cell::new(days)]);
            table.add_row(vec![Cell::new("Address"), Cell::new(location)]);
        }
        ReceiptDetails::Entertainment { purpose } | ReceiptDetails::Other { purpose } => {
            table.add_row(vec![Cell::new("Purpose"), Cell::new(purpose)]);
        }
        ReceiptDetails::Taxi | ReceiptDetails::Transport => {}
    }
    println!("{}\n{table}", receipt.source_file);
    Ok(())
}
