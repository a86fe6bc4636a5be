pub mod fields;
pub mod location;

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::models::{DateSource, InvoiceType, LocationSource, ReceiptDetails, ReceiptRecord};
use crate::pdf::{load_content, PdfTextSource, TextTable};
use crate::retry::{retry, RetryPolicy, Sleeper};
use crate::settings::{LocationPlaceholder, PdfExtraction};

use self::fields::*;
use self::location::resolve_taxi_locations;

/// Extracted receipt content plus the file name it came from.
#[derive(Debug, Clone, Default)]
pub struct ReceiptSource {
    pub text: String,
    pub tables: Vec<TextTable>,
    pub file_name: String,
}

/// Turn extracted text into a receipt record. Never fails: missing fields
/// come back as their documented defaults.
pub fn extract_receipt(
    source: &ReceiptSource,
    invoice_type: InvoiceType,
    placeholder: Option<&LocationPlaceholder>,
    today: NaiveDate,
) -> ReceiptRecord {
    let text = source.text.as_str();
    let amount = extract_amount(text, invoice_type);
    let (date, date_source) =
        extract_date(text, &source.file_name, invoice_type).unwrap_or((today, DateSource::Fallback));
    let company = extract_company(text, &source.file_name);

    let mut start_location = String::new();
    let mut end_location = String::new();
    let mut location_source = LocationSource::Missing;

    let details = match invoice_type {
        InvoiceType::Taxi => {
            let trip = resolve_taxi_locations(text, &source.tables, placeholder);
            start_location = trip.start;
            end_location = trip.end;
            location_source = trip.source;
            ReceiptDetails::Taxi
        }
        InvoiceType::Meal => ReceiptDetails::Meal {
            items: extract_meal_items(text, &source.tables),
        },
        InvoiceType::Transport => {
            let (start, end) = extract_transport_locations(text);
            if !start.is_empty() {
                location_source = LocationSource::Labeled;
            }
            start_location = start;
            end_location = end;
            ReceiptDetails::Transport
        }
        InvoiceType::Accommodation => ReceiptDetails::Accommodation {
            days: extract_accommodation_days(text),
            location: extract_accommodation_location(text),
        },
        InvoiceType::Entertainment => ReceiptDetails::Entertainment {
            purpose: extract_entertainment_purpose(text),
        },
        InvoiceType::Other => ReceiptDetails::Other {
            purpose: extract_other_purpose(text),
        },
    };

    if amount == 0.0 {
        warn!(file = %source.file_name, "No plausible amount found");
    }
    if date_source == DateSource::Fallback {
        warn!(file = %source.file_name, %date, "No date found, using today");
    }

    ReceiptRecord {
        invoice_type,
        amount,
        date: Some(date),
        date_source,
        company,
        start_location,
        end_location,
        location_source,
        details,
        source_file: source.file_name.clone(),
    }
}

/// Read a receipt PDF, retrying transient read failures, and extract it.
/// Returns `None` once every attempt has failed.
pub fn extract_receipt_file(
    reader: &dyn PdfTextSource,
    sleeper: &dyn Sleeper,
    path: &Path,
    invoice_type: InvoiceType,
    settings: &PdfExtraction,
    today: NaiveDate,
) -> Option<ReceiptRecord> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let policy = RetryPolicy::new(
        settings.retry_attempts,
        Duration::from_millis(settings.retry_delay_ms),
    );

    let content = match retry(&policy, sleeper, |_| load_content(reader, path, settings)) {
        Ok(content) => content,
        Err(e) => {
            warn!(file = %file_name, error = %e, "Giving up on receipt");
            return None;
        }
    };
    debug!(file = %file_name, tables = content.tables.len(), "Receipt loaded");

    let source = ReceiptSource {
        text: content.text,
        tables: content.tables,
        file_name,
    };
    Some(extract_receipt(
        &source,
        invoice_type,
        settings.location_placeholder.as_ref(),
        today,
    ))
}
