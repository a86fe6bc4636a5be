use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{ReimburseError, Result};
use crate::models::InvoiceType;

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|rd| rd.flatten().map(|e| e.path()).collect())
        .unwrap_or_default();
    entries.sort();
    entries
}

/// Month folders directly under `base` and one level further down whose
/// names start with a `pattern` match.
pub fn find_month_folders(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let re = Regex::new(&format!("^(?:{pattern})"))
        .map_err(|e| ReimburseError::Config(format!("month_folder_pattern: {e}")))?;
    if !base.is_dir() {
        return Err(ReimburseError::MonthFolder(format!(
            "{} is not a directory",
            base.display()
        )));
    }

    let mut found = Vec::new();
    for child in sorted_entries(base).into_iter().filter(|p| p.is_dir()) {
        if re.is_match(&file_name(&child)) {
            found.push(child.clone());
        }
        found.extend(
            sorted_entries(&child)
                .into_iter()
                .filter(|p| p.is_dir() && re.is_match(&file_name(p))),
        );
    }
    Ok(found)
}

/// First spreadsheet in `folder` whose name contains `pattern`.
pub fn find_checkin_file(folder: &Path, pattern: &str) -> Option<PathBuf> {
    sorted_entries(folder)
        .into_iter()
        .find(|p| p.is_file() && has_extension(p, &["xlsx", "xls"]) && file_name(p).contains(pattern))
}

fn collect_pdfs(dir: &Path, out: &mut Vec<PathBuf>) {
    for path in sorted_entries(dir) {
        if path.is_dir() {
            collect_pdfs(&path, out);
        } else if has_extension(&path, &["pdf"]) {
            out.push(path);
        }
    }
}

/// Receipt PDFs under `folder` (recursive, sorted). Taxi receipts are the
/// trip itineraries (`行程单`); the matching tax invoices (`发票`) are skipped.
pub fn find_receipt_files(folder: &Path, type_pattern: &str, invoice_type: InvoiceType) -> Vec<PathBuf> {
    let mut pdfs = Vec::new();
    collect_pdfs(folder, &mut pdfs);
    pdfs.retain(|p| {
        let name = file_name(p);
        if invoice_type == InvoiceType::Taxi && (name.contains("发票") || !name.contains("行程单")) {
            return false;
        }
        name.contains(type_pattern)
    });
    pdfs
}

// ---------------------------------------------------------------------------
// Itinerary / invoice pairing
// ---------------------------------------------------------------------------

const ITINERARY_WORD: &str = "行程单";
const INVOICE_WORD: &str = "发票";

/// Sibling PDF whose name is `path`'s stem with `from` swapped for `to`.
fn sibling_with(path: &Path, from: &str, to: &str) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    if !stem.contains(from) {
        return None;
    }
    let dir = path.parent()?;
    let wanted = stem.replace(from, to);
    ["pdf", "PDF"]
        .iter()
        .map(|ext| dir.join(format!("{wanted}.{ext}")))
        .find(|p| p.is_file())
}

/// Tax invoice filed next to a trip itinerary (`…行程单.pdf` → `…发票.pdf`).
pub fn find_matching_invoice(itinerary: &Path) -> Option<PathBuf> {
    sibling_with(itinerary, ITINERARY_WORD, INVOICE_WORD)
}

/// Trip itinerary filed next to a tax invoice (`…发票.pdf` → `…行程单.pdf`).
pub fn find_matching_itinerary(invoice: &Path) -> Option<PathBuf> {
    sibling_with(invoice, INVOICE_WORD, ITINERARY_WORD)
}

/// Taxi files under a folder that are missing their other half.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaxiPairing {
    pub without_invoice: Vec<PathBuf>,
    pub without_itinerary: Vec<PathBuf>,
}

impl TaxiPairing {
    pub fn is_complete(&self) -> bool {
        self.without_invoice.is_empty() && self.without_itinerary.is_empty()
    }
}

/// Check every itinerary for its invoice and every taxi invoice for its
/// itinerary. Only the itineraries are read as receipts.
pub fn pair_taxi_files(folder: &Path, itineraries: &[PathBuf]) -> TaxiPairing {
    let without_invoice = itineraries
        .iter()
        .filter(|p| find_matching_invoice(p).is_none())
        .cloned()
        .collect();

    let mut pdfs = Vec::new();
    collect_pdfs(folder, &mut pdfs);
    let without_itinerary = pdfs
        .into_iter()
        .filter(|p| {
            let name = file_name(p);
            name.contains(INVOICE_WORD) && !name.contains(ITINERARY_WORD)
        })
        .filter(|p| find_matching_itinerary(p).is_none())
        .collect();

    TaxiPairing {
        without_invoice,
        without_itinerary,
    }
}
