use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{error, info, info_span, warn};

use crate::attendance::parse_attendance_file;
use crate::db::{self, Store, RULES_KEY};
use crate::error::{ReimburseError, Result};
use crate::models::{InvoiceType, ReceiptRecord, ReimbursementRule, WorkDayRecord};
use crate::pdf::PdfTextSource;
use crate::period::ReimburseMonth;
use crate::receipt::extract_receipt_file;
use crate::reconciler::{InvoiceLedger, NoLedger, ReconcileReport, Reconciler};
use crate::reports::{write_reports, NightMealReport, TaxiReport, WrittenReport};
use crate::retry::Sleeper;
use crate::scan::{find_checkin_file, find_month_folders, find_receipt_files, pair_taxi_files, TaxiPairing};
use crate::settings::{load_config, Config, RuleSettings};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Configuration snapshot for one run. Nothing mutates it in place;
/// `reload` swaps the whole value.
pub struct Session {
    config: Config,
    config_path: Option<PathBuf>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            config_path: None,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        let mut session = Self::new(load_config(path));
        session.config_path = Some(path.to_path_buf());
        session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rule(&self) -> ReimbursementRule {
        self.config.reimburse_rules.snapshot()
    }

    /// Re-read the config file strictly; the old snapshot stays on error.
    pub fn reload(&mut self) -> Result<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or_else(|| ReimburseError::Config("session has no config file".to_string()))?;
        self.config = Config::load(path)?;
        info!(path = %path.display(), "Config reloaded");
        Ok(())
    }

    /// Overlay rule overrides saved in the store.
    pub fn apply_store_overrides(&mut self, store: &Store) -> Result<()> {
        let Some(value) = db::get_config(store.conn(), RULES_KEY)? else {
            return Ok(());
        };
        match serde_json::from_value::<RuleSettings>(value) {
            Ok(rules) => {
                let mut config = self.config.clone();
                config.reimburse_rules = rules;
                self.config = config;
            }
            Err(e) => warn!(error = %e, "Ignoring malformed stored rules"),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Month processing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    /// Skip report files and all database writes.
    pub dry_run: bool,
    /// Substituted for receipts with no readable date.
    pub today: NaiveDate,
}

#[derive(Debug)]
pub struct MonthOutcome {
    pub month: ReimburseMonth,
    pub folder: PathBuf,
    pub workdays: Vec<WorkDayRecord>,
    pub skipped_rows: usize,
    pub receipts_failed: usize,
    pub receipts_dropped: usize,
    pub pairing: TaxiPairing,
    pub reconcile: ReconcileReport,
    pub meal: NightMealReport,
    pub taxi: TaxiReport,
    pub written: Vec<WrittenReport>,
}

/// Drop receipts with no amount and order the rest by date. The sort is
/// stable, so same-day receipts keep their file order.
pub fn prepare_receipts(receipts: Vec<ReceiptRecord>) -> (Vec<ReceiptRecord>, usize) {
    let before = receipts.len();
    let mut kept: Vec<ReceiptRecord> = receipts.into_iter().filter(|r| r.amount > 0.0).collect();
    kept.sort_by_key(|r| r.date);
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Reconcile and build both report tables. No I/O.
pub fn assemble(
    rule: &ReimbursementRule,
    reconciler: &Reconciler,
    workdays: &[WorkDayRecord],
    receipts: &[ReceiptRecord],
    ledger: &dyn InvoiceLedger,
) -> (ReconcileReport, NightMealReport, TaxiReport) {
    let report = reconciler.reconcile(workdays, receipts, ledger);
    let meal = NightMealReport::build(workdays, rule);
    let taxi = TaxiReport::build(
        report
            .valid()
            .filter(|r| r.receipt.invoice_type == InvoiceType::Taxi),
    );
    (report, meal, taxi)
}

pub struct Pipeline<'a> {
    pub session: &'a Session,
    pub reader: &'a dyn PdfTextSource,
    pub sleeper: &'a dyn Sleeper,
    pub store: Option<&'a Store>,
}

impl<'a> Pipeline<'a> {
    fn read_receipts(&self, folder: &Path, today: NaiveDate) -> (Vec<ReceiptRecord>, usize, TaxiPairing) {
        let cfg = self.session.config();
        let invoice_dir = folder.join(&cfg.file_paths.invoice_folder_name);
        if !invoice_dir.is_dir() {
            warn!(dir = %invoice_dir.display(), "Invoice folder not found");
            return (Vec::new(), 0, TaxiPairing::default());
        }
        let files = find_receipt_files(&invoice_dir, &cfg.file_paths.taxi_invoice_pattern, InvoiceType::Taxi);
        info!(count = files.len(), "Receipt files found");

        let pairing = pair_taxi_files(&invoice_dir, &files);
        for path in &pairing.without_invoice {
            warn!(file = %path.display(), "Itinerary has no matching invoice");
        }
        for path in &pairing.without_itinerary {
            warn!(file = %path.display(), "Invoice has no matching itinerary, not claimed");
        }

        let mut receipts = Vec::with_capacity(files.len());
        let mut failed = 0;
        for path in files {
            let _span = info_span!("receipt", file = %path.display()).entered();
            match extract_receipt_file(
                self.reader,
                self.sleeper,
                &path,
                InvoiceType::Taxi,
                &cfg.pdf_extraction,
                today,
            ) {
                Some(receipt) => receipts.push(receipt),
                None => failed += 1,
            }
        }
        (receipts, failed, pairing)
    }

    pub fn process_month(&self, folder: &Path, opts: &ProcessOptions) -> Result<MonthOutcome> {
        let cfg = self.session.config();
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let month: ReimburseMonth = name.parse()?;
        let _span = info_span!("month", %month).entered();

        let checkin = find_checkin_file(folder, &cfg.file_paths.checkin_file_pattern).ok_or_else(|| {
            ReimburseError::Spreadsheet(format!("未找到打卡文件: {}", folder.display()))
        })?;
        info!(file = %checkin.display(), "Attendance file found");

        let parsed = parse_attendance_file(&checkin, &cfg.excel_settings, &cfg.date_formats);
        if parsed.records.is_empty() {
            let reason = parsed.error.unwrap_or_else(|| "没有有效的工作时长数据".to_string());
            return Err(ReimburseError::Spreadsheet(format!("{}: {reason}", checkin.display())));
        }

        let (receipts, receipts_failed, pairing) = self.read_receipts(folder, opts.today);
        let (receipts, receipts_dropped) = prepare_receipts(receipts);
        if receipts_dropped > 0 {
            warn!(count = receipts_dropped, "Receipts without an amount dropped");
        }

        let rule = self.session.rule();
        let reconciler = Reconciler::new(month, rule, cfg.reconciliation.match_mode);
        let ledger: &dyn InvoiceLedger = match self.store {
            Some(store) => store,
            None => &NoLedger,
        };
        let (reconcile, meal, taxi) = assemble(&rule, &reconciler, &parsed.records, &receipts, ledger);

        let mut written = Vec::new();
        if opts.dry_run {
            info!("Dry run, nothing written");
        } else {
            let report_dir = folder.join(&cfg.file_paths.report_folder_name);
            written = write_reports(&report_dir, &cfg.output, &month, &meal, &taxi)?;
            if let Some(store) = self.store {
                self.persist(store, &month, &checkin, &parsed.records, &reconcile, &written)?;
            }
        }

        Ok(MonthOutcome {
            month,
            folder: folder.to_path_buf(),
            workdays: parsed.records,
            skipped_rows: parsed.skipped_rows,
            receipts_failed,
            receipts_dropped,
            pairing,
            reconcile,
            meal,
            taxi,
            written,
        })
    }

    fn persist(
        &self,
        store: &Store,
        month: &ReimburseMonth,
        checkin: &Path,
        workdays: &[WorkDayRecord],
        reconcile: &ReconcileReport,
        written: &[WrittenReport],
    ) -> Result<()> {
        let conn = store.conn();
        let checksum = db::compute_checksum(checkin)?;
        let source = checkin.file_name().and_then(|n| n.to_str()).unwrap_or("");
        db::save_checkin_records(conn, workdays, month, source)?;
        if !db::import_exists(conn, &checksum, month)? {
            db::record_import(conn, checkin, month, "attendance", workdays.len(), &checksum)?;
        }

        let valid: Vec<ReceiptRecord> = reconcile.valid().map(|r| r.receipt.clone()).collect();
        let saved = db::save_invoice_records(conn, &valid, month)?;

        for report in written {
            db::save_export_history(conn, month, report.kind, &report.path, report.rows, report.total)?;
        }
        info!(checkins = workdays.len(), invoices = saved, "Month persisted");
        Ok(())
    }

    /// Process one named month folder under `base`, or every month folder
    /// found there. A failing month is logged and skipped unless it was
    /// named explicitly.
    pub fn process(&self, base: &Path, month: Option<&str>, opts: &ProcessOptions) -> Result<Vec<MonthOutcome>> {
        if let Some(name) = month {
            let folder = base.join(name);
            if !folder.is_dir() {
                return Err(ReimburseError::MonthFolder(folder.display().to_string()));
            }
            return Ok(vec![self.process_month(&folder, opts)?]);
        }

        let pattern = &self.session.config().file_paths.month_folder_pattern;
        let folders = find_month_folders(base, pattern)?;
        if folders.is_empty() {
            warn!(%pattern, base = %base.display(), "No month folders found");
        } else {
            info!(count = folders.len(), "Month folders found");
        }

        let mut outcomes = Vec::new();
        for folder in folders {
            match self.process_month(&folder, opts) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(folder = %folder.display(), error = %e, "Month failed, skipping"),
            }
        }
        Ok(outcomes)
    }
}
