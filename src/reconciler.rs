use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::eligibility::{evaluate, ReimburseKind};
use crate::models::{
    InvoiceType, ReceiptRecord, ReconciledRecord, ReimbursementRule, RejectReason, Verdict,
    WorkDayRecord,
};
use crate::period::ReimburseMonth;
use crate::settings::MatchMode;

/// Previously accepted invoices, consulted for duplicates.
pub trait InvoiceLedger {
    fn exists(&self, date: NaiveDate, amount: f64, month: &ReimburseMonth) -> bool;
}

/// Ledger with nothing in it, for dry runs.
pub struct NoLedger;

impl InvoiceLedger for NoLedger {
    fn exists(&self, _date: NaiveDate, _amount: f64, _month: &ReimburseMonth) -> bool {
        false
    }
}

pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub records: Vec<ReconciledRecord>,
}

impl ReconcileReport {
    pub fn valid(&self) -> impl Iterator<Item = &ReconciledRecord> {
        self.records.iter().filter(|r| r.is_valid())
    }

    pub fn invalid(&self) -> impl Iterator<Item = &ReconciledRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.verdict, Verdict::Invalid(_)))
    }

    pub fn duplicates(&self) -> impl Iterator<Item = &ReconciledRecord> {
        self.records.iter().filter(|r| r.verdict == Verdict::Duplicate)
    }

    pub fn valid_total(&self) -> f64 {
        self.valid().map(|r| r.eligible_amount).sum()
    }
}

pub struct Reconciler {
    month: ReimburseMonth,
    rule: ReimbursementRule,
    mode: MatchMode,
}

impl Reconciler {
    pub fn new(month: ReimburseMonth, rule: ReimbursementRule, mode: MatchMode) -> Self {
        Self { month, rule, mode }
    }

    fn match_work_day<'a>(&self, date: NaiveDate, workdays: &'a [WorkDayRecord]) -> Option<&'a WorkDayRecord> {
        match self.mode {
            MatchMode::Exact => workdays.iter().find(|w| w.date == date),
            MatchMode::Tolerant => workdays
                .iter()
                .map(|w| ((w.date - date).num_days().abs(), w))
                .filter(|(delta, _)| *delta < 2)
                .min_by_key(|(delta, _)| *delta)
                .map(|(_, w)| w),
        }
    }

    /// Give every receipt exactly one verdict. Receipts are handled in
    /// order, so the first of two identical (date, amount) receipts wins.
    pub fn reconcile(
        &self,
        workdays: &[WorkDayRecord],
        receipts: &[ReceiptRecord],
        ledger: &dyn InvoiceLedger,
    ) -> ReconcileReport {
        let mut accepted: HashSet<(NaiveDate, i64)> = HashSet::new();
        let mut records = Vec::with_capacity(receipts.len());

        for receipt in receipts {
            let record = self.judge(receipt, workdays, ledger, &mut accepted);
            debug!(file = %receipt.source_file, verdict = ?record.verdict, "Receipt judged");
            records.push(record);
        }

        let report = ReconcileReport { records };
        info!(
            month = %self.month,
            valid = report.valid().count(),
            invalid = report.invalid().count(),
            duplicates = report.duplicates().count(),
            "Reconciliation finished"
        );
        report
    }

    fn judge(
        &self,
        receipt: &ReceiptRecord,
        workdays: &[WorkDayRecord],
        ledger: &dyn InvoiceLedger,
        accepted: &mut HashSet<(NaiveDate, i64)>,
    ) -> ReconciledRecord {
        let reject = |reason: RejectReason, work_day: Option<&WorkDayRecord>, detail: Option<String>| {
            ReconciledRecord {
                receipt: receipt.clone(),
                work_day: work_day.cloned(),
                verdict: Verdict::Invalid(reason),
                work_hours: work_day.map(|w| w.work_hours),
                eligible_amount: 0.0,
                reason: detail.unwrap_or_else(|| reason.label().to_string()),
            }
        };

        if receipt.amount <= 0.0 {
            return reject(RejectReason::NoAmount, None, None);
        }
        let Some(date) = receipt.date else {
            return reject(RejectReason::DateFormat, None, None);
        };
        if !self.month.contains_expense(date) {
            return reject(RejectReason::OutOfWindow, None, None);
        }

        let work_day = self.match_work_day(date, workdays);
        let mut reason = String::new();
        if receipt.invoice_type == InvoiceType::Taxi {
            let Some(day) = work_day else {
                return reject(RejectReason::NoAttendance, None, None);
            };
            let verdict = evaluate(ReimburseKind::Taxi, day.work_hours, &self.rule);
            if !verdict.eligible {
                let detail = format!("{}（{}）", RejectReason::BelowThreshold.label(), verdict.reason);
                return reject(RejectReason::BelowThreshold, Some(day), Some(detail));
            }
            reason = verdict.reason;
        }

        let key = (date, to_cents(receipt.amount));
        if accepted.contains(&key) || ledger.exists(date, receipt.amount, &self.month) {
            return ReconciledRecord {
                receipt: receipt.clone(),
                work_day: work_day.cloned(),
                verdict: Verdict::Duplicate,
                work_hours: work_day.map(|w| w.work_hours),
                eligible_amount: 0.0,
                reason: "重复发票".to_string(),
            };
        }
        accepted.insert(key);

        ReconciledRecord {
            receipt: receipt.clone(),
            work_day: work_day.cloned(),
            verdict: Verdict::Valid,
            work_hours: work_day.map(|w| w.work_hours),
            eligible_amount: receipt.amount,
            reason: if reason.is_empty() { "有效".to_string() } else { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateSource, LocationSource, ReceiptDetails};
    use std::cell::RefCell;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn may() -> ReimburseMonth {
        "25_05".parse().unwrap()
    }

    fn taxi(date: Option<NaiveDate>, amount: f64, file: &str) -> ReceiptRecord {
        ReceiptRecord {
            invoice_type: InvoiceType::Taxi,
            amount,
            date,
            date_source: DateSource::Body,
            company: "高德".to_string(),
            start_location: "A".to_string(),
            end_location: "B".to_string(),
            location_source: LocationSource::Labeled,
            details: ReceiptDetails::Taxi,
            source_file: file.to_string(),
        }
    }

    fn day(date: NaiveDate, hours: f64) -> WorkDayRecord {
        WorkDayRecord { date, work_hours: hours }
    }

    fn reconciler(mode: MatchMode) -> Reconciler {
        Reconciler::new(may(), ReimbursementRule::default(), mode)
    }

    #[derive(Default)]
    struct SeenLedger {
        seen: Vec<(NaiveDate, i64)>,
        calls: RefCell<u32>,
    }

    impl InvoiceLedger for SeenLedger {
        fn exists(&self, date: NaiveDate, amount: f64, _month: &ReimburseMonth) -> bool {
            *self.calls.borrow_mut() += 1;
            self.seen.contains(&(date, to_cents(amount)))
        }
    }

    #[test]
    fn test_end_to_end_valid_taxi() {
        let workdays = vec![day(d(2025, 4, 10), 13.0)];
        let receipts = vec![taxi(Some(d(2025, 4, 10)), 35.0, "a.pdf")];
        let report = reconciler(MatchMode::Exact).reconcile(&workdays, &receipts, &NoLedger);
        let valid: Vec<_> = report.valid().collect();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].work_hours, Some(13.0));
        assert_eq!(valid[0].eligible_amount, 35.0);
        assert_eq!(report.valid_total(), 35.0);
    }

    #[test]
    fn test_second_identical_receipt_is_duplicate() {
        let workdays = vec![day(d(2025, 4, 10), 13.0)];
        let receipts = vec![
            taxi(Some(d(2025, 4, 10)), 35.0, "a.pdf"),
            taxi(Some(d(2025, 4, 10)), 35.0, "b.pdf"),
        ];
        let report = reconciler(MatchMode::Exact).reconcile(&workdays, &receipts, &NoLedger);
        assert_eq!(report.records[0].verdict, Verdict::Valid);
        assert_eq!(report.records[1].verdict, Verdict::Duplicate);
        assert_eq!(report.duplicates().count(), 1);
    }

    #[test]
    fn test_ledger_hit_is_duplicate() {
        let ledger = SeenLedger {
            seen: vec![(d(2025, 4, 10), 3500)],
            ..SeenLedger::default()
        };
        let workdays = vec![day(d(2025, 4, 10), 13.0)];
        let receipts = vec![taxi(Some(d(2025, 4, 10)), 35.0, "a.pdf")];
        let report = reconciler(MatchMode::Exact).reconcile(&workdays, &receipts, &ledger);
        assert_eq!(report.records[0].verdict, Verdict::Duplicate);
        assert_eq!(*ledger.calls.borrow(), 1);
    }

    #[test]
    fn test_rejections_in_order() {
        let workdays = vec![day(d(2025, 4, 10), 13.0), day(d(2025, 4, 11), 10.0)];
        let receipts = vec![
            taxi(Some(d(2025, 4, 10)), 0.0, "no_amount.pdf"),
            taxi(None, 35.0, "no_date.pdf"),
            taxi(Some(d(2025, 5, 2)), 35.0, "late.pdf"),
            taxi(Some(d(2025, 4, 12)), 35.0, "no_day.pdf"),
            taxi(Some(d(2025, 4, 11)), 35.0, "short_day.pdf"),
        ];
        let report = reconciler(MatchMode::Exact).reconcile(&workdays, &receipts, &NoLedger);
        let verdicts: Vec<_> = report.records.iter().map(|r| r.verdict).collect();
        assert_eq!(
            verdicts,
            vec![
                Verdict::Invalid(RejectReason::NoAmount),
                Verdict::Invalid(RejectReason::DateFormat),
                Verdict::Invalid(RejectReason::OutOfWindow),
                Verdict::Invalid(RejectReason::NoAttendance),
                Verdict::Invalid(RejectReason::BelowThreshold),
            ]
        );
        assert_eq!(report.invalid().count(), 5);
        assert_eq!(report.records[0].reason, "未识别到金额");
        assert!(report.records[4].reason.contains("未达到11小时阈值"));
        assert_eq!(report.records[4].work_hours, Some(10.0));
    }

    #[test]
    fn test_taxi_at_exact_threshold_is_rejected() {
        let workdays = vec![day(d(2025, 4, 10), 11.0)];
        let receipts = vec![taxi(Some(d(2025, 4, 10)), 35.0, "a.pdf")];
        let report = reconciler(MatchMode::Exact).reconcile(&workdays, &receipts, &NoLedger);
        assert_eq!(report.records[0].verdict, Verdict::Invalid(RejectReason::BelowThreshold));
    }

    #[test]
    fn test_rejected_receipt_does_not_block_later_duplicate_key() {
        // the first copy has no amount, so it never claims the key
        let workdays = vec![day(d(2025, 4, 30), 13.0)];
        let receipts = vec![
            taxi(Some(d(2025, 4, 30)), 0.0, "a.pdf"),
            taxi(Some(d(2025, 4, 30)), 42.0, "b.pdf"),
            taxi(Some(d(2025, 4, 30)), 42.0, "c.pdf"),
        ];
        let report = reconciler(MatchMode::Exact).reconcile(&workdays, &receipts, &NoLedger);
        assert_eq!(report.records[1].verdict, Verdict::Valid);
        assert_eq!(report.records[2].verdict, Verdict::Duplicate);
    }

    #[test]
    fn test_tolerant_mode_matches_neighbouring_day() {
        let workdays = vec![day(d(2025, 4, 9), 13.0)];
        let receipts = vec![taxi(Some(d(2025, 4, 10)), 35.0, "a.pdf")];

        let exact = reconciler(MatchMode::Exact).reconcile(&workdays, &receipts, &NoLedger);
        assert_eq!(exact.records[0].verdict, Verdict::Invalid(RejectReason::NoAttendance));

        let tolerant = reconciler(MatchMode::Tolerant).reconcile(&workdays, &receipts, &NoLedger);
        assert_eq!(tolerant.records[0].verdict, Verdict::Valid);
        assert_eq!(tolerant.records[0].work_day, Some(workdays[0].clone()));
    }

    #[test]
    fn test_tolerant_mode_prefers_closest_day() {
        let workdays = vec![day(d(2025, 4, 9), 10.0), day(d(2025, 4, 10), 13.0)];
        let receipts = vec![taxi(Some(d(2025, 4, 10)), 35.0, "a.pdf")];
        let report = reconciler(MatchMode::Tolerant).reconcile(&workdays, &receipts, &NoLedger);
        assert_eq!(report.records[0].work_hours, Some(13.0));

        let far = vec![day(d(2025, 4, 8), 13.0)];
        let report = reconciler(MatchMode::Tolerant).reconcile(&far, &receipts, &NoLedger);
        assert_eq!(report.records[0].verdict, Verdict::Invalid(RejectReason::NoAttendance));
    }

    #[test]
    fn test_non_taxi_receipts_skip_attendance_checks() {
        let mut meal = taxi(Some(d(2025, 4, 20)), 60.0, "meal.pdf");
        meal.invoice_type = InvoiceType::Meal;
        let report = reconciler(MatchMode::Exact).reconcile(&[], &[meal], &NoLedger);
        assert_eq!(report.records[0].verdict, Verdict::Valid);
        assert_eq!(report.records[0].work_day, None);
    }

    #[test]
    fn test_cents_comparison() {
        assert_eq!(to_cents(35.0), to_cents(35.000_000_1));
        assert_ne!(to_cents(35.0), to_cents(35.01));
    }
}
