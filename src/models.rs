use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_COMPANY: &str = "未知";

/// One attendance day. Rest days never become records.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkDayRecord {
    pub date: NaiveDate,
    pub work_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    Taxi,
    Meal,
    Transport,
    Accommodation,
    Entertainment,
    Other,
}

impl InvoiceType {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Taxi => "taxi",
            Self::Meal => "meal",
            Self::Transport => "transport",
            Self::Accommodation => "accommodation",
            Self::Entertainment => "entertainment",
            Self::Other => "other",
        }
    }

    /// Inclusive range of amounts considered plausible for this receipt kind.
    pub fn amount_range(&self) -> (f64, f64) {
        match self {
            Self::Taxi => (5.0, 1000.0),
            Self::Meal => (10.0, 500.0),
            Self::Transport => (5.0, 2000.0),
            Self::Accommodation => (50.0, 5000.0),
            Self::Entertainment => (50.0, 2000.0),
            Self::Other => (0.01, 10000.0),
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        ALL_INVOICE_TYPES.iter().find(|t| t.key() == key).copied()
    }
}

pub const ALL_INVOICE_TYPES: &[InvoiceType] = &[
    InvoiceType::Taxi,
    InvoiceType::Meal,
    InvoiceType::Transport,
    InvoiceType::Accommodation,
    InvoiceType::Entertainment,
    InvoiceType::Other,
];

/// Where a receipt date came from. `Fallback` means nothing was found and
/// today's date was substituted; it is unverified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    Labeled,
    Body,
    FileName,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    Labeled,
    VendorLayout,
    /// Configured placeholder pair; not read from the document.
    Placeholder,
    Missing,
}

impl LocationSource {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Labeled | Self::VendorLayout)
    }
}

/// Per-type extras pulled from a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReceiptDetails {
    Taxi,
    Meal { items: String },
    Transport,
    Accommodation { days: u32, location: String },
    Entertainment { purpose: String },
    Other { purpose: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptRecord {
    pub invoice_type: InvoiceType,
    /// 0.0 when no plausible amount was found.
    pub amount: f64,
    pub date: Option<NaiveDate>,
    pub date_source: DateSource,
    pub company: String,
    pub start_location: String,
    pub end_location: String,
    pub location_source: LocationSource,
    pub details: ReceiptDetails,
    pub source_file: String,
}

/// Snapshot of the thresholds and amounts in force for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReimbursementRule {
    pub dinner_threshold: f64,
    pub dinner_amount: f64,
    pub night_threshold: f64,
    pub night_amount: f64,
    pub taxi_threshold: f64,
}

impl Default for ReimbursementRule {
    fn default() -> Self {
        Self {
            dinner_threshold: 9.5,
            dinner_amount: 18.0,
            night_threshold: 12.0,
            night_amount: 20.0,
            taxi_threshold: 11.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NoAmount,
    DateFormat,
    OutOfWindow,
    NoAttendance,
    BelowThreshold,
}

impl RejectReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoAmount => "未识别到金额",
            Self::DateFormat => "日期格式错误",
            Self::OutOfWindow => "不在报销月份范围内",
            Self::NoAttendance => "没有匹配的打卡记录",
            Self::BelowThreshold => "工作时长未达到阈值",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(RejectReason),
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct ReconciledRecord {
    pub receipt: ReceiptRecord,
    pub work_day: Option<WorkDayRecord>,
    pub verdict: Verdict,
    pub work_hours: Option<f64>,
    pub eligible_amount: f64,
    pub reason: String,
}

impl ReconciledRecord {
    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }
}
