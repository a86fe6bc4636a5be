use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::error::{ReimburseError, Result};

/// A reimbursement month written as `yy_mm` (e.g. `25_05`). Expenses claimed
/// in it were incurred in the previous calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReimburseMonth {
    year: i32,
    month: u32,
}

impl ReimburseMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(ReimburseError::InvalidMonth(format!("{year}-{month}")));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First and last day (inclusive) of the month before this one.
    pub fn expense_window(&self) -> (NaiveDate, NaiveDate) {
        let (y, m) = if self.month == 1 {
            (self.year - 1, 12)
        } else {
            (self.year, self.month - 1)
        };
        // month is validated in the constructor, so these always resolve
        let start = NaiveDate::from_ymd_opt(y, m, 1).unwrap_or_default();
        let next_month = NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default();
        (start, next_month.pred_opt().unwrap_or(start))
    }

    pub fn contains_expense(&self, date: NaiveDate) -> bool {
        let (start, end) = self.expense_window();
        start <= date && date <= end
    }
}

impl FromStr for ReimburseMonth {
    type Err = ReimburseError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if !is_month_folder_name(s) {
            return Err(ReimburseError::InvalidMonth(s.to_string()));
        }
        let invalid = || ReimburseError::InvalidMonth(s.to_string());
        let (yy, mm) = s.split_once('_').ok_or_else(invalid)?;
        let yy: i32 = yy.parse().map_err(|_| invalid())?;
        let mm: u32 = mm.parse().map_err(|_| invalid())?;
        Self::new(2000 + yy, mm).map_err(|_| invalid())
    }
}

impl fmt::Display for ReimburseMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}_{:02}", self.year.rem_euclid(100), self.month)
    }
}

pub fn is_month_folder_name(name: &str) -> bool {
    Regex::new(r"^[0-9]{2}_[0-9]{2}$")
        .map(|re| re.is_match(name))
        .unwrap_or(false)
}
