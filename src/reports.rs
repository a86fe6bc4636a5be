use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use crate::dates::weekday_name;
use crate::eligibility::meal_allowance;
use crate::error::Result;
use crate::fmt::{amount, hours};
use crate::models::{ReconciledRecord, ReimbursementRule, WorkDayRecord};
use crate::period::ReimburseMonth;
use crate::settings::OutputSettings;

// ---------------------------------------------------------------------------
// Night meal
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MealRow {
    pub date: NaiveDate,
    pub dinner: f64,
    pub night: f64,
}

#[derive(Debug)]
pub struct NightMealReport {
    pub rule: ReimbursementRule,
    pub rows: Vec<MealRow>,
    pub total_dinner: f64,
    pub total_night: f64,
}

impl NightMealReport {
    /// One row per attendance day at or above the dinner threshold, in
    /// attendance order.
    pub fn build(workdays: &[WorkDayRecord], rule: &ReimbursementRule) -> Self {
        let rows: Vec<MealRow> = workdays
            .iter()
            .filter(|w| w.work_hours >= rule.dinner_threshold)
            .map(|w| {
                let (dinner, night) = meal_allowance(w.work_hours, rule);
                MealRow {
                    date: w.date,
                    dinner,
                    night,
                }
            })
            .collect();
        let total_dinner = rows.iter().map(|r| r.dinner).sum();
        let total_night = rows.iter().map(|r| r.night).sum();
        Self {
            rule: *rule,
            rows,
            total_dinner,
            total_night,
        }
    }

    pub fn grand_total(&self) -> f64 {
        self.total_dinner + self.total_night
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let r = &self.rule;
        let mut wtr = open_csv(path)?;
        wtr.write_record(["晚餐、夜宵报销明细"])?;
        wtr.write_record([
            "月份".to_string(),
            "日期".to_string(),
            format!("晚餐报销{}元（工作时长{}小时）", hours(r.dinner_amount), hours(r.dinner_threshold)),
            format!("夜宵报销{}元（工作时长{}小时）", hours(r.night_amount), hours(r.night_threshold)),
        ])?;
        for row in &self.rows {
            wtr.write_record([
                row.date.format("%m月").to_string(),
                format!("{} {}", row.date.format("%Y/%m/%d"), weekday_name(row.date)),
                optional_amount(row.dinner),
                optional_amount(row.night),
            ])?;
        }
        wtr.write_record([
            String::new(),
            "合计".to_string(),
            amount(self.total_dinner),
            amount(self.total_night),
        ])?;
        wtr.write_record([
            String::new(),
            "最终总计".to_string(),
            String::new(),
            amount(self.grand_total()),
        ])?;
        wtr.flush()?;
        Ok(())
    }
}

fn optional_amount(val: f64) -> String {
    if val > 0.0 {
        amount(val)
    } else {
        String::new()
    }
}

// ---------------------------------------------------------------------------
// Taxi
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct TaxiRow {
    pub date: NaiveDate,
    pub start: String,
    pub end: String,
    pub amount: f64,
    pub work_hours: Option<f64>,
}

#[derive(Debug)]
pub struct TaxiReport {
    pub rows: Vec<TaxiRow>,
    pub total: f64,
    /// Mean matched work hours, one decimal; 0 when there are no rows.
    pub average_hours: f64,
}

impl TaxiReport {
    /// Rows from valid reconciled records. Records without a date are
    /// skipped; valid ones always carry one.
    pub fn build<'a, I>(valid: I) -> Self
    where
        I: IntoIterator<Item = &'a ReconciledRecord>,
    {
        let rows: Vec<TaxiRow> = valid
            .into_iter()
            .filter_map(|r| {
                Some(TaxiRow {
                    date: r.receipt.date?,
                    start: r.receipt.start_location.clone(),
                    end: r.receipt.end_location.clone(),
                    amount: r.eligible_amount,
                    work_hours: r.work_hours,
                })
            })
            .collect();
        let total = rows.iter().map(|r| r.amount).sum();
        let average_hours = if rows.is_empty() {
            0.0
        } else {
            let sum: f64 = rows.iter().filter_map(|r| r.work_hours).sum();
            (sum / rows.len() as f64 * 10.0).round() / 10.0
        };
        Self {
            rows,
            total,
            average_hours,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn title(&self) -> String {
        format!("打车报销明细（工作时长{}小时）", hours(self.average_hours))
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = open_csv(path)?;
        wtr.write_record([self.title()])?;
        wtr.write_record(["月份", "日期", "出发地", "到达地", "金额"])?;
        for row in &self.rows {
            wtr.write_record([
                row.date.format("%m月").to_string(),
                row.date.format("%Y-%m-%d").to_string(),
                row.start.clone(),
                row.end.clone(),
                amount(row.amount),
            ])?;
        }
        wtr.write_record([
            "合计".to_string(),
            String::new(),
            String::new(),
            String::new(),
            amount(self.total),
        ])?;
        wtr.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output files
// ---------------------------------------------------------------------------

/// UTF-8 with a byte-order mark so spreadsheet apps pick the right encoding.
fn open_csv(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    file.write_all("\u{feff}".as_bytes())?;
    Ok(csv::WriterBuilder::new().flexible(true).from_writer(file))
}

/// Fill `{name}` and `{month}` (two-digit month number) in a file template.
pub fn report_file_name(template: &str, name: &str, month: &ReimburseMonth) -> String {
    template
        .replace("{name}", name)
        .replace("{month}", &format!("{:02}", month.month()))
}

#[derive(Debug)]
pub struct WrittenReport {
    pub kind: &'static str,
    pub path: PathBuf,
    pub rows: usize,
    pub total: f64,
}

/// Write whichever reports have rows into `dir`.
pub fn write_reports(
    dir: &Path,
    output: &OutputSettings,
    month: &ReimburseMonth,
    meal: &NightMealReport,
    taxi: &TaxiReport,
) -> Result<Vec<WrittenReport>> {
    let mut written = Vec::new();
    if meal.is_empty() {
        info!(%month, "No night meal rows");
    } else {
        let path = dir.join(report_file_name(&output.night_meal_template, &output.default_name, month));
        meal.write_csv(&path)?;
        info!(path = %path.display(), rows = meal.rows.len(), "Night meal report written");
        written.push(WrittenReport {
            kind: "night_meal",
            path,
            rows: meal.rows.len(),
            total: meal.grand_total(),
        });
    }
    if taxi.is_empty() {
        info!(%month, "No taxi rows");
    } else {
        let path = dir.join(report_file_name(&output.taxi_template, &output.default_name, month));
        taxi.write_csv(&path)?;
        info!(path = %path.display(), rows = taxi.rows.len(), "Taxi report written");
        written.push(WrittenReport {
            kind: "taxi",
            path,
            rows: taxi.rows.len(),
            total: taxi.total,
        });
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DateSource, InvoiceType, LocationSource, ReceiptDetails, ReceiptRecord, Verdict,
    };

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn workdays() -> Vec<WorkDayRecord> {
        vec![
            WorkDayRecord { date: d(2025, 4, 1), work_hours: 8.0 },
            WorkDayRecord { date: d(2025, 4, 2), work_hours: 10.0 },
            WorkDayRecord { date: d(2025, 4, 3), work_hours: 13.0 },
        ]
    }

    fn valid_taxi(date: NaiveDate, amount: f64, hours: f64) -> ReconciledRecord {
        ReconciledRecord {
            receipt: ReceiptRecord {
                invoice_type: InvoiceType::Taxi,
                amount,
                date: Some(date),
                date_source: DateSource::Body,
                company: "高德".to_string(),
                start_location: "西溪首座".to_string(),
                end_location: "蒋村花园".to_string(),
                location_source: LocationSource::VendorLayout,
                details: ReceiptDetails::Taxi,
                source_file: "a.pdf".to_string(),
            },
            work_day: Some(WorkDayRecord { date, work_hours: hours }),
            verdict: Verdict::Valid,
            work_hours: Some(hours),
            eligible_amount: amount,
            reason: String::new(),
        }
    }

    fn read_back(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap().trim_start_matches('\u{feff}').to_string()
    }

    #[test]
    fn test_meal_report_rows_and_totals() {
        let report = NightMealReport::build(&workdays(), &ReimbursementRule::default());
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].dinner, 18.0);
        assert_eq!(report.rows[0].night, 0.0);
        assert_eq!(report.rows[1].night, 20.0);
        assert_eq!(report.total_dinner, 36.0);
        assert_eq!(report.total_night, 20.0);
        assert_eq!(report.grand_total(), 56.0);
    }

    #[test]
    fn test_meal_report_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meal.csv");
        NightMealReport::build(&workdays(), &ReimbursementRule::default())
            .write_csv(&path)
            .unwrap();
        let content = read_back(&path);
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "晚餐、夜宵报销明细");
        assert_eq!(lines[1], "月份,日期,晚餐报销18元（工作时长9.5小时）,夜宵报销20元（工作时长12小时）");
        assert_eq!(lines[2], "04月,2025/04/02 星期三,18.00,");
        assert_eq!(lines[3], "04月,2025/04/03 星期四,18.00,20.00");
        assert_eq!(lines[4], ",合计,36.00,20.00");
        assert_eq!(lines[5], ",最终总计,,56.00");
    }

    #[test]
    fn test_taxi_report_totals_and_title() {
        let records = [valid_taxi(d(2025, 4, 3), 35.0, 13.0), valid_taxi(d(2025, 4, 8), 28.5, 12.0)];
        let report = TaxiReport::build(records.iter());
        assert_eq!(report.total, 63.5);
        assert_eq!(report.average_hours, 12.5);
        assert_eq!(report.title(), "打车报销明细（工作时长12.5小时）");
    }

    #[test]
    fn test_taxi_report_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taxi.csv");
        let records = [valid_taxi(d(2025, 4, 3), 35.0, 13.0)];
        TaxiReport::build(records.iter()).write_csv(&path).unwrap();
        let content = read_back(&path);
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[1], "月份,日期,出发地,到达地,金额");
        assert_eq!(lines[2], "04月,2025-04-03,西溪首座,蒋村花园,35.00");
        assert_eq!(lines[3], "合计,,,,35.00");
    }

    #[test]
    fn test_empty_taxi_report() {
        let report = TaxiReport::build(std::iter::empty());
        assert!(report.is_empty());
        assert_eq!(report.average_hours, 0.0);
    }

    #[test]
    fn test_report_file_name() {
        let month: ReimburseMonth = "25_05".parse().unwrap();
        let output = OutputSettings::default();
        assert_eq!(
            report_file_name(&output.taxi_template, "张三", &month),
            "张三_加班打车报销明细表_05月.csv"
        );
    }

    #[test]
    fn test_write_reports_skips_empty_tables() {
        let dir = tempfile::tempdir().unwrap();
        let month: ReimburseMonth = "25_05".parse().unwrap();
        let meal = NightMealReport::build(&workdays(), &ReimbursementRule::default());
        let taxi = TaxiReport::build(std::iter::empty());
        let written = write_reports(dir.path(), &OutputSettings::default(), &month, &meal, &taxi).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].kind, "night_meal");
        assert_eq!(written[0].total, 56.0);
        assert!(written[0].path.ends_with("员工_晚餐、夜宵报销明细表_05月.csv"));
    }
}
