use chrono::NaiveDate;
use regex::Regex;

use crate::dates::from_captures;
use crate::models::{DateSource, InvoiceType, UNKNOWN_COMPANY};
use crate::pdf::TextTable;

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

const AMOUNT_PATTERNS: &[&str] = &[
    r"(\d+\.?\d{2})元",
    r"金额[:：]\s*[￥¥]?\s*(\d+\.?\d{2})",
    r"合计[:：]\s*[￥¥]?\s*(\d+\.?\d{2})",
    r"(?i)Total[:：]\s*[￥¥$]?\s*(\d+\.?\d{2})",
    r"(?i)Amount[:：]\s*[￥¥$]?\s*(\d+\.?\d{2})",
    r"小写[）)]\s*[￥¥]?\s*(\d+\.?\d{2})",
    r"[￥¥]\s*(\d+\.?\d{2})",
    r"\$\s*(\d+\.?\d{2})",
];

/// First number, across the ordered patterns, that is plausible for the
/// receipt type. 0.0 when nothing qualifies.
pub fn extract_amount(text: &str, invoice_type: InvoiceType) -> f64 {
    let (low, high) = invoice_type.amount_range();
    for pattern in AMOUNT_PATTERNS {
        let Ok(re) = Regex::new(pattern) else { continue };
        for caps in re.captures_iter(text) {
            let Ok(value) = caps[1].parse::<f64>() else { continue };
            if (low..=high).contains(&value) {
                return value;
            }
        }
    }
    0.0
}

// ---------------------------------------------------------------------------
// Date
// ---------------------------------------------------------------------------

const TAXI_LABELED_DATES: &[&str] = &[
    r"行程时间[:：]\s*(\d{4})[-/年](\d{1,2})[-/月](\d{1,2})",
    r"上车时间[:：]\s*(\d{4})[-/年](\d{1,2})[-/月](\d{1,2})",
];

const TAXI_BODY_DATES: &[&str] = &[
    r"(\d{4})[-/年](\d{1,2})[-/月](\d{1,2})日?\s*\d{1,2}:\d{2}",
    r"(?:^|\D)(\d{2})[-/年](\d{1,2})[-/月](\d{1,2})日?\s*\d{1,2}:\d{2}",
];

const LABELED_DATES: &[&str] = &[
    r"开票日期[:：]\s*(\d{4})[-/年](\d{1,2})[-/月](\d{1,2})",
    r"日期[:：]\s*(\d{4})[-/年](\d{1,2})[-/月](\d{1,2})",
    r"(?i)Date[:：]\s*(\d{4})[-/](\d{1,2})[-/](\d{1,2})",
];

const BODY_DATES: &[&str] = &[
    r"(\d{4})[-/年](\d{1,2})[-/月](\d{1,2})",
    r"(?:^|\D)(\d{2})[-/年](\d{1,2})[-/月](\d{1,2})",
];

fn first_date(text: &str, patterns: &[&str]) -> Option<NaiveDate> {
    for pattern in patterns {
        let Ok(re) = Regex::new(pattern) else { continue };
        let found = re.captures_iter(text).find_map(|c| from_captures(&c));
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Labeled phrases first, then bare dates in the body, then the file name.
/// `None` means the caller has to fall back to an unverified date.
pub fn extract_date(text: &str, file_name: &str, invoice_type: InvoiceType) -> Option<(NaiveDate, DateSource)> {
    let mut ordered: Vec<(&[&str], DateSource)> = Vec::new();
    if invoice_type == InvoiceType::Taxi {
        ordered.push((TAXI_LABELED_DATES, DateSource::Labeled));
        ordered.push((TAXI_BODY_DATES, DateSource::Body));
    }
    ordered.push((LABELED_DATES, DateSource::Labeled));
    ordered.push((BODY_DATES, DateSource::Body));

    for (patterns, source) in ordered {
        if let Some(date) = first_date(text, patterns) {
            return Some((date, source));
        }
    }
    first_date(file_name, LABELED_DATES)
        .or_else(|| first_date(file_name, BODY_DATES))
        .map(|d| (d, DateSource::FileName))
}

// ---------------------------------------------------------------------------
// Labeled text fields
// ---------------------------------------------------------------------------

/// Value after `label：` up to the end of the line, for the first label that
/// yields a non-empty value.
fn labeled_value(text: &str, labels: &[&str]) -> Option<String> {
    for label in labels {
        let Ok(re) = Regex::new(&format!(r"(?m){label}[:：][ \t]*([^\n]*)")) else {
            continue;
        };
        let found = re
            .captures_iter(text)
            .map(|c| c[1].trim().to_string())
            .find(|v| !v.is_empty());
        if found.is_some() {
            return found;
        }
    }
    None
}

pub fn extract_company(text: &str, file_name: &str) -> String {
    if let Some(company) = labeled_value(text, &["公司", "单位", "Company", "Unit"]) {
        return company;
    }
    Regex::new(r"【([^】]+)】")
        .ok()
        .and_then(|re| re.captures(file_name).map(|c| c[1].trim().to_string()))
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| UNKNOWN_COMPANY.to_string())
}

pub const DEFAULT_MEAL_ITEMS: &str = "餐饮服务";
pub const DEFAULT_ENTERTAINMENT_PURPOSE: &str = "业务招待";
pub const DEFAULT_OTHER_PURPOSE: &str = "其他费用";

const MEAL_HEADER_WORDS: &[&str] = &["商品", "项目", "Items", "Goods"];
const MEAL_ROW_WORDS: &[&str] = &["餐", "食品", "菜品", "Meal", "Food", "Dish"];

pub fn extract_meal_items(text: &str, tables: &[TextTable]) -> String {
    let mut items: Vec<String> = Vec::new();
    for label in MEAL_HEADER_WORDS {
        if let Some(v) = labeled_value(text, &[label]) {
            items.push(v);
        }
    }
    for table in tables {
        for row in table.iter().filter(|r| r.len() >= 2) {
            let row_text = row.join(" ");
            if MEAL_HEADER_WORDS.iter().any(|w| row_text.contains(w)) {
                continue;
            }
            if MEAL_ROW_WORDS.iter().any(|w| row_text.contains(w)) {
                items.push(row_text);
            }
        }
    }
    if items.is_empty() {
        DEFAULT_MEAL_ITEMS.to_string()
    } else {
        items.join("; ")
    }
}

/// `(label_from, label_to)` pairs tried in order; both sides must be present.
pub(crate) fn labeled_pair(text: &str, pairs: &[(&str, &str)]) -> Option<(String, String)> {
    for (from, to) in pairs {
        let Ok(re) = Regex::new(&format!(r"{from}[:：]\s*([^\n]+?)\s*{to}[:：]\s*([^\n]+)")) else {
            continue;
        };
        if let Some(c) = re.captures(text) {
            let start = c[1].trim().to_string();
            let end = c[2].trim().to_string();
            if !start.is_empty() && !end.is_empty() {
                return Some((start, end));
            }
        }
    }
    None
}

pub fn extract_transport_locations(text: &str) -> (String, String) {
    labeled_pair(
        text,
        &[("出发地", "目的地"), ("(?i:From)", "(?i:To)"), ("起点", "终点")],
    )
    .unwrap_or_default()
}

pub fn extract_accommodation_days(text: &str) -> u32 {
    const DAY_PATTERNS: &[&str] = &[r"(\d+)天", r"(\d+)晚", r"(?i)(\d+)\s*days?\b", r"(?i)(\d+)\s*nights?\b"];
    for pattern in DAY_PATTERNS {
        let Ok(re) = Regex::new(pattern) else { continue };
        if let Some(days) = re.captures(text).and_then(|c| c[1].parse::<u32>().ok()) {
            if days > 0 {
                return days;
            }
        }
    }
    1
}

pub fn extract_accommodation_location(text: &str) -> String {
    labeled_value(text, &["地址", "(?i:Location)", "(?i:Address)"]).unwrap_or_default()
}

pub fn extract_entertainment_purpose(text: &str) -> String {
    labeled_value(text, &["用途", "(?i:Purpose)", "事由"])
        .unwrap_or_else(|| DEFAULT_ENTERTAINMENT_PURPOSE.to_string())
}

pub fn extract_other_purpose(text: &str) -> String {
    labeled_value(text, &["用途", "(?i:Purpose)", "事由", "项目"])
        .unwrap_or_else(|| DEFAULT_OTHER_PURPOSE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_amount_suffix_and_labels() {
        assert_eq!(extract_amount("行程金额 35.00元", InvoiceType::Taxi), 35.0);
        assert_eq!(extract_amount("合计：23.50", InvoiceType::Taxi), 23.5);
        assert_eq!(extract_amount("价税合计（小写）¥ 128.00", InvoiceType::Meal), 128.0);
        assert_eq!(extract_amount("Total: $42.10", InvoiceType::Other), 42.1);
    }

    #[test]
    fn test_amount_out_of_range_is_rejected() {
        assert_eq!(extract_amount("¥4999.00", InvoiceType::Taxi), 0.0);
        assert_eq!(extract_amount("￥4999.00", InvoiceType::Taxi), 0.0);
        assert_eq!(extract_amount("¥4999.00", InvoiceType::Accommodation), 4999.0);
    }

    #[test]
    fn test_amount_skips_implausible_candidates() {
        // 2.00元 is below the taxi minimum, the next candidate wins
        let text = "优惠 2.00元\n实付 31.20元";
        assert_eq!(extract_amount(text, InvoiceType::Taxi), 31.2);
    }

    #[test]
    fn test_amount_none_found() {
        assert_eq!(extract_amount("no money here", InvoiceType::Taxi), 0.0);
    }

    #[test]
    fn test_date_full_and_two_digit_years() {
        assert_eq!(
            extract_date("2024-12-31", "", InvoiceType::Taxi),
            Some((d(2024, 12, 31), DateSource::Body))
        );
        assert_eq!(
            extract_date("24-12-31", "", InvoiceType::Taxi),
            Some((d(2024, 12, 31), DateSource::Body))
        );
        assert_eq!(
            extract_date("行程 24/12/31 22:29", "", InvoiceType::Other),
            Some((d(2024, 12, 31), DateSource::Body))
        );
    }

    #[test]
    fn test_taxi_prefers_trip_time_over_issue_date() {
        let text = "开票日期：2025年05月02日\n上车时间：2025-04-10 22:31\n";
        assert_eq!(
            extract_date(text, "", InvoiceType::Taxi),
            Some((d(2025, 4, 10), DateSource::Labeled))
        );
        // other receipt types take the generic labeled date
        assert_eq!(
            extract_date(text, "", InvoiceType::Meal),
            Some((d(2025, 5, 2), DateSource::Labeled))
        );
    }

    #[test]
    fn test_date_from_file_name() {
        assert_eq!(
            extract_date("no dates in body", "【高德】行程单2025-04-18.pdf", InvoiceType::Taxi),
            Some((d(2025, 4, 18), DateSource::FileName))
        );
        assert_eq!(extract_date("none", "receipt.pdf", InvoiceType::Taxi), None);
    }

    #[test]
    fn test_invalid_calendar_dates_are_skipped() {
        assert_eq!(
            extract_date("2025-02-30 then 2025-03-01", "", InvoiceType::Other),
            Some((d(2025, 3, 1), DateSource::Body))
        );
    }

    #[test]
    fn test_company_sources() {
        assert_eq!(extract_company("单位：杭州某某科技有限公司\n", "x.pdf"), "杭州某某科技有限公司");
        assert_eq!(extract_company("nothing", "【高德打车】行程单.pdf"), "高德打车");
        assert_eq!(extract_company("公司：\n", "行程单.pdf"), UNKNOWN_COMPANY);
    }

    #[test]
    fn test_meal_items_from_labels_and_tables() {
        let tables = vec![vec![
            vec!["项目".to_string(), "金额".to_string()],
            vec!["餐饮费".to_string(), "88.00".to_string()],
            vec!["停车费".to_string(), "10.00".to_string()],
        ]];
        assert_eq!(extract_meal_items("商品：工作餐\n", &tables), "工作餐; 餐饮费 88.00");
        assert_eq!(extract_meal_items("", &[]), DEFAULT_MEAL_ITEMS);
    }

    #[test]
    fn test_transport_locations() {
        assert_eq!(
            extract_transport_locations("出发地：杭州东站 目的地：上海虹桥\n"),
            ("杭州东站".to_string(), "上海虹桥".to_string())
        );
        assert_eq!(
            extract_transport_locations("From: Hangzhou\nTo: Shanghai\n"),
            ("Hangzhou".to_string(), "Shanghai".to_string())
        );
        assert_eq!(extract_transport_locations("nothing"), (String::new(), String::new()));
    }

    #[test]
    fn test_accommodation_fields() {
        assert_eq!(extract_accommodation_days("入住 3晚"), 3);
        assert_eq!(extract_accommodation_days("Stay: 2 nights"), 2);
        assert_eq!(extract_accommodation_days("no length"), 1);
        assert_eq!(extract_accommodation_location("地址：西湖区文三路1号\n"), "西湖区文三路1号");
        assert_eq!(extract_accommodation_location(""), "");
    }

    #[test]
    fn test_purpose_defaults() {
        assert_eq!(extract_entertainment_purpose("事由：客户接待\n"), "客户接待");
        assert_eq!(extract_entertainment_purpose(""), DEFAULT_ENTERTAINMENT_PURPOSE);
        assert_eq!(extract_other_purpose("项目：办公用品\n"), "办公用品");
        assert_eq!(extract_other_purpose(""), DEFAULT_OTHER_PURPOSE);
    }
}
