/// Format a float as a yuan amount with thousands separators: ¥1,234.56
pub fn money(val: f64) -> String {
    let negative = val < 0.0;
    let abs = val.abs();
    let cents = format!("{:.2}", abs);
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-¥{with_commas}.{dec_part}")
    } else {
        format!("¥{with_commas}.{dec_part}")
    }
}

/// Plain two-decimal amount for CSV cells.
pub fn amount(val: f64) -> String {
    format!("{val:.2}")
}

/// Hours with trailing zeros dropped: 13.0 -> "13", 9.50 -> "9.5".
pub fn hours(val: f64) -> String {
    let s = format!("{val:.2}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(1234.56), "¥1,234.56");
        assert_eq!(money(-500.00), "-¥500.00");
        assert_eq!(money(0.0), "¥0.00");
        assert_eq!(money(1000000.99), "¥1,000,000.99");
        assert_eq!(money(42.10), "¥42.10");
    }

    #[test]
    fn test_hours_formatting() {
        assert_eq!(hours(13.0), "13");
        assert_eq!(hours(9.5), "9.5");
        assert_eq!(hours(11.25), "11.25");
        assert_eq!(hours(0.0), "0");
    }

    #[test]
    fn test_amount_formatting() {
        assert_eq!(amount(18.0), "18.00");
        assert_eq!(amount(35.5), "35.50");
    }
}
