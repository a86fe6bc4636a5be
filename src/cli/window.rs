use crate::cli::today;
use crate::error::Result;
use crate::period::ReimburseMonth;

pub fn run(month: Option<&str>) -> Result<()> {
    let month = match month {
        Some(m) => m.parse()?,
        None => ReimburseMonth::from_date(today()),
    };
    let (start, end) = month.expense_window();
    println!("{month}: expenses from {start} to {end}");
    Ok(())
}
