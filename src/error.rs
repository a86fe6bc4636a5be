use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReimburseError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid reimbursement month: {0} (expected yy_mm, e.g. 25_05)")]
    InvalidMonth(String),

    #[error("Month folder not found: {0}")]
    MonthFolder(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ReimburseError>;
