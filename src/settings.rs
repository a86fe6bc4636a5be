use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dates::default_formats;
use crate::error::{ReimburseError, Result};
use crate::models::ReimbursementRule;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Full configuration tree. Every section defaults independently so a
/// partial config file merges with the built-in values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub reimburse_rules: RuleSettings,
    pub file_paths: FilePaths,
    pub excel_settings: ExcelSettings,
    pub output: OutputSettings,
    pub pdf_extraction: PdfExtraction,
    pub date_formats: Vec<String>,
    pub reconciliation: ReconcileSettings,
    pub storage: StorageSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reimburse_rules: RuleSettings::default(),
            file_paths: FilePaths::default(),
            excel_settings: ExcelSettings::default(),
            output: OutputSettings::default(),
            pdf_extraction: PdfExtraction::default(),
            date_formats: default_formats(),
            reconciliation: ReconcileSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuleSettings {
    pub night_meal: NightMealRule,
    pub taxi: TaxiRule,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NightMealRule {
    pub dinner_threshold: f64,
    pub dinner_amount: f64,
    pub night_threshold: f64,
    pub night_amount: f64,
}

impl Default for NightMealRule {
    fn default() -> Self {
        let rule = ReimbursementRule::default();
        Self {
            dinner_threshold: rule.dinner_threshold,
            dinner_amount: rule.dinner_amount,
            night_threshold: rule.night_threshold,
            night_amount: rule.night_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaxiRule {
    pub threshold: f64,
}

impl Default for TaxiRule {
    fn default() -> Self {
        Self {
            threshold: ReimbursementRule::default().taxi_threshold,
        }
    }
}

impl RuleSettings {
    pub fn snapshot(&self) -> ReimbursementRule {
        ReimbursementRule {
            dinner_threshold: self.night_meal.dinner_threshold,
            dinner_amount: self.night_meal.dinner_amount,
            night_threshold: self.night_meal.night_threshold,
            night_amount: self.night_meal.night_amount,
            taxi_threshold: self.taxi.threshold,
        }
    }

    pub fn from_rule(rule: &ReimbursementRule) -> Self {
        Self {
            night_meal: NightMealRule {
                dinner_threshold: rule.dinner_threshold,
                dinner_amount: rule.dinner_amount,
                night_threshold: rule.night_threshold,
                night_amount: rule.night_amount,
            },
            taxi: TaxiRule {
                threshold: rule.taxi_threshold,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilePaths {
    pub month_folder_pattern: String,
    pub checkin_file_pattern: String,
    pub invoice_folder_name: String,
    pub taxi_invoice_pattern: String,
    pub report_folder_name: String,
}

impl Default for FilePaths {
    fn default() -> Self {
        Self {
            month_folder_pattern: "[0-9]{2}_[0-9]{2}".to_string(),
            checkin_file_pattern: "打卡".to_string(),
            invoice_folder_name: "发票".to_string(),
            taxi_invoice_pattern: "行程单".to_string(),
            report_folder_name: "报告".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExcelSettings {
    pub checkin_sheet_name: String,
    pub checkin_skip_rows: usize,
    pub work_hours_columns: Vec<String>,
    pub rest_markers: Vec<String>,
}

impl Default for ExcelSettings {
    fn default() -> Self {
        Self {
            checkin_sheet_name: "概况统计与打卡明细".to_string(),
            checkin_skip_rows: 3,
            work_hours_columns: ["实际工作时长(小时)", "实际工作时长", "工作时长", "Actual Work Hours"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rest_markers: ["--", "", "休息", "正常（休息）"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    pub default_name: String,
    pub night_meal_template: String,
    pub taxi_template: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            default_name: "员工".to_string(),
            night_meal_template: "{name}_晚餐、夜宵报销明细表_{month}月.csv".to_string(),
            taxi_template: "{name}_加班打车报销明细表_{month}月.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationPlaceholder {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PdfExtraction {
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub text_cleanup: bool,
    pub table_extraction: bool,
    /// Returned (and flagged) when no taxi location can be read at all.
    pub location_placeholder: Option<LocationPlaceholder>,
}

impl Default for PdfExtraction {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_ms: 1000,
            text_cleanup: true,
            table_extraction: true,
            location_placeholder: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Receipt date must equal the attendance date.
    #[default]
    Exact,
    /// Attendance dates less than two days away also match.
    Tolerant,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconcileSettings {
    pub match_mode: MatchMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("reimburse")
}

impl Config {
    /// Strict load: a missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReimburseError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| ReimburseError::Config(format!("{}: {e}", path.display())))
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(shellexpand_path(&self.storage.data_dir)).join("reimburse.db")
    }
}

/// Lenient load used at startup: falls back to defaults when the file is
/// missing or unreadable.
pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Config::default();
    }
    match Config::load(path) {
        Ok(config) => {
            info!(path = %path.display(), "Config loaded");
            config
        }
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    }
}

pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
