pub mod attendance;
pub mod init;
pub mod process;
pub mod receipt;
pub mod rules;
pub mod status;
pub mod window;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::db::Store;
use crate::error::Result;
use crate::pipeline::Session;
use crate::settings::DEFAULT_CONFIG_FILE;

#[derive(Parser)]
#[command(
    name = "reimburse",
    version,
    about = "Overtime meal and taxi reimbursement from attendance sheets and trip receipts."
)]
pub struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config file and initialize the database.
    Init {
        /// Path for reimburse data (default: ~/Documents/reimburse)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Generate reimbursement reports for month folders (yy_mm).
    Process {
        /// Folder containing the month folders
        #[arg(default_value = ".")]
        base: PathBuf,
        /// Only process this month folder, e.g. 25_05
        #[arg(long)]
        month: Option<String>,
        /// Reconcile and print results without writing reports or records
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Do not use the database for duplicate checks or persistence
        #[arg(long = "no-db")]
        no_db: bool,
    },
    /// Parse an attendance spreadsheet and show the allowance per day.
    Attendance {
        /// Path to the XLSX/XLS attendance export
        file: PathBuf,
    },
    /// Extract the fields of a single receipt PDF.
    Receipt {
        /// Path to the receipt PDF
        file: PathBuf,
        /// Receipt type: taxi, meal, transport, accommodation, entertainment, other
        #[arg(long = "type", default_value = "taxi")]
        invoice_type: String,
    },
    /// Show the expense window for a reimbursement month.
    Window {
        /// Reimbursement month as yy_mm, e.g. 25_05 (default: current month)
        month: Option<String>,
    },
    /// Show or change the reimbursement rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Show config, database location and stored record counts.
    Status {
        /// List the stored attendance days and invoices of one month (yy_mm)
        #[arg(long)]
        month: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Show the rules in force (config file plus stored overrides).
    Show,
    /// Store rule overrides in the database.
    Set {
        #[arg(long = "dinner-threshold")]
        dinner_threshold: Option<f64>,
        #[arg(long = "dinner-amount")]
        dinner_amount: Option<f64>,
        #[arg(long = "night-threshold")]
        night_threshold: Option<f64>,
        #[arg(long = "night-amount")]
        night_amount: Option<f64>,
        #[arg(long = "taxi-threshold")]
        taxi_threshold: Option<f64>,
    },
}

/// Session from the config file, with the store's rule overrides applied.
/// An existing but malformed config file is an error here.
pub(crate) fn open_session(config_path: &Path) -> Result<(Session, Store)> {
    let mut session = Session::from_path(config_path);
    if config_path.exists() {
        session.reload()?;
    }
    let store = Store::open(&session.config().db_path())?;
    session.apply_store_overrides(&store)?;
    Ok((session, store))
}

pub(crate) fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}
