use crate::error::{DashboardError, Result};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SINGLE_EXPENSE_THRESHOLD: f64 = 200.0;
pub const DEFAULT_MONTHLY_EXPENSE_THRESHOLD: f64 = 500.0;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5 * 60;

/// A typed spreadsheet cell value as delivered by the tabular feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Number(f64),
    Text(String),
    /// Anything else the feed may send (objects, arrays). Reads as absent.
    Other(serde_json::Value),
}

/// One cell: the raw value (`v`) and the sheet's own formatted label (`f`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub v: Option<CellValue>,
    #[serde(default)]
    pub f: Option<String>,
}

impl Cell {
    pub fn value(v: CellValue) -> Self {
        Self { v: Some(v), f: None }
    }

    pub fn formatted(v: CellValue, f: impl Into<String>) -> Self {
        Self {
            v: Some(v),
            f: Some(f.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(rename = "c", default, deserialize_with = "lenient_cells")]
    pub cells: Vec<Option<Cell>>,
}

/// A null cell list reads as an empty row and an unreadable cell as a missing one.
fn lenient_cells<'de, D>(deserializer: D) -> std::result::Result<Vec<Option<Cell>>, D::Error>
where
    D: Deserializer<'de>,
{
    let cells = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(cells
        .unwrap_or_default()
        .into_iter()
        .map(|cell| serde_json::from_value::<Option<Cell>>(cell).ok().flatten())
        .collect())
}

/// An unreadable row reads as an empty one, so row positions are kept.
fn lenient_rows<'de, D>(deserializer: D) -> std::result::Result<Vec<RawRow>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(rows
        .unwrap_or_default()
        .into_iter()
        .map(|row| serde_json::from_value(row).unwrap_or_default())
        .collect())
}

impl RawRow {
    pub fn new(cells: Vec<Option<Cell>>) -> Self {
        Self { cells }
    }

    /// Cell at a column position; out-of-range columns read as absent.
    pub fn cell(&self, column: usize) -> Option<&Cell> {
        self.cells.get(column).and_then(|c| c.as_ref())
    }
}

/// The ordered rows of the ledger sheet, headers included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    #[serde(default, deserialize_with = "lenient_rows")]
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self { rows }
    }
}

/// A canonical ledger transaction. Immutable once produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transaction {
    #[schemars(description = "Sequence number copied from the ledger row")]
    pub sequence: String,

    #[schemars(description = "Calendar date of the movement, when the sheet carried a parsable one")]
    pub date: Option<NaiveDate>,

    #[schemars(description = "Four digit year derived from the date")]
    pub year: Option<String>,

    #[schemars(description = "Two digit month (01-12) derived from the date")]
    pub month: Option<String>,

    #[schemars(description = "Date label as formatted by the sheet")]
    pub date_display: String,

    #[schemars(description = "Time label as formatted by the sheet")]
    pub time_display: String,

    pub responsible: String,
    pub description: String,

    #[schemars(description = "Payment channel (cash, transfer, wallet...)")]
    pub channel: String,

    pub income: f64,
    pub project: String,
    pub expense: f64,

    #[schemars(description = "Running balance exactly as recorded on the ledger row")]
    pub running_balance: f64,
}

impl Transaction {
    pub fn is_income(&self) -> bool {
        self.income > 0.0
    }

    pub fn status(&self, single_expense_threshold: f64) -> TransactionStatus {
        if self.expense > single_expense_threshold {
            TransactionStatus::Alert
        } else {
            TransactionStatus::Ok
        }
    }

    /// `"YYYY-MM"` grouping key, absent for undated transactions.
    pub fn month_key(&self) -> Option<String> {
        match (&self.year, &self.month) {
            (Some(year), Some(month)) => Some(format!("{}-{}", year, month)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Ok,
    Alert,
}

/// A transaction as handed to table renderers, with its derived flags.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub is_income: bool,
    pub status: TransactionStatus,
}

impl TransactionView {
    pub fn new(transaction: &Transaction, single_expense_threshold: f64) -> Self {
        Self {
            is_income: transaction.is_income(),
            status: transaction.status(single_expense_threshold),
            transaction: transaction.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AlertThresholds {
    #[schemars(description = "A single expense above this amount raises a warning")]
    #[serde(default = "default_single_expense")]
    pub single_expense: f64,

    #[schemars(description = "A month whose expenses add up above this amount raises a warning")]
    #[serde(default = "default_monthly_expense")]
    pub monthly_expense: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            single_expense: DEFAULT_SINGLE_EXPENSE_THRESHOLD,
            monthly_expense: DEFAULT_MONTHLY_EXPENSE_THRESHOLD,
        }
    }
}

fn default_single_expense() -> f64 {
    DEFAULT_SINGLE_EXPENSE_THRESHOLD
}

fn default_monthly_expense() -> f64 {
    DEFAULT_MONTHLY_EXPENSE_THRESHOLD
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DashboardConfig {
    #[schemars(description = "Identifier of the spreadsheet that holds the ledger")]
    #[serde(default)]
    pub sheet_id: Option<String>,

    #[serde(default)]
    pub thresholds: AlertThresholds,

    #[schemars(description = "Seconds between automatic refreshes")]
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[schemars(description = "Filters applied when the dashboard starts")]
    #[serde(default)]
    pub initial_filters: crate::filter::FilterCriteria,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            sheet_id: None,
            thresholds: AlertThresholds::default(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            initial_filters: crate::filter::FilterCriteria::default(),
        }
    }
}

impl DashboardConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: DashboardConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("single_expense", self.thresholds.single_expense),
            ("monthly_expense", self.thresholds.monthly_expense),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(DashboardError::InvalidConfig(format!(
                    "threshold '{}' must be a non-negative amount, got {}",
                    name, value
                )));
            }
        }

        if self.refresh_interval_secs == 0 {
            return Err(DashboardError::InvalidConfig(
                "refresh_interval_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DashboardConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
