use crate::error::{DashboardError, Result};
use crate::schema::{Cell, CellValue, RawRow, RawTable, Transaction};
use chrono::{Datelike, Months, NaiveDate};
use log::{debug, trace};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// Leading rows of the sheet that hold titles and column headers.
pub const HEADER_ROWS: usize = 2;

pub mod columns {
    pub const SEQUENCE: usize = 1;
    pub const DATE: usize = 2;
    pub const TIME: usize = 3;
    pub const RESPONSIBLE: usize = 4;
    pub const DESCRIPTION: usize = 5;
    pub const CHANNEL: usize = 6;
    pub const INCOME: usize = 8;
    pub const PROJECT: usize = 9;
    pub const EXPENSE: usize = 10;
    pub const BALANCE: usize = 11;
}

const ENVELOPE_PREFIX: &str = "google.visualization.Query.setResponse(";

#[derive(Debug, Deserialize)]
struct GvizResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
    table: Option<RawTable>,
}

#[derive(Debug, Deserialize)]
struct ProxyResponse {
    contents: Option<String>,
}

/// Parses the JSONP text returned by the gviz endpoint into a [`RawTable`].
pub fn parse_gviz_response(text: &str) -> Result<RawTable> {
    let start = text.find(ENVELOPE_PREFIX).ok_or_else(|| {
        DashboardError::MalformedEnvelope("missing setResponse( wrapper".to_string())
    })? + ENVELOPE_PREFIX.len();

    let end = text.rfind(");").filter(|&end| end >= start).ok_or_else(|| {
        DashboardError::MalformedEnvelope("unterminated setResponse( wrapper".to_string())
    })?;

    parse_gviz_json(&text[start..end])
}

pub fn parse_gviz_json(json: &str) -> Result<RawTable> {
    let response: GvizResponse = serde_json::from_str(json)?;

    if response.status.as_deref() == Some("error") {
        let details = response
            .errors
            .iter()
            .filter_map(|e| e.get("detailed_message").or_else(|| e.get("message")))
            .filter_map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(DashboardError::SourceError(if details.is_empty() {
            "unknown error".to_string()
        } else {
            details
        }));
    }

    response.table.ok_or(DashboardError::MissingTable)
}

/// Unwraps a CORS-proxy answer (`{"contents": "<envelope>"}`) and parses the envelope.
pub fn parse_proxy_response(json: &str) -> Result<RawTable> {
    let proxy: ProxyResponse = serde_json::from_str(json)?;
    let contents = proxy.contents.ok_or_else(|| {
        DashboardError::MalformedEnvelope("proxy response has no contents".to_string())
    })?;
    parse_gviz_response(&contents)
}

/// Rows without a sequence number, and rows with no income, no expense and no
/// description, are dropped. Every other irregularity is defaulted.
pub fn normalize(table: &RawTable) -> Vec<Transaction> {
    let mut transactions = Vec::with_capacity(table.rows.len().saturating_sub(HEADER_ROWS));
    let mut discarded = 0usize;

    for (index, row) in table.rows.iter().enumerate().skip(HEADER_ROWS) {
        match normalize_row(row) {
            Some(transaction) => transactions.push(transaction),
            None => {
                trace!("Discarding ledger row {}", index);
                discarded += 1;
            }
        }
    }

    debug!(
        "Normalized {} transactions ({} rows discarded)",
        transactions.len(),
        discarded
    );

    transactions
}

fn normalize_row(row: &RawRow) -> Option<Transaction> {
    let sequence = sequence_of(row.cell(columns::SEQUENCE))?;

    let description = text_of(row.cell(columns::DESCRIPTION));
    let income = amount_of(row.cell(columns::INCOME));
    let expense = amount_of(row.cell(columns::EXPENSE));

    if income == 0.0 && expense == 0.0 && description.is_empty() {
        return None;
    }

    let date_cell = row.cell(columns::DATE);
    let date = date_cell.and_then(|c| c.v.as_ref()).and_then(parse_date_value);

    Some(Transaction {
        sequence,
        date,
        year: date.map(|d| format!("{:04}", d.year())),
        month: date.map(|d| format!("{:02}", d.month())),
        date_display: formatted_of(date_cell),
        time_display: formatted_of(row.cell(columns::TIME)),
        responsible: text_of(row.cell(columns::RESPONSIBLE)).trim().to_string(),
        description,
        channel: text_of(row.cell(columns::CHANNEL)).trim().to_string(),
        income,
        project: text_of(row.cell(columns::PROJECT)).trim().to_string(),
        expense,
        running_balance: coerce_number(row.cell(columns::BALANCE).and_then(|c| c.v.as_ref())),
    })
}

fn sequence_of(cell: Option<&Cell>) -> Option<String> {
    match cell.and_then(|c| c.v.as_ref())? {
        CellValue::Text(s) if !s.is_empty() => Some(s.clone()),
        CellValue::Number(n) if n.is_finite() && *n != 0.0 => Some(number_to_text(*n)),
        _ => None,
    }
}

fn text_of(cell: Option<&Cell>) -> String {
    match cell.and_then(|c| c.v.as_ref()) {
        Some(CellValue::Text(s)) => s.clone(),
        Some(CellValue::Number(n)) if n.is_finite() => number_to_text(*n),
        _ => String::new(),
    }
}

fn formatted_of(cell: Option<&Cell>) -> String {
    cell.and_then(|c| c.f.clone()).unwrap_or_default()
}

fn number_to_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn amount_of(cell: Option<&Cell>) -> f64 {
    let value = coerce_number(cell.and_then(|c| c.v.as_ref()));
    if value < 0.0 {
        trace!("Clamping negative amount {} to zero", value);
        0.0
    } else {
        value
    }
}

/// Text is read up to its longest numeric prefix; anything unreadable is 0.
pub fn coerce_number(value: Option<&CellValue>) -> f64 {
    let number = match value {
        Some(CellValue::Number(n)) => *n,
        Some(CellValue::Text(s)) => leading_number(s).unwrap_or(0.0),
        Some(CellValue::Bool(_)) | Some(CellValue::Other(_)) | None => 0.0,
    };
    if number.is_finite() {
        number
    } else {
        0.0
    }
}

fn leading_number(text: &str) -> Option<f64> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").expect("valid number pattern")
    });
    re.find(text.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Accepts the sheet token `Date(y,m,d[,h,mi,s])` (zero-based month) and ISO
/// `YYYY-MM-DD` text.
pub fn parse_date_value(value: &CellValue) -> Option<NaiveDate> {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    let re = TOKEN.get_or_init(|| {
        Regex::new(r"Date\((\d+),(\d+),(\d+)(?:,\d+)*\)").expect("valid date token pattern")
    });

    let CellValue::Text(text) = value else {
        return None;
    };

    if let Some(caps) = re.captures(text) {
        let year: i32 = caps[1].parse().ok()?;
        let month_index: u32 = caps[2].parse().ok()?;
        let day: u64 = caps[3].parse().ok()?;
        return calendar_date(year, month_index, day);
    }

    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

/// Builds a date from a zero-based month index and a day that may overflow
/// the month, rolling forward the way calendar arithmetic does.
fn calendar_date(year: i32, month_index: u32, day: u64) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1)?.checked_add_months(Months::new(month_index))?;
    if day == 0 {
        return first.pred_opt();
    }
    first.checked_add_days(chrono::Days::new(day - 1))
}
