//! # Cashflow Dashboard
//!
//! A library that turns a cash-flow ledger kept in a spreadsheet into the
//! figures an executive dashboard shows: filtered totals, per-project and
//! per-month aggregates, KPIs, alerts and the content of a printable report.
//!
//! ## Core Concepts
//!
//! - **Raw table**: rows of typed cells as delivered by the sheet's query endpoint
//! - **Transaction**: one normalized ledger movement (income or expense)
//! - **Criteria**: a conjunction of exact-match filters, `"all"` meaning no filter
//! - **Snapshot**: everything derived from the ledger and the active criteria,
//!   rebuilt as a whole on every refresh or filter change
//!
//! ## Example
//!
//! ```rust,ignore
//! use cashflow_dashboard::*;
//!
//! let mut dashboard = Dashboard::new(DashboardConfig::default());
//! dashboard.refresh_from_envelope(&response_text)?;
//!
//! let snapshot = dashboard.set_filter(FilterField::Project, "Obra Norte");
//! println!("Balance: {}", format_currency(snapshot.aggregates.totals.final_balance));
//! for alert in &snapshot.alerts {
//!     println!("{}", alert.message);
//! }
//! ```

pub mod alerts;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod filter;
pub mod ingestion;
pub mod kpi;
pub mod rankings;
pub mod report;
pub mod schema;
pub mod utils;

#[cfg(feature = "remote")]
pub mod remote;

pub use alerts::{evaluate, Alert, AlertCategory, Severity};
pub use dashboard::{Dashboard, DashboardSnapshot, RefreshTicket, TableFilter};
pub use engine::{aggregate, Aggregates, ChannelBucket, FlowBucket, MonthBucket, PeriodRange, Totals};
pub use error::{DashboardError, Result};
pub use filter::{FilterCriteria, FilterField, FilterOptions, SelectorOption, WILDCARD};
pub use ingestion::{normalize, parse_gviz_json, parse_gviz_response, parse_proxy_response};
pub use kpi::{Concentration, ExecutiveKpis, MonthOverMonth, RatioBand};
pub use rankings::*;
pub use report::{DeficitProject, ExecutiveReport};
pub use schema::*;
pub use utils::*;

#[cfg(feature = "remote")]
pub use remote::{auto_refresh, SheetClient};

use log::info;

/// Runs the whole pipeline on a table that is already in hand.
pub fn process_ledger(
    table: &RawTable,
    criteria: &FilterCriteria,
    config: &DashboardConfig,
) -> Result<DashboardSnapshot> {
    config.validate()?;

    let transactions = normalize(table);
    info!(
        "Processing ledger with {} transactions",
        transactions.len()
    );

    Ok(DashboardSnapshot::build(
        std::sync::Arc::new(transactions),
        criteria.clone(),
        config.thresholds,
    ))
}

/// Same as [`process_ledger`], starting from the endpoint's raw response text.
pub fn process_envelope(
    text: &str,
    criteria: &FilterCriteria,
    config: &DashboardConfig,
) -> Result<DashboardSnapshot> {
    let table = parse_gviz_response(text)?;
    process_ledger(&table, criteria, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVELOPE: &str = r#"/*O_o*/
google.visualization.Query.setResponse({"version":"0.6","status":"ok","table":{"cols":[],"rows":[
{"c":[null,{"v":"Flujo de caja"}]},
{"c":[null,{"v":"N°"},{"v":"Fecha"}]},
{"c":[null,{"v":1.0},{"v":"Date(2025,0,10)","f":"10/01/2025"},{"v":"09:00","f":"09:00"},{"v":"Ana Pérez"},{"v":"Aporte inicial"},{"v":"Transferencia"},null,{"v":1000.0},{"v":"Obra Norte"},null,{"v":1000.0}]},
{"c":[null,{"v":2.0},{"v":"Date(2025,0,20)","f":"20/01/2025"},null,{"v":"Luis Gómez"},{"v":"Cemento"},{"v":"Efectivo"},null,null,{"v":"Obra Norte"},{"v":450.0},{"v":550.0}]},
{"c":[null,{"v":null},{"v":"Date(2025,0,21)"},null,null,{"v":"fila sin número"},null,null,{"v":99.0},null,null,null]}
]}});"#;

    #[test]
    fn test_process_envelope() {
        let snapshot = process_envelope(
            ENVELOPE,
            &FilterCriteria::default(),
            &DashboardConfig::default(),
        )
        .unwrap();

        assert_eq!(snapshot.transactions.len(), 2);
        assert_eq!(snapshot.aggregates.totals.income, 1000.0);
        assert_eq!(snapshot.aggregates.totals.expense, 450.0);
        assert_eq!(snapshot.aggregates.totals.final_balance, 550.0);
        assert_eq!(snapshot.kpis.expense_ratio, 45.0);
        assert_eq!(snapshot.kpis.ratio_band, RatioBand::Excellent);
        assert_eq!(snapshot.alerts.len(), 1);
        assert_eq!(snapshot.alerts[0].category, AlertCategory::LargeExpense);
        assert_eq!(snapshot.filtered[0].date_display, "10/01/2025");
    }

    #[test]
    fn test_process_ledger_rejects_invalid_config() {
        let config = DashboardConfig {
            refresh_interval_secs: 0,
            ..DashboardConfig::default()
        };
        let result = process_ledger(&RawTable::default(), &FilterCriteria::default(), &config);
        assert!(matches!(result, Err(DashboardError::InvalidConfig(_))));
    }

    #[test]
    fn test_process_envelope_propagates_source_error() {
        let text = r#"google.visualization.Query.setResponse({"status":"error","errors":[{"reason":"access_denied","message":"Access denied","detailed_message":"Sheet is private"}]});"#;
        let result = process_envelope(text, &FilterCriteria::default(), &DashboardConfig::default());
        match result {
            Err(DashboardError::SourceError(msg)) => assert_eq!(msg, "Sheet is private"),
            other => panic!("unexpected result: {:?}", other.map(|s| s.transactions.len())),
        }
    }
}
