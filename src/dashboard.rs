use crate::alerts::{self, Alert};
use crate::engine::{aggregate, Aggregates};
use crate::error::{DashboardError, Result};
use crate::filter::{self, FilterCriteria, FilterField, FilterOptions};
use crate::ingestion::{normalize, parse_gviz_response};
use crate::kpi::ExecutiveKpis;
use crate::report::ExecutiveReport;
use crate::schema::{AlertThresholds, DashboardConfig, RawTable, Transaction, TransactionView};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableFilter {
    #[default]
    All,
    Income,
    Expense,
}

/// Everything the presentation layer reads, derived in one pass from the
/// canonical ledger and the active criteria. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub transactions: Arc<Vec<Transaction>>,
    pub criteria: FilterCriteria,
    pub thresholds: AlertThresholds,
    pub filtered: Vec<Transaction>,
    pub aggregates: Aggregates,
    pub kpis: ExecutiveKpis,
    pub alerts: Vec<Alert>,
}

impl DashboardSnapshot {
    pub fn build(
        transactions: Arc<Vec<Transaction>>,
        criteria: FilterCriteria,
        thresholds: AlertThresholds,
    ) -> Self {
        let filtered = filter::apply(&transactions, &criteria);
        let aggregates = aggregate(&filtered);
        let kpis = ExecutiveKpis::derive(&filtered, &aggregates);
        let alerts = alerts::evaluate(&filtered, &aggregates, &thresholds);

        debug!(
            "Snapshot built: {} of {} transactions pass the filters, {} alerts",
            filtered.len(),
            transactions.len(),
            alerts.len()
        );

        Self {
            transactions,
            criteria,
            thresholds,
            filtered,
            aggregates,
            kpis,
            alerts,
        }
    }

    pub fn empty(criteria: FilterCriteria, thresholds: AlertThresholds) -> Self {
        Self::build(Arc::new(Vec::new()), criteria, thresholds)
    }

    pub fn transaction_views(&self) -> Vec<TransactionView> {
        self.filtered
            .iter()
            .map(|t| TransactionView::new(t, self.thresholds.single_expense))
            .collect()
    }

    /// Most recent filtered movements first, optionally only income or expense.
    pub fn recent_transactions(&self, table_filter: TableFilter, limit: usize) -> Vec<TransactionView> {
        self.filtered
            .iter()
            .rev()
            .filter(|t| match table_filter {
                TableFilter::All => true,
                TableFilter::Income => t.income > 0.0,
                TableFilter::Expense => t.expense > 0.0,
            })
            .take(limit)
            .map(|t| TransactionView::new(t, self.thresholds.single_expense))
            .collect()
    }

    /// Selector values come from the whole ledger, not the filtered view.
    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions::from_transactions(&self.transactions)
    }

    pub fn report(&self, issued_on: NaiveDate) -> ExecutiveReport {
        ExecutiveReport::build(&self.aggregates, &self.kpis, issued_on)
    }
}

/// Handle for one in-flight refresh. Tickets are ordered by issue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

impl RefreshTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Owner of the current snapshot.
///
/// Every refresh or filter change swaps in a complete new snapshot. A failed
/// refresh keeps the previous one, and a refresh that completes after a
/// newer one has been applied is rejected.
#[derive(Debug)]
pub struct Dashboard {
    config: DashboardConfig,
    current: Arc<DashboardSnapshot>,
    next_ticket: u64,
    applied_ticket: Option<u64>,
    last_refreshed: Option<DateTime<Utc>>,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Self {
        let current = Arc::new(DashboardSnapshot::empty(
            config.initial_filters.clone(),
            config.thresholds,
        ));
        Self {
            config,
            current,
            next_ticket: 0,
            applied_ticket: None,
            last_refreshed: None,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<DashboardSnapshot> {
        Arc::clone(&self.current)
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    pub fn filter_options(&self) -> FilterOptions {
        self.current.filter_options()
    }

    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.next_ticket += 1;
        RefreshTicket(self.next_ticket)
    }

    /// Applies the outcome of a fetch started with `ticket`.
    pub fn complete_refresh(
        &mut self,
        ticket: RefreshTicket,
        fetched: Result<RawTable>,
    ) -> Result<Arc<DashboardSnapshot>> {
        if let Some(applied) = self.applied_ticket {
            if ticket.0 < applied {
                warn!(
                    "Discarding refresh #{}: refresh #{} already applied",
                    ticket.0, applied
                );
                return Err(DashboardError::SupersededRefresh {
                    ticket: ticket.0,
                    applied,
                });
            }
        }

        let table = fetched.inspect_err(|e| {
            warn!("Refresh #{} failed, keeping previous data: {}", ticket.0, e);
        })?;

        let transactions = Arc::new(normalize(&table));
        info!(
            "Refresh #{} loaded {} transactions",
            ticket.0,
            transactions.len()
        );

        self.current = Arc::new(DashboardSnapshot::build(
            transactions,
            self.current.criteria.clone(),
            self.config.thresholds,
        ));
        self.applied_ticket = Some(ticket.0);
        self.last_refreshed = Some(Utc::now());

        Ok(self.snapshot())
    }

    pub fn load(&mut self, table: RawTable) -> Result<Arc<DashboardSnapshot>> {
        let ticket = self.begin_refresh();
        self.complete_refresh(ticket, Ok(table))
    }

    /// Loads the raw text answered by the spreadsheet endpoint.
    pub fn refresh_from_envelope(&mut self, text: &str) -> Result<Arc<DashboardSnapshot>> {
        let ticket = self.begin_refresh();
        self.complete_refresh(ticket, parse_gviz_response(text))
    }

    pub fn set_filter(&mut self, field: FilterField, value: &str) -> Arc<DashboardSnapshot> {
        let criteria = self.current.criteria.clone().with(field, value);
        self.set_criteria(criteria)
    }

    pub fn clear_filters(&mut self) -> Arc<DashboardSnapshot> {
        self.set_criteria(FilterCriteria::default())
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) -> Arc<DashboardSnapshot> {
        self.current = Arc::new(DashboardSnapshot::build(
            Arc::clone(&self.current.transactions),
            criteria,
            self.config.thresholds,
        ));
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Cell, CellValue, RawRow};

    fn row(seq: f64, date: &str, project: &str, income: f64, expense: f64, balance: f64) -> RawRow {
        let text = |s: &str| Some(Cell::value(CellValue::Text(s.to_string())));
        let num = |n: f64| Some(Cell::value(CellValue::Number(n)));
        RawRow::new(vec![
            None,
            num(seq),
            text(date),
            None,
            text("Ana Pérez"),
            text("movimiento"),
            text("Yape"),
            None,
            num(income),
            text(project),
            num(expense),
            num(balance),
        ])
    }

    fn table(rows: Vec<RawRow>) -> RawTable {
        let mut all = vec![RawRow::default(), RawRow::default()];
        all.extend(rows);
        RawTable::new(all)
    }

    fn ledger() -> RawTable {
        table(vec![
            row(1.0, "Date(2025,0,5)", "A", 1000.0, 0.0, 1000.0),
            row(2.0, "Date(2025,1,7)", "A", 0.0, 250.0, 750.0),
            row(3.0, "Date(2025,1,9)", "B", 300.0, 0.0, 1050.0),
        ])
    }

    #[test]
    fn test_new_dashboard_is_empty() {
        let dashboard = Dashboard::new(DashboardConfig::default());
        let snapshot = dashboard.snapshot();
        assert!(snapshot.filtered.is_empty());
        assert!(snapshot.alerts.is_empty());
        assert!(dashboard.last_refreshed().is_none());
    }

    #[test]
    fn test_load_and_filter() {
        let mut dashboard = Dashboard::new(DashboardConfig::default());
        let snapshot = dashboard.load(ledger()).unwrap();
        assert_eq!(snapshot.aggregates.totals.count, 3);
        assert_eq!(snapshot.aggregates.totals.final_balance, 1050.0);
        assert_eq!(snapshot.alerts.len(), 1);

        let filtered = dashboard.set_filter(FilterField::Project, "B");
        assert_eq!(filtered.aggregates.totals.count, 1);
        assert_eq!(filtered.aggregates.totals.income, 300.0);
        assert_eq!(filtered.transactions.len(), 3);
        assert!(filtered.alerts.is_empty());

        let cleared = dashboard.clear_filters();
        assert_eq!(cleared.aggregates.totals.count, 3);
    }

    #[test]
    fn test_filters_survive_refresh() {
        let mut dashboard = Dashboard::new(DashboardConfig::default());
        dashboard.set_filter(FilterField::Month, "02");
        let snapshot = dashboard.load(ledger()).unwrap();
        assert_eq!(snapshot.criteria.month.as_deref(), Some("02"));
        assert_eq!(snapshot.filtered.len(), 2);
    }

    #[test]
    fn test_failed_refresh_keeps_previous_snapshot() {
        let mut dashboard = Dashboard::new(DashboardConfig::default());
        let good = dashboard.load(ledger()).unwrap();

        let err = dashboard.refresh_from_envelope("<html>offline</html>").unwrap_err();
        assert!(matches!(err, DashboardError::MalformedEnvelope(_)));
        assert!(Arc::ptr_eq(&good, &dashboard.snapshot()));
    }

    #[test]
    fn test_superseded_refresh_is_rejected() {
        let mut dashboard = Dashboard::new(DashboardConfig::default());
        let slow = dashboard.begin_refresh();
        let fast = dashboard.begin_refresh();
        assert!(slow < fast);

        let newer = table(vec![row(9.0, "Date(2025,2,1)", "C", 50.0, 0.0, 50.0)]);
        dashboard.complete_refresh(fast, Ok(newer)).unwrap();

        let err = dashboard.complete_refresh(slow, Ok(ledger())).unwrap_err();
        assert!(matches!(
            err,
            DashboardError::SupersededRefresh { ticket: 1, applied: 2 }
        ));
        assert_eq!(dashboard.snapshot().transactions.len(), 1);
        assert_eq!(dashboard.snapshot().transactions[0].project, "C");
    }

    #[test]
    fn test_refresh_replaces_instead_of_merging() {
        let mut dashboard = Dashboard::new(DashboardConfig::default());
        dashboard.load(ledger()).unwrap();
        let snapshot = dashboard
            .load(table(vec![row(1.0, "Date(2025,0,5)", "A", 10.0, 0.0, 10.0)]))
            .unwrap();
        assert_eq!(snapshot.transactions.len(), 1);
        assert_eq!(snapshot.aggregates.totals.income, 10.0);
    }

    #[test]
    fn test_recent_transactions_table() {
        let mut dashboard = Dashboard::new(DashboardConfig::default());
        let snapshot = dashboard.load(ledger()).unwrap();

        let recent: Vec<String> = snapshot
            .recent_transactions(TableFilter::All, 2)
            .into_iter()
            .map(|v| v.transaction.sequence)
            .collect();
        assert_eq!(recent, vec!["3", "2"]);

        let expenses = snapshot.recent_transactions(TableFilter::Expense, 15);
        assert_eq!(expenses.len(), 1);
        assert!(!expenses[0].is_income);
        assert_eq!(expenses[0].status, crate::schema::TransactionStatus::Alert);

        let income = snapshot.recent_transactions(TableFilter::Income, 15);
        assert_eq!(income.len(), 2);
        assert!(income.iter().all(|v| v.is_income));
    }

    #[test]
    fn test_initial_filters_from_config() {
        let config = DashboardConfig {
            initial_filters: FilterCriteria::default().with(FilterField::Year, "2024"),
            ..DashboardConfig::default()
        };
        let mut dashboard = Dashboard::new(config);
        let snapshot = dashboard.load(ledger()).unwrap();
        assert!(snapshot.filtered.is_empty());
        assert_eq!(snapshot.aggregates.totals.income, 0.0);
        assert_eq!(snapshot.kpis.expense_ratio, 0.0);
        assert_eq!(dashboard.filter_options().years, vec!["2025"]);
    }
}
