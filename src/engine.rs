use crate::schema::Transaction;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowBucket {
    pub income: f64,
    pub expense: f64,
}

impl FlowBucket {
    pub fn net(&self) -> f64 {
        self.income - self.expense
    }

    pub fn activity(&self) -> f64 {
        self.income + self.expense
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthBucket {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelBucket {
    pub count: usize,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRange {
    pub first: String,
    pub last: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub income: f64,
    pub expense: f64,
    pub count: usize,
    pub income_count: usize,
    pub expense_count: usize,
    /// Running balance of the last transaction processed. Never a sum.
    pub final_balance: f64,
    pub first_balance: f64,
    pub period: Option<PeriodRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    pub totals: Totals,
    pub by_project: BTreeMap<String, FlowBucket>,
    pub by_responsible: BTreeMap<String, FlowBucket>,
    /// Keyed by `"YYYY-MM"`, so key order is chronological.
    pub by_month: BTreeMap<String, MonthBucket>,
    pub by_channel: BTreeMap<String, ChannelBucket>,
}

impl Aggregates {
    pub fn is_empty(&self) -> bool {
        self.totals.count == 0
    }

    pub fn sorted_months(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.by_month.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

/// Balances are last-value-wins, for the totals and inside every month bucket.
pub fn aggregate(transactions: &[Transaction]) -> Aggregates {
    let mut agg = Aggregates::default();

    for t in transactions {
        let totals = &mut agg.totals;
        totals.income += t.income;
        totals.expense += t.expense;
        totals.count += 1;
        if t.income > 0.0 {
            totals.income_count += 1;
        }
        if t.expense > 0.0 {
            totals.expense_count += 1;
        }
        totals.final_balance = t.running_balance;

        if !t.project.is_empty() {
            let bucket = agg.by_project.entry(t.project.clone()).or_default();
            bucket.income += t.income;
            bucket.expense += t.expense;
        }

        if !t.responsible.is_empty() {
            let bucket = agg.by_responsible.entry(t.responsible.clone()).or_default();
            bucket.income += t.income;
            bucket.expense += t.expense;
        }

        if let Some(key) = t.month_key() {
            let bucket = agg.by_month.entry(key).or_default();
            bucket.income += t.income;
            bucket.expense += t.expense;
            bucket.balance = t.running_balance;
        }

        if !t.channel.is_empty() {
            let bucket = agg.by_channel.entry(t.channel.clone()).or_default();
            bucket.count += 1;
            bucket.total += t.income + t.expense;
        }
    }

    if let (Some(first), Some(last)) = (transactions.first(), transactions.last()) {
        agg.totals.first_balance = first.running_balance;
        agg.totals.period = Some(PeriodRange {
            first: first.date_display.clone(),
            last: last.date_display.clone(),
        });
    }

    debug!(
        "Aggregated {} transactions into {} projects, {} responsibles, {} months, {} channels",
        agg.totals.count,
        agg.by_project.len(),
        agg.by_responsible.len(),
        agg.by_month.len(),
        agg.by_channel.len()
    );

    agg
}
