use crate::engine::Aggregates;
use crate::schema::Transaction;
use crate::utils::percentage_of;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const CONCENTRATION_TOP_N: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RatioBand {
    Excellent,
    Good,
    Caution,
    Critical,
}

impl RatioBand {
    pub fn classify(ratio: f64) -> Self {
        if ratio < 50.0 {
            RatioBand::Excellent
        } else if ratio < 80.0 {
            RatioBand::Good
        } else if ratio < 100.0 {
            RatioBand::Caution
        } else {
            RatioBand::Critical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthOverMonth {
    pub current_month: String,
    pub previous_month: String,
    pub variation: f64,
    pub income_change_pct: f64,
    pub expense_change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concentration {
    pub percentage: f64,
    pub top_projects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveKpis {
    pub expense_ratio: f64,
    pub ratio_band: RatioBand,
    /// `None` with fewer than two transactions.
    pub trend_pct: Option<f64>,
    /// `None` with fewer than two months.
    pub month_over_month: Option<MonthOverMonth>,
    /// `None` when no project brought income.
    pub concentration: Option<Concentration>,
    pub average_liquidity: f64,
}

impl ExecutiveKpis {
    pub fn derive(transactions: &[Transaction], aggregates: &Aggregates) -> Self {
        let expense_ratio = expense_ratio(aggregates);
        Self {
            expense_ratio,
            ratio_band: RatioBand::classify(expense_ratio),
            trend_pct: trend_percentage(transactions),
            month_over_month: month_over_month(aggregates),
            concentration: income_concentration(aggregates, CONCENTRATION_TOP_N),
            average_liquidity: average_monthly_liquidity(aggregates),
        }
    }
}

/// Expenses as a percentage of income; 0 when there is no income.
pub fn expense_ratio(aggregates: &Aggregates) -> f64 {
    percentage_of(aggregates.totals.expense, aggregates.totals.income)
}

pub fn trend_percentage(transactions: &[Transaction]) -> Option<f64> {
    if transactions.len() < 2 {
        return None;
    }
    let first = transactions.first()?.running_balance;
    let last = transactions.last()?.running_balance;
    Some(percentage_of(last - first, first))
}

pub fn month_over_month(aggregates: &Aggregates) -> Option<MonthOverMonth> {
    let months = aggregates.sorted_months();
    let [.., previous_key, current_key] = months.as_slice() else {
        return None;
    };

    let previous = aggregates.by_month.get(*previous_key)?;
    let current = aggregates.by_month.get(*current_key)?;

    Some(MonthOverMonth {
        current_month: current_key.to_string(),
        previous_month: previous_key.to_string(),
        variation: current.balance - previous.balance,
        income_change_pct: percentage_of(current.income - previous.income, previous.income),
        expense_change_pct: percentage_of(current.expense - previous.expense, previous.expense),
    })
}

/// Share of total income brought by the `top_n` projects with the most income.
pub fn income_concentration(aggregates: &Aggregates, top_n: usize) -> Option<Concentration> {
    let total = aggregates.totals.income;
    if total <= 0.0 {
        return None;
    }

    let mut earners: Vec<(&String, f64)> = aggregates
        .by_project
        .iter()
        .filter(|(_, b)| b.income > 0.0)
        .map(|(name, b)| (name, b.income))
        .collect();

    if earners.is_empty() {
        return None;
    }

    earners.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    earners.truncate(top_n);

    let top_sum: f64 = earners.iter().map(|(_, income)| income).sum();

    Some(Concentration {
        percentage: (top_sum / total * 100.0).clamp(0.0, 100.0),
        top_projects: earners.into_iter().map(|(name, _)| name.clone()).collect(),
    })
}

pub fn average_monthly_liquidity(aggregates: &Aggregates) -> f64 {
    let months = aggregates.by_month.len().max(1);
    aggregates.totals.final_balance / months as f64
}
