use crate::engine::Aggregates;
use crate::schema::{AlertThresholds, Transaction};
use crate::utils::{format_currency, month_abbreviation, split_month_key, truncate_text};
use log::debug;
use serde::{Deserialize, Serialize};

pub const DESCRIPTION_MAX_CHARS: usize = 40;
pub const PROJECT_NAME_MAX_CHARS: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Danger,
}

/// Which rule produced the alert. Renderers use it to pick an icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    LargeExpense,
    HighMonthlyExpense,
    ProjectDeficit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    pub category: AlertCategory,
    pub message: String,
    /// The amount the rule fired on: the expense, the monthly total or the deficit.
    pub amount: f64,
}

/// Runs every rule against the current snapshot.
///
/// Output order is fixed: single expenses in transaction order, then months
/// in chronological order, then projects in name order.
pub fn evaluate(
    transactions: &[Transaction],
    aggregates: &Aggregates,
    thresholds: &AlertThresholds,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    alerts.extend(large_expense_alerts(transactions, thresholds.single_expense));
    alerts.extend(monthly_expense_alerts(aggregates, thresholds.monthly_expense));
    alerts.extend(project_deficit_alerts(aggregates));

    debug!("Alert evaluation produced {} alerts", alerts.len());
    alerts
}

fn large_expense_alerts(transactions: &[Transaction], threshold: f64) -> Vec<Alert> {
    transactions
        .iter()
        .filter(|t| t.expense > threshold)
        .map(|t| Alert {
            severity: Severity::Warning,
            category: AlertCategory::LargeExpense,
            message: format!(
                "Egreso elevado: {} - \"{}\"",
                format_currency(t.expense),
                truncate_text(&t.description, DESCRIPTION_MAX_CHARS)
            ),
            amount: t.expense,
        })
        .collect()
}

fn monthly_expense_alerts(aggregates: &Aggregates, threshold: f64) -> Vec<Alert> {
    aggregates
        .sorted_months()
        .into_iter()
        .filter_map(|key| aggregates.by_month.get(key).map(|b| (key, b)))
        .filter(|(_, bucket)| bucket.expense > threshold)
        .map(|(key, bucket)| {
            let (year, month) = split_month_key(key);
            Alert {
                severity: Severity::Warning,
                category: AlertCategory::HighMonthlyExpense,
                message: format!(
                    "Egresos mensuales altos: {} {} = {}",
                    month_abbreviation(month),
                    year,
                    format_currency(bucket.expense)
                ),
                amount: bucket.expense,
            }
        })
        .collect()
}

/// Projects spending more than they brought in. A project with no income at
/// all is unfunded rather than in deficit and is not reported.
fn project_deficit_alerts(aggregates: &Aggregates) -> Vec<Alert> {
    aggregates
        .by_project
        .iter()
        .filter(|(_, b)| b.expense > b.income && b.income > 0.0)
        .map(|(name, b)| {
            let deficit = b.expense - b.income;
            Alert {
                severity: Severity::Danger,
                category: AlertCategory::ProjectDeficit,
                message: format!(
                    "Proyecto en rojo: \"{}\" - Déficit: {}",
                    truncate_text(name, PROJECT_NAME_MAX_CHARS),
                    format_currency(deficit)
                ),
                amount: deficit,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{FlowBucket, MonthBucket};

    fn expense_tx(description: &str, expense: f64) -> Transaction {
        Transaction {
            sequence: "1".to_string(),
            date: None,
            year: None,
            month: None,
            date_display: String::new(),
            time_display: String::new(),
            responsible: String::new(),
            description: description.to_string(),
            channel: String::new(),
            income: 0.0,
            project: String::new(),
            expense,
            running_balance: 0.0,
        }
    }

    #[test]
    fn test_single_expense_threshold_is_strict() {
        let txs = vec![
            expense_tx("Justo en el límite", 200.0),
            expense_tx("Compra de andamios y herramientas para la obra principal", 200.01),
        ];
        let alerts = evaluate(&txs, &Aggregates::default(), &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert_eq!(alerts[0].category, AlertCategory::LargeExpense);
        assert_eq!(
            alerts[0].message,
            "Egreso elevado: S/\u{a0}200.01 - \"Compra de andamios y herramientas para l...\""
        );
    }

    #[test]
    fn test_monthly_expense_alert_names_month() {
        let mut agg = Aggregates::default();
        agg.by_month.insert(
            "2025-03".to_string(),
            MonthBucket { income: 0.0, expense: 1500.0, balance: 0.0 },
        );
        agg.by_month.insert(
            "2025-01".to_string(),
            MonthBucket { income: 0.0, expense: 600.0, balance: 0.0 },
        );
        agg.by_month.insert(
            "2025-02".to_string(),
            MonthBucket { income: 0.0, expense: 500.0, balance: 0.0 },
        );

        let alerts = evaluate(&[], &agg, &AlertThresholds::default());
        let messages: Vec<&str> = alerts.iter().map(|a| a.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Egresos mensuales altos: Ene 2025 = S/\u{a0}600.00",
                "Egresos mensuales altos: Mar 2025 = S/\u{a0}1,500.00",
            ]
        );
    }

    #[test]
    fn test_deficit_requires_income() {
        let mut agg = Aggregates::default();
        agg.by_project.insert(
            "Sin fondos".to_string(),
            FlowBucket { income: 0.0, expense: 300.0 },
        );
        agg.by_project.insert(
            "Remodelación integral del local central".to_string(),
            FlowBucket { income: 100.0, expense: 300.0 },
        );

        let alerts = evaluate(&[], &agg, &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Danger);
        assert_eq!(alerts[0].amount, 200.0);
        assert_eq!(
            alerts[0].message,
            "Proyecto en rojo: \"Remodelación integral del...\" - Déficit: S/\u{a0}200.00"
        );
    }

    #[test]
    fn test_rule_classes_are_concatenated_in_order() {
        let txs = vec![expense_tx("Grande", 900.0)];
        let mut agg = Aggregates::default();
        agg.by_project
            .insert("A".to_string(), FlowBucket { income: 10.0, expense: 900.0 });
        agg.by_month.insert(
            "2025-01".to_string(),
            MonthBucket { income: 10.0, expense: 900.0, balance: 0.0 },
        );

        let categories: Vec<AlertCategory> = evaluate(&txs, &agg, &AlertThresholds::default())
            .into_iter()
            .map(|a| a.category)
            .collect();
        assert_eq!(
            categories,
            vec![
                AlertCategory::LargeExpense,
                AlertCategory::HighMonthlyExpense,
                AlertCategory::ProjectDeficit
            ]
        );
    }

    #[test]
    fn test_custom_thresholds() {
        let txs = vec![expense_tx("Pintura", 150.0)];
        let thresholds = AlertThresholds {
            single_expense: 100.0,
            monthly_expense: 10_000.0,
        };
        assert_eq!(evaluate(&txs, &Aggregates::default(), &thresholds).len(), 1);
    }
}
