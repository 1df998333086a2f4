use crate::schema::Transaction;
use crate::utils::short_name;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Selector value that the dashboard UI uses for "no restriction".
pub const WILDCARD: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FilterField {
    Year,
    Month,
    Project,
    Responsible,
    Channel,
}

/// Five independent equality predicates. `None` matches every transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FilterCriteria {
    #[schemars(description = "Four digit year, e.g. \"2025\"")]
    #[serde(default, deserialize_with = "selector_value")]
    #[schemars(with = "Option<String>")]
    pub year: Option<String>,

    #[schemars(description = "Two digit month, e.g. \"03\"")]
    #[serde(default, deserialize_with = "selector_value")]
    #[schemars(with = "Option<String>")]
    pub month: Option<String>,

    #[serde(default, deserialize_with = "selector_value")]
    #[schemars(with = "Option<String>")]
    pub project: Option<String>,

    #[serde(default, deserialize_with = "selector_value")]
    #[schemars(with = "Option<String>")]
    pub responsible: Option<String>,

    #[schemars(description = "Payment channel")]
    #[serde(default, deserialize_with = "selector_value")]
    #[schemars(with = "Option<String>")]
    pub channel: Option<String>,
}

impl FilterCriteria {
    pub fn is_wildcard(&self) -> bool {
        self.year.is_none()
            && self.month.is_none()
            && self.project.is_none()
            && self.responsible.is_none()
            && self.channel.is_none()
    }

    /// Sets one field from a selector value; `"all"` or an empty value clears it.
    pub fn set(&mut self, field: FilterField, value: &str) {
        *self.slot_mut(field) = selector(value);
    }

    pub fn with(mut self, field: FilterField, value: &str) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: FilterField) -> Option<&str> {
        match field {
            FilterField::Year => self.year.as_deref(),
            FilterField::Month => self.month.as_deref(),
            FilterField::Project => self.project.as_deref(),
            FilterField::Responsible => self.responsible.as_deref(),
            FilterField::Channel => self.channel.as_deref(),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        fn check(criterion: &Option<String>, value: Option<&str>) -> bool {
            match criterion {
                None => true,
                Some(expected) => value == Some(expected.as_str()),
            }
        }

        check(&self.year, transaction.year.as_deref())
            && check(&self.month, transaction.month.as_deref())
            && check(&self.project, Some(transaction.project.as_str()))
            && check(&self.responsible, Some(transaction.responsible.as_str()))
            && check(&self.channel, Some(transaction.channel.as_str()))
    }

    fn slot_mut(&mut self, field: FilterField) -> &mut Option<String> {
        match field {
            FilterField::Year => &mut self.year,
            FilterField::Month => &mut self.month,
            FilterField::Project => &mut self.project,
            FilterField::Responsible => &mut self.responsible,
            FilterField::Channel => &mut self.channel,
        }
    }
}

fn selector(value: &str) -> Option<String> {
    match value {
        "" | WILDCARD => None,
        other => Some(other.to_string()),
    }
}

fn selector_value<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(selector))
}

/// Keeps the transactions that satisfy every criterion, in ledger order.
pub fn apply(transactions: &[Transaction], criteria: &FilterCriteria) -> Vec<Transaction> {
    if criteria.is_wildcard() {
        return transactions.to_vec();
    }
    transactions
        .iter()
        .filter(|t| criteria.matches(t))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectorOption {
    pub value: String,
    pub label: String,
}

/// Distinct values available for each selector, sorted and without blanks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub years: Vec<String>,
    pub months: Vec<String>,
    pub projects: Vec<String>,
    pub responsibles: Vec<SelectorOption>,
    pub channels: Vec<String>,
}

impl FilterOptions {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut years = BTreeSet::new();
        let mut months = BTreeSet::new();
        let mut projects = BTreeSet::new();
        let mut responsibles = BTreeSet::new();
        let mut channels = BTreeSet::new();

        for t in transactions {
            if let Some(year) = &t.year {
                years.insert(year.clone());
            }
            if let Some(month) = &t.month {
                months.insert(month.clone());
            }
            insert_non_empty(&mut projects, &t.project);
            insert_non_empty(&mut responsibles, &t.responsible);
            insert_non_empty(&mut channels, &t.channel);
        }

        Self {
            years: years.into_iter().collect(),
            months: months.into_iter().collect(),
            projects: projects.into_iter().collect(),
            responsibles: responsibles
                .into_iter()
                .map(|name| SelectorOption {
                    label: short_name(&name),
                    value: name,
                })
                .collect(),
            channels: channels.into_iter().collect(),
        }
    }
}

fn insert_non_empty(set: &mut BTreeSet<String>, value: &str) {
    if !value.is_empty() {
        set.insert(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(seq: &str, ym: Option<(&str, &str)>, project: &str, responsible: &str, channel: &str) -> Transaction {
        Transaction {
            sequence: seq.to_string(),
            date: None,
            year: ym.map(|(y, _)| y.to_string()),
            month: ym.map(|(_, m)| m.to_string()),
            date_display: String::new(),
            time_display: String::new(),
            responsible: responsible.to_string(),
            description: "mov".to_string(),
            channel: channel.to_string(),
            income: 10.0,
            project: project.to_string(),
            expense: 0.0,
            running_balance: 0.0,
        }
    }

    fn sample() -> Vec<Transaction> {
        vec![
            tx("1", Some(("2024", "12")), "Obra Norte", "Ana Pérez", "Efectivo"),
            tx("2", Some(("2025", "01")), "Obra Norte", "Luis Gómez", "Yape"),
            tx("3", None, "Taller", "Ana Pérez", "Yape"),
            tx("4", Some(("2025", "02")), "", "Luis Gómez", ""),
            tx("5", Some(("2025", "01")), "Taller", "Ana Pérez", "Transferencia"),
        ]
    }

    fn sequences(txs: &[Transaction]) -> Vec<&str> {
        txs.iter().map(|t| t.sequence.as_str()).collect()
    }

    #[test]
    fn test_wildcard_returns_everything_in_order() {
        let txs = sample();
        assert_eq!(apply(&txs, &FilterCriteria::default()), txs);
    }

    #[test]
    fn test_single_criteria() {
        let txs = sample();
        let by_year = FilterCriteria::default().with(FilterField::Year, "2025");
        assert_eq!(sequences(&apply(&txs, &by_year)), vec!["2", "4", "5"]);

        let by_channel = FilterCriteria::default().with(FilterField::Channel, "Yape");
        assert_eq!(sequences(&apply(&txs, &by_channel)), vec!["2", "3"]);
    }

    #[test]
    fn test_conjunction_is_order_independent() {
        let txs = sample();
        let a = FilterCriteria::default()
            .with(FilterField::Responsible, "Ana Pérez")
            .with(FilterField::Month, "01");
        let b = FilterCriteria::default()
            .with(FilterField::Month, "01")
            .with(FilterField::Responsible, "Ana Pérez");
        assert_eq!(a, b);
        assert_eq!(sequences(&apply(&txs, &a)), vec!["5"]);
    }

    #[test]
    fn test_undated_transactions_fail_date_criteria() {
        let txs = sample();
        let criteria = FilterCriteria::default().with(FilterField::Project, "Taller");
        assert_eq!(sequences(&apply(&txs, &criteria)), vec!["3", "5"]);

        let dated = criteria.with(FilterField::Year, "2025");
        assert_eq!(sequences(&apply(&txs, &dated)), vec!["5"]);
    }

    #[test]
    fn test_no_partial_matching() {
        let txs = sample();
        let criteria = FilterCriteria::default().with(FilterField::Project, "Obra");
        assert!(apply(&txs, &criteria).is_empty());
    }

    #[test]
    fn test_set_all_and_clear() {
        let mut criteria = FilterCriteria::default().with(FilterField::Project, "Taller");
        assert_eq!(criteria.get(FilterField::Project), Some("Taller"));

        criteria.set(FilterField::Project, WILDCARD);
        assert!(criteria.is_wildcard());

        criteria.set(FilterField::Year, "2025");
        criteria.set(FilterField::Channel, "Yape");
        criteria.clear();
        assert!(criteria.is_wildcard());
    }

    #[test]
    fn test_filter_options() {
        let options = FilterOptions::from_transactions(&sample());
        assert_eq!(options.years, vec!["2024", "2025"]);
        assert_eq!(options.months, vec!["01", "02", "12"]);
        assert_eq!(options.projects, vec!["Obra Norte", "Taller"]);
        assert_eq!(options.channels, vec!["Efectivo", "Transferencia", "Yape"]);
        assert_eq!(
            options.responsibles,
            vec![
                SelectorOption {
                    value: "Ana Pérez".to_string(),
                    label: "Ana Pérez".to_string()
                },
                SelectorOption {
                    value: "Luis Gómez".to_string(),
                    label: "Luis Gómez".to_string()
                },
            ]
        );
    }
}
