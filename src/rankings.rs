use crate::engine::Aggregates;
use crate::utils::month_chart_label;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectFigure {
    pub name: String,
    pub income: f64,
    pub expense: f64,
    /// Income minus expense.
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponsibleFigure {
    pub name: String,
    pub income: f64,
    pub expense: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelFigure {
    pub name: String,
    pub count: usize,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthPoint {
    pub key: String,
    /// Short label such as `"Mar 25"`.
    pub label: String,
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

fn project_figures(aggregates: &Aggregates) -> Vec<ProjectFigure> {
    aggregates
        .by_project
        .iter()
        .map(|(name, b)| ProjectFigure {
            name: name.clone(),
            income: b.income,
            expense: b.expense,
            balance: b.net(),
        })
        .collect()
}

fn sort_desc_by<T>(items: &mut [T], key: impl Fn(&T) -> f64, name: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| key(b).total_cmp(&key(a)).then_with(|| name(a).cmp(name(b))));
}

/// Projects with positive income, highest first.
pub fn top_projects_by_income(aggregates: &Aggregates, limit: usize) -> Vec<ProjectFigure> {
    let mut projects: Vec<_> = project_figures(aggregates)
        .into_iter()
        .filter(|p| p.income > 0.0)
        .collect();
    sort_desc_by(&mut projects, |p| p.income, |p| p.name.as_str());
    projects.truncate(limit);
    projects
}

/// Projects with positive expense, highest first.
pub fn top_projects_by_expense(aggregates: &Aggregates, limit: usize) -> Vec<ProjectFigure> {
    let mut projects: Vec<_> = project_figures(aggregates)
        .into_iter()
        .filter(|p| p.expense > 0.0)
        .collect();
    sort_desc_by(&mut projects, |p| p.expense, |p| p.name.as_str());
    projects.truncate(limit);
    projects
}

/// Net balance of every project with any movement, best first.
pub fn project_health(aggregates: &Aggregates) -> Vec<ProjectFigure> {
    let mut projects: Vec<_> = project_figures(aggregates)
        .into_iter()
        .filter(|p| p.income > 0.0 || p.expense > 0.0)
        .collect();
    sort_desc_by(&mut projects, |p| p.balance, |p| p.name.as_str());
    projects
}

/// Responsible parties ordered by how much money went through them.
pub fn top_responsibles(aggregates: &Aggregates, limit: usize) -> Vec<ResponsibleFigure> {
    let mut people: Vec<_> = aggregates
        .by_responsible
        .iter()
        .map(|(name, b)| ResponsibleFigure {
            name: name.clone(),
            income: b.income,
            expense: b.expense,
        })
        .collect();
    sort_desc_by(&mut people, |r| r.income + r.expense, |r| r.name.as_str());
    people.truncate(limit);
    people
}

fn channel_figures(aggregates: &Aggregates) -> Vec<ChannelFigure> {
    aggregates
        .by_channel
        .iter()
        .map(|(name, b)| ChannelFigure {
            name: name.clone(),
            count: b.count,
            total: b.total,
        })
        .collect()
}

pub fn channels_by_count(aggregates: &Aggregates) -> Vec<ChannelFigure> {
    let mut channels = channel_figures(aggregates);
    sort_desc_by(&mut channels, |c| c.count as f64, |c| c.name.as_str());
    channels
}

pub fn channels_by_total(aggregates: &Aggregates) -> Vec<ChannelFigure> {
    let mut channels = channel_figures(aggregates);
    sort_desc_by(&mut channels, |c| c.total, |c| c.name.as_str());
    channels
}

/// One point per month, oldest first.
pub fn monthly_series(aggregates: &Aggregates) -> Vec<MonthPoint> {
    aggregates
        .sorted_months()
        .into_iter()
        .filter_map(|key| {
            aggregates.by_month.get(key).map(|b| MonthPoint {
                key: key.to_string(),
                label: month_chart_label(key),
                income: b.income,
                expense: b.expense,
                balance: b.balance,
            })
        })
        .collect()
}
