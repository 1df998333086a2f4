use crate::engine::{Aggregates, PeriodRange};
use crate::kpi::{ExecutiveKpis, RatioBand};
use crate::rankings::{
    channels_by_total, top_projects_by_expense, top_projects_by_income, top_responsibles,
    ChannelFigure, ProjectFigure, ResponsibleFigure,
};
use crate::utils::{format_currency, format_percent, month_year_label};
use chrono::NaiveDate;
use serde::Serialize;

pub const REPORT_TOP_N: usize = 5;
pub const HIGH_CONCENTRATION_PCT: f64 = 70.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeficitProject {
    pub name: String,
    pub deficit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutiveReport {
    /// Month and year the report was produced, e.g. `"Octubre 2026"`.
    pub issued: String,
    pub period: Option<PeriodRange>,
    pub income: f64,
    pub expense: f64,
    pub final_balance: f64,
    pub transaction_count: usize,
    pub expense_ratio: f64,
    pub ratio_band: RatioBand,
    pub average_liquidity: f64,
    /// 0 when no project brought income.
    pub concentration_pct: f64,
    pub top_income_projects: Vec<ProjectFigure>,
    pub top_expense_projects: Vec<ProjectFigure>,
    pub deficit_projects: Vec<DeficitProject>,
    pub monthly_variation: Option<f64>,
    pub trend_summary: Option<String>,
    pub top_responsibles: Vec<ResponsibleFigure>,
    pub channels: Vec<ChannelFigure>,
    pub conclusions: Vec<String>,
    pub risks: Vec<String>,
    pub opportunities: Vec<String>,
    pub actions: Vec<String>,
}

impl ExecutiveReport {
    pub fn build(aggregates: &Aggregates, kpis: &ExecutiveKpis, issued_on: NaiveDate) -> Self {
        let totals = &aggregates.totals;

        let concentration_pct = kpis
            .concentration
            .as_ref()
            .map(|c| c.percentage)
            .unwrap_or(0.0);

        let deficit_projects: Vec<DeficitProject> = aggregates
            .by_project
            .iter()
            .filter(|(_, b)| b.expense > b.income && b.income > 0.0)
            .map(|(name, b)| DeficitProject {
                name: name.clone(),
                deficit: b.expense - b.income,
            })
            .collect();

        let monthly_variation = kpis.month_over_month.as_ref().map(|m| m.variation);
        let trend_summary = monthly_variation.map(|variation| {
            if variation >= 0.0 {
                format!(
                    "El saldo aumentó {} respecto al mes anterior.",
                    format_currency(variation)
                )
            } else {
                format!(
                    "El saldo disminuyó {} respecto al mes anterior.",
                    format_currency(variation.abs())
                )
            }
        });

        let mut report = Self {
            issued: month_year_label(issued_on),
            period: totals.period.clone(),
            income: totals.income,
            expense: totals.expense,
            final_balance: totals.final_balance,
            transaction_count: totals.count,
            expense_ratio: kpis.expense_ratio,
            ratio_band: kpis.ratio_band,
            average_liquidity: kpis.average_liquidity,
            concentration_pct,
            top_income_projects: top_projects_by_income(aggregates, REPORT_TOP_N),
            top_expense_projects: top_projects_by_expense(aggregates, REPORT_TOP_N),
            deficit_projects,
            monthly_variation,
            trend_summary,
            top_responsibles: top_responsibles(aggregates, REPORT_TOP_N),
            channels: channels_by_total(aggregates),
            conclusions: Vec::new(),
            risks: Vec::new(),
            opportunities: Vec::new(),
            actions: Vec::new(),
        };
        report.diagnose();
        report
    }

    /// Whether the closing note should read as healthy.
    pub fn is_healthy(&self) -> bool {
        self.expense_ratio < 80.0
    }

    fn diagnose(&mut self) {
        let ratio = format_percent(self.expense_ratio);

        match self.ratio_band {
            RatioBand::Excellent => {
                self.conclusions.push(format!(
                    "Gestión financiera EXCELENTE - El ratio de gastos es bajo ({}).",
                    ratio
                ));
                self.opportunities
                    .push("Existe margen para inversiones estratégicas.".to_string());
            }
            RatioBand::Good => {
                self.conclusions.push(format!(
                    "Gestión financiera BUENA - Ratio de gastos moderado ({}).",
                    ratio
                ));
            }
            RatioBand::Caution => {
                self.risks.push(format!(
                    "Los gastos están cerca de igualar los ingresos ({}).",
                    ratio
                ));
                self.actions
                    .push("Revisar y optimizar gastos operativos.".to_string());
            }
            RatioBand::Critical => {
                self.risks.push(format!(
                    "CRÍTICO: Los egresos superan los ingresos ({}).",
                    ratio
                ));
                self.actions
                    .push("Implementar plan de reducción de gastos inmediato.".to_string());
            }
        }

        if !self.deficit_projects.is_empty() {
            self.risks.push(format!(
                "{} proyecto(s) con déficit financiero.",
                self.deficit_projects.len()
            ));
            self.actions
                .push("Evaluar continuidad de proyectos deficitarios.".to_string());
        }

        if self.concentration_pct > HIGH_CONCENTRATION_PCT {
            self.risks.push(format!(
                "Alta concentración de ingresos ({} en Top 3).",
                format_percent(self.concentration_pct)
            ));
            self.opportunities
                .push("Diversificar fuentes de ingreso.".to_string());
        }

        if let Some(best) = self.top_income_projects.first() {
            self.opportunities
                .push(format!("\"{}\" es el proyecto más rentable.", best.name));
        }

        if let Some(person) = self.top_responsibles.first() {
            self.opportunities
                .push(format!("{} es el responsable más activo.", person.name));
        }
    }
}
