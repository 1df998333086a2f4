use chrono::{Datelike, NaiveDate};

pub const CURRENCY_SYMBOL: &str = "S/";
pub const ELLIPSIS: &str = "...";

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Ene", "Feb", "Mar", "Abr", "May", "Jun", "Jul", "Ago", "Sep", "Oct", "Nov", "Dic",
];

const MONTH_NAMES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// Formats an amount in Peruvian Soles following es-PE conventions,
/// e.g. `S/ 1,234.50` (the gap is a non-breaking space).
pub fn format_currency(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let cents = (value.abs() * 100.0).round() as u64;
    let negative = value < 0.0 && cents > 0;

    let whole = group_thousands(cents / 100);
    let sign = if negative { "-" } else { "" };

    format!(
        "{}{}\u{a0}{}.{:02}",
        sign,
        CURRENCY_SYMBOL,
        whole,
        cents % 100
    )
}

pub fn format_signed_currency(value: f64) -> String {
    if value >= 0.0 {
        format!("+{}", format_currency(value))
    } else {
        format_currency(value)
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", round_to(value, 1))
}

fn group_thousands(mut whole: u64) -> String {
    let mut groups = Vec::new();
    loop {
        let group = whole % 1000;
        whole /= 1000;
        if whole == 0 {
            groups.push(group.to_string());
            break;
        }
        groups.push(format!("{:03}", group));
    }
    groups.reverse();
    groups.join(",")
}

/// Rounds half away from zero to a fixed number of decimals.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Truncates to `max_chars` characters, appending `...` when something was cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}{}", head, ELLIPSIS)
    } else {
        text.to_string()
    }
}

pub fn short_name(name: &str) -> String {
    name.split_whitespace().take(2).collect::<Vec<_>>().join(" ")
}

/// Spanish three-letter abbreviation for a two-digit month (`"01"` -> `"Ene"`).
/// Unknown input is returned unchanged.
pub fn month_abbreviation(month: &str) -> String {
    month
        .parse::<usize>()
        .ok()
        .filter(|m| (1..=12).contains(m) && month.len() == 2)
        .map(|m| MONTH_ABBREVIATIONS[m - 1].to_string())
        .unwrap_or_else(|| month.to_string())
}

pub fn month_year_label(date: NaiveDate) -> String {
    format!("{} {}", MONTH_NAMES[date.month0() as usize], date.year())
}

pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

pub fn split_month_key(key: &str) -> (&str, &str) {
    key.split_once('-').unwrap_or((key, ""))
}

/// Chart label for a month key: `"2025-03"` -> `"Mar 25"`.
pub fn month_chart_label(key: &str) -> String {
    let (year, month) = split_month_key(key);
    let short_year: String = year.chars().skip(2).collect();
    format!("{} {}", month_abbreviation(month), short_year)
}

/// `numerator / denominator * 100`, or 0 when the denominator is not positive.
pub fn percentage_of(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator * 100.0
    } else {
        0.0
    }
}
