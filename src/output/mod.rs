pub mod csv;
pub mod json;
pub mod table;

use chrono::NaiveDate;

use crate::model::NEVER_EXPIRES_DAYS;

pub fn fmt_usd(value: f64) -> String {
    format!("${value:.2}")
}

pub fn fmt_date(value: Option<NaiveDate>) -> String {
    value.map(|d| d.to_string()).unwrap_or_default()
}

/// Open-ended contracts render as "-" instead of the sentinel.
pub fn fmt_days_remaining(days: i64) -> String {
    if days == NEVER_EXPIRES_DAYS {
        "-".to_string()
    } else {
        days.to_string()
    }
}
