use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How to read an all-numeric date such as `01/02/2024`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    #[default]
    DayFirst,
    MonthFirst,
}

const ISO_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

const DAY_FIRST_FORMATS: &[&str] = &[
    "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%d/%m/%y", "%d-%m-%y", "%d.%m.%y",
];

const MONTH_FIRST_FORMATS: &[&str] = &[
    "%m/%d/%Y", "%m-%d-%Y", "%m.%d.%Y", "%m/%d/%y", "%m-%d-%y", "%m.%d.%y",
];

// Month names are unambiguous, so these are tried under either order.
const NAMED_MONTH_FORMATS: &[&str] = &[
    "%d-%b-%Y", "%d %b %Y", "%d/%b/%Y", "%d-%b-%y", "%d %b %y", "%d/%b/%y",
    "%d %B %Y", "%d-%B-%Y", "%b %d, %Y", "%B %d, %Y", "%b %d %Y",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct DateParser {
    pub order: DateOrder,
}

impl DateParser {
    pub fn new(order: DateOrder) -> Self {
        Self { order }
    }

    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        parse_locale_date(raw, self.order)
    }
}

/// Parse a statement date. Strings made only of digits are never dates.
pub fn parse_locale_date(raw: &str, order: DateOrder) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() || raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if let Some(date) = try_formats(raw, order) {
        return Some(date);
    }
    // "15/04/2024 10:32:11" and "2024-04-15T00:00:00"
    let date_part = raw
        .split(|c: char| c == 'T' || c.is_whitespace())
        .next()
        .filter(|head| head.len() < raw.len())?;
    let rest = &raw[date_part.len()..];
    if !rest.contains(':') {
        return None;
    }
    try_formats(date_part, order)
}

fn try_formats(raw: &str, order: DateOrder) -> Option<NaiveDate> {
    let numeric = match order {
        DateOrder::DayFirst => DAY_FIRST_FORMATS,
        DateOrder::MonthFirst => MONTH_FIRST_FORMATS,
    };
    ISO_FORMATS
        .iter()
        .chain(numeric)
        .chain(NAMED_MONTH_FORMATS)
        .find_map(|fmt| {
            // %Y happily reads "24" as the year 24
            NaiveDate::parse_from_str(raw, fmt)
                .ok()
                .filter(|d| (1900..=2200).contains(&d.year()))
        })
}

pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    if !serial.is_finite() {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(chrono::Duration::try_days(serial.floor() as i64)?)
}
