//! Per-cell predicates used by block location and role inference.

use crate::dates::{parse_locale_date, DateOrder};
use crate::grid::Cell;

/// Strip currency noise and thousands separators from an amount string.
fn clean_amount(raw: &str) -> String {
    let mut s = raw.trim().to_string();
    for noise in ["INR", "Rs.", "Rs", "\u{20b9}", "$", "\"", ","] {
        s = s.replace(noise, "");
    }
    s.trim().to_string()
}

fn looks_numeric(s: &str) -> bool {
    let s = s.strip_prefix(['-', '+']).unwrap_or(s);
    let mut parts = s.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();
    let int_ok = int_part.chars().all(|c| c.is_ascii_digit());
    let frac_ok = frac_part.map_or(true, |f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()));
    int_ok && frac_ok && (!int_part.is_empty() || frac_part.is_some())
}

pub fn is_numeric(cell: &Cell) -> bool {
    match cell {
        Cell::Number(_) => true,
        Cell::Text(s) => {
            let trimmed = s.trim();
            // A comma only groups digits (1,234 or 1,23,456), never ends a value.
            let grouped_ok = trimmed
                .split(',')
                .skip(1)
                .all(|group| group.chars().take(2).filter(|c| c.is_ascii_digit()).count() == 2);
            let cleaned = clean_amount(trimmed);
            // accounting style: (500.00) is a negative amount
            let unsigned = cleaned
                .strip_prefix('(')
                .and_then(|v| v.strip_suffix(')'))
                .map_or(cleaned.as_str(), str::trim);
            grouped_ok && looks_numeric(unsigned)
        }
        _ => false,
    }
}

pub fn is_date_like(cell: &Cell, order: DateOrder) -> bool {
    match cell {
        Cell::Date(_) => true,
        Cell::Text(s) => !is_numeric(cell) && parse_locale_date(s, order).is_some(),
        _ => false,
    }
}

pub fn has_alnum_mix(cell: &Cell) -> bool {
    match cell {
        Cell::Text(s) => {
            s.chars().any(|c| c.is_alphabetic()) && s.chars().any(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

/// Numeric value of a cell, `None` when it does not hold a number.
pub fn cell_amount(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) => Some(*n),
        Cell::Text(_) if is_numeric(cell) => parse_amount(&cell.to_string()),
        _ => None,
    }
}

pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = clean_amount(raw);
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<f64>().ok().map(|v| -v);
    }
    s.parse().ok()
}
