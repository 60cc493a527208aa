//! Column role inference: which numeric columns are credit, debit and
//! running balance.
//!
//! Every ordered triple of numeric-candidate columns is scored by how well
//! `credit - debit` on each row reproduces the change in balance from the
//! previous row. Both row orientations are tried, since statements are
//! printed newest-first about as often as oldest-first.

use tracing::debug;

use crate::classify::{cell_amount, is_date_like, is_numeric};
use crate::dates::DateOrder;
use crate::error::{HisaabError, Result};
use crate::grid::Grid;
use crate::models::{ColumnRoleAssignment, Orientation, Resolution, TransactionBlock};

pub const MIN_VALID_PAIRS: usize = 3;
pub const MAX_SCORE: f64 = 100.0;
pub const MAX_FIT_BONUS: f64 = 25.0;
const SLOPE_TOLERANCE: f64 = 0.1;
const INTERCEPT_TOLERANCE: f64 = 0.01;
const MIN_R_SQUARED: f64 = 0.9;
const SCORE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnClasses {
    /// At least one numeric cell inside the block.
    pub numeric: Vec<usize>,
    /// Every cell inside the block is date-like.
    pub date: Vec<usize>,
    /// Populated columns that are neither of the above.
    pub description: Vec<usize>,
}

pub fn classify_columns(grid: &Grid, block: &TransactionBlock, order: DateOrder) -> ColumnClasses {
    let mut classes = ColumnClasses::default();
    if block.is_empty() {
        return classes;
    }
    for col in 0..grid.width() {
        let cells: Vec<_> = block.rows().map(|r| grid.cell(r, col)).collect();
        if cells.iter().any(|c| is_numeric(c)) {
            classes.numeric.push(col);
        } else if cells.iter().all(|c| is_date_like(c, order)) {
            classes.date.push(col);
        } else if cells.iter().any(|c| !c.is_empty()) {
            classes.description.push(col);
        }
    }
    classes
}

/// Least-squares fit of `y = slope * x + intercept`, with R².
fn linear_fit(x: &[f64], y: &[f64]) -> Option<(f64, f64, f64)> {
    let n = x.len() as f64;
    if x.len() < 2 {
        return None;
    }
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let sxx: f64 = x.iter().map(|v| (v - mean_x).powi(2)).sum();
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mean_x) * (b - mean_y)).sum();
    let syy: f64 = y.iter().map(|v| (v - mean_y).powi(2)).sum();
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let ss_res: f64 = x
        .iter()
        .zip(y)
        .map(|(a, b)| (b - (slope * a + intercept)).powi(2))
        .sum();
    Some((slope, intercept, 1.0 - ss_res / syy))
}

/// Score rows taken in the given order, capped at [`MAX_SCORE`]. `None`
/// when fewer than [`MIN_VALID_PAIRS`] consecutive rows both carry a balance.
pub fn consistency_score(credit: &[f64], debit: &[f64], balance: &[Option<f64>]) -> Option<f64> {
    raw_consistency(credit, debit, balance).map(|s| s.min(MAX_SCORE))
}

/// Uncapped `base + bonus`. Triples are ranked on this so that a near fit
/// with a full bonus cannot tie an exact fit at the cap.
fn raw_consistency(credit: &[f64], debit: &[f64], balance: &[Option<f64>]) -> Option<f64> {
    let mut deltas = Vec::new();
    let mut flows = Vec::new();
    for i in 0..balance.len().saturating_sub(1) {
        if let (Some(prev), Some(next)) = (balance[i], balance[i + 1]) {
            deltas.push(next - prev);
            flows.push(credit[i + 1] - debit[i + 1]);
        }
    }
    if deltas.len() < MIN_VALID_PAIRS {
        return None;
    }

    let n = deltas.len() as f64;
    let rmse = (deltas
        .iter()
        .zip(&flows)
        .map(|(d, f)| (d - f).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();
    let present: Vec<f64> = balance.iter().flatten().map(|b| b.abs()).collect();
    let scale = (present.iter().sum::<f64>() / present.len() as f64).max(1.0);
    let base = (MAX_SCORE / (1.0 + rmse / scale)).min(MAX_SCORE);

    let bonus = match linear_fit(&deltas, &flows) {
        Some((slope, intercept, r2))
            if (slope - 1.0).abs() <= SLOPE_TOLERANCE
                && intercept.abs() <= INTERCEPT_TOLERANCE * scale
                && r2 > MIN_R_SQUARED =>
        {
            MAX_FIT_BONUS * ((r2 - MIN_R_SQUARED) / (1.0 - MIN_R_SQUARED)).clamp(0.0, 1.0)
        }
        _ => 0.0,
    };
    Some(base + bonus)
}

fn column_values(grid: &Grid, block: &TransactionBlock, col: usize) -> Vec<Option<f64>> {
    block.rows().map(|r| cell_amount(grid.cell(r, col))).collect()
}

/// Best `(orientation, raw score)` for one triple; the as-given order wins a tie.
fn score_triple(credit: &[f64], debit: &[f64], balance: &[Option<f64>]) -> Option<(Orientation, f64)> {
    let forward = raw_consistency(credit, debit, balance).map(|s| (Orientation::Ascending, s));

    let rev = |v: &[f64]| v.iter().rev().copied().collect::<Vec<_>>();
    let balance_rev: Vec<Option<f64>> = balance.iter().rev().copied().collect();
    let reverse = raw_consistency(&rev(credit), &rev(debit), &balance_rev)
        .map(|s| (Orientation::Descending, s));

    match (forward, reverse) {
        (Some(f), Some(r)) if r.1 > f.1 + SCORE_EPSILON => Some(r),
        (Some(f), _) => Some(f),
        (None, r) => r,
    }
}

/// Search all ordered `(credit, debit, balance)` triples of the numeric
/// candidates for the one that best explains the balance column.
pub fn infer_roles(
    grid: &Grid,
    block: &TransactionBlock,
    numeric_columns: &[usize],
) -> Result<Resolution<ColumnRoleAssignment>> {
    let values: Vec<(usize, Vec<Option<f64>>)> = numeric_columns
        .iter()
        .map(|&c| (c, column_values(grid, block, c)))
        .collect();
    let zeroed = |v: &[Option<f64>]| v.iter().map(|x| x.unwrap_or(0.0)).collect::<Vec<_>>();

    let mut best: Vec<(f64, ColumnRoleAssignment)> = Vec::new();
    let mut evaluated = 0usize;
    for (credit, credit_vals) in &values {
        for (debit, debit_vals) in &values {
            for (balance, balance_vals) in &values {
                if credit == debit || credit == balance || debit == balance {
                    continue;
                }
                let Some((orientation, raw)) =
                    score_triple(&zeroed(credit_vals), &zeroed(debit_vals), balance_vals)
                else {
                    continue;
                };
                evaluated += 1;
                let candidate = ColumnRoleAssignment {
                    credit: *credit,
                    debit: *debit,
                    balance: *balance,
                    score: raw.min(MAX_SCORE),
                    orientation,
                };
                match best.first() {
                    Some((top, _)) if raw > top + SCORE_EPSILON => best = vec![(raw, candidate)],
                    Some((top, _)) if (raw - top).abs() <= SCORE_EPSILON => best.push((raw, candidate)),
                    Some(_) => {}
                    None => best.push((raw, candidate)),
                }
            }
        }
    }
    debug!(
        numeric_columns = numeric_columns.len(),
        evaluated,
        top = best.first().map(|(raw, _)| *raw),
        "scored credit/debit/balance triples"
    );

    match best.len() {
        0 => Err(HisaabError::StructuralInference(
            "no credit/debit/balance column triple explains the balances".to_string(),
        )),
        1 => Ok(Resolution::Resolved(best.remove(0).1)),
        _ => Ok(Resolution::Ambiguous(best.into_iter().map(|(_, c)| c).collect())),
    }
}
