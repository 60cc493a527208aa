use tracing::debug;

use crate::classify::{has_alnum_mix, is_date_like, is_numeric};
use crate::dates::DateOrder;
use crate::error::{HisaabError, Result};
use crate::grid::{Cell, Grid};
use crate::models::{Resolution, RowCluster, TransactionBlock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowProfile {
    pub numeric: usize,
    pub has_date: bool,
    pub has_alnum_mix: bool,
}

impl RowProfile {
    pub fn of(row: &[Cell], order: DateOrder) -> Self {
        Self {
            numeric: row.iter().filter(|c| is_numeric(c)).count(),
            has_date: row.iter().any(|c| is_date_like(c, order)),
            has_alnum_mix: row.iter().any(has_alnum_mix),
        }
    }

    /// Two or more amounts, a date and a reference-style narration.
    pub fn is_transaction_like(&self) -> bool {
        self.numeric >= 2 && self.has_date && self.has_alnum_mix
    }
}

pub fn transaction_like_rows(grid: &Grid, order: DateOrder) -> Vec<usize> {
    grid.rows()
        .enumerate()
        .filter(|(_, row)| RowProfile::of(row, order).is_transaction_like())
        .map(|(i, _)| i)
        .collect()
}

/// Split ascending row indices into maximal runs of consecutive values.
pub fn cluster_rows(indices: &[usize]) -> Vec<RowCluster> {
    let mut clusters: Vec<RowCluster> = Vec::new();
    for &idx in indices {
        match clusters.last_mut() {
            Some(last) if last.end == idx => last.end = idx + 1,
            _ => clusters.push(RowCluster {
                start: idx,
                end: idx + 1,
            }),
        }
    }
    clusters
}

/// Find the single densest run of transaction-like rows.
///
/// Every row outside the chosen span is metadata. When several runs share
/// the maximum length the result is `Ambiguous` with one block per run.
pub fn locate_block(grid: &Grid, order: DateOrder) -> Result<Resolution<TransactionBlock>> {
    let candidates = transaction_like_rows(grid, order);
    let clusters = cluster_rows(&candidates);
    debug!(
        transaction_like = candidates.len(),
        clusters = clusters.len(),
        "profiled statement rows"
    );

    let Some(max_len) = clusters.iter().map(RowCluster::len).max() else {
        return Err(HisaabError::StructuralInference(
            "no transaction-like rows found".to_string(),
        ));
    };

    let mut blocks: Vec<TransactionBlock> = clusters
        .iter()
        .filter(|c| c.len() == max_len)
        .map(|c| TransactionBlock {
            start: c.start,
            end: c.end,
            metadata: (0..grid.height()).filter(|i| !(c.start..c.end).contains(i)).collect(),
        })
        .collect();

    if blocks.len() == 1 {
        let block = blocks.remove(0);
        debug!(start = block.start, end = block.end, "located transaction block");
        Ok(Resolution::Resolved(block))
    } else {
        Ok(Resolution::Ambiguous(blocks))
    }
}
