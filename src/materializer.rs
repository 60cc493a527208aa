use chrono::NaiveDate;
use tracing::{debug, info};

use crate::classify::cell_amount;
use crate::dates::{excel_serial_to_date, DateParser};
use crate::dedup::DedupKeyKind;
use crate::error::{HisaabError, Result};
use crate::grid::{Cell, Grid};
use crate::models::{ColumnMap, Orientation, TransactionBlock, TransactionRecord, TxnType};
use crate::store::{StatementUpload, TransactionStore};

#[derive(Debug, Clone, Default)]
pub struct MaterializeOutcome {
    /// New records, oldest first.
    pub records: Vec<TransactionRecord>,
    /// Rows examined before the scan stopped.
    pub scanned: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// The scan hit a row that was already stored.
    pub stopped_early: bool,
    pub inserted: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Materializer {
    pub dates: DateParser,
    pub dedup: DedupKeyKind,
}

impl Materializer {
    pub fn new(dates: DateParser, dedup: DedupKeyKind) -> Self {
        Self { dates, dedup }
    }

    fn date_of(&self, cell: &Cell, row: usize) -> Result<NaiveDate> {
        let parsed = match cell {
            Cell::Date(d) => Some(*d),
            Cell::Number(n) => excel_serial_to_date(*n),
            Cell::Text(s) => self.dates.parse(s),
            Cell::Empty => None,
        };
        parsed.ok_or_else(|| {
            HisaabError::IncompleteData(format!("row {}: unreadable transaction date '{cell}'", row + 1))
        })
    }

    /// Block rows as records, oldest first.
    pub fn rows(
        &self,
        grid: &Grid,
        block: &TransactionBlock,
        map: &ColumnMap,
        orientation: Orientation,
        account: &str,
    ) -> Result<Vec<TransactionRecord>> {
        if block.is_empty() {
            return Err(HisaabError::IncompleteData("transaction block is empty".to_string()));
        }
        let columns = [
            Some(map.transaction_date),
            map.party,
            Some(map.debit_amount),
            Some(map.credit_amount),
            Some(map.remaining_balance),
        ];
        if let Some(col) = columns.into_iter().flatten().find(|&c| c >= grid.width()) {
            return Err(HisaabError::IncompleteData(format!(
                "column map points at column {} but the sheet has {}",
                col + 1,
                grid.width()
            )));
        }

        let amount = |row: usize, col: usize| cell_amount(grid.cell(row, col)).unwrap_or(0.0);
        let mut records = block
            .rows()
            .map(|row| {
                let debit_amount = amount(row, map.debit_amount);
                Ok(TransactionRecord {
                    account: account.to_string(),
                    transaction_date: self.date_of(grid.cell(row, map.transaction_date), row)?,
                    debit_amount,
                    credit_amount: amount(row, map.credit_amount),
                    remaining_balance: amount(row, map.remaining_balance),
                    party: map
                        .party
                        .map(|c| grid.cell(row, c).to_string())
                        .unwrap_or_default(),
                    txn_type: TxnType::from_debit(debit_amount),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if orientation == Orientation::Descending {
            records.reverse();
        }
        Ok(records)
    }

    /// Find the rows not already stored for `account` without writing them.
    ///
    /// Rows are scanned newest first against a snapshot of stored keys; the
    /// first stored row ends the scan since everything older was imported by
    /// an earlier statement. The returned records are oldest first.
    fn plan(
        &self,
        store: &dyn TransactionStore,
        grid: &Grid,
        block: &TransactionBlock,
        map: &ColumnMap,
        orientation: Orientation,
        account: &str,
    ) -> Result<MaterializeOutcome> {
        let rows = self.rows(grid, block, map, orientation, account)?;
        let date_range = rows
            .iter()
            .map(|r| r.transaction_date)
            .min()
            .zip(rows.iter().map(|r| r.transaction_date).max());
        let Some((from, to)) = date_range else {
            return Err(HisaabError::IncompleteData("transaction block is empty".to_string()));
        };

        let existing = store.existing_in_range(account, from, to)?;
        let seen = self.dedup.keys(&existing);
        debug!(account, %from, %to, existing = existing.len(), "loaded stored keys");

        let mut fresh = Vec::new();
        let mut scanned = 0usize;
        let mut stopped_early = false;
        for record in rows.into_iter().rev() {
            scanned += 1;
            if seen.contains(&self.dedup.key(&record)) {
                stopped_early = true;
                break;
            }
            fresh.push(record);
        }
        fresh.reverse();
        debug!(account, scanned, new = fresh.len(), stopped_early, "planned statement rows");

        Ok(MaterializeOutcome {
            records: fresh,
            scanned,
            date_range: Some((from, to)),
            stopped_early,
            inserted: 0,
        })
    }

    /// [`plan`](Self::plan), then write the new rows oldest first in the same
    /// transaction as the statement's upload record. Without an upload record
    /// this is a dry run and nothing is written.
    #[allow(clippy::too_many_arguments)]
    pub fn materialize(
        &self,
        store: &mut dyn TransactionStore,
        grid: &Grid,
        block: &TransactionBlock,
        map: &ColumnMap,
        orientation: Orientation,
        account: &str,
        upload: Option<StatementUpload>,
    ) -> Result<MaterializeOutcome> {
        let mut outcome = self.plan(&*store, grid, block, map, orientation, account)?;
        let dry_run = upload.is_none();
        if let Some(mut upload) = upload {
            upload.record_count = outcome.records.len();
            upload.date_range = outcome.date_range;
            outcome.inserted = store.insert_statement(&outcome.records, &upload)?;
        }
        info!(
            account,
            scanned = outcome.scanned,
            new = outcome.records.len(),
            inserted = outcome.inserted,
            stopped_early = outcome.stopped_early,
            dry_run,
            "materialized statement rows"
        );
        Ok(outcome)
    }
}
