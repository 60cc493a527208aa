//! Header row and label resolution.
//!
//! Structure alone usually identifies the header: it is the only metadata
//! row that labels every populated column of the block. When it does not,
//! each amount role votes for the row whose label in that role's column best
//! matches the role's synonyms.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::Result;
use crate::grid::Grid;
use crate::models::{ColumnMap, ColumnMapBuilder, ColumnRoleAssignment, Resolution, TransactionBlock};
use crate::roles::ColumnClasses;
use crate::similarity::{normalize_label, SimilarityEngine};
use crate::store::{PatternKind, PatternRepository};

/// Fields that carry header synonym lists.
pub const HEADER_FIELDS: &[&str] = &["date", "description", "debit", "credit", "balance"];

#[derive(Debug, Clone, Default)]
pub struct HeaderSynonyms {
    pub date: Vec<String>,
    pub description: Vec<String>,
    pub debit: Vec<String>,
    pub credit: Vec<String>,
    pub balance: Vec<String>,
}

impl HeaderSynonyms {
    pub fn load(repo: &dyn PatternRepository) -> Result<Self> {
        let get = |field: &str| repo.patterns(field, PatternKind::Synonym);
        let synonyms = Self {
            date: get("date")?,
            description: get("description")?,
            debit: get("debit")?,
            credit: get("credit")?,
            balance: get("balance")?,
        };
        if synonyms.date.is_empty() || synonyms.description.is_empty() {
            warn!("no header synonyms configured for date/description");
        }
        Ok(synonyms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderResolution {
    pub header_row: Option<usize>,
    pub column_map: ColumnMap,
}

pub struct HeaderResolver<'a> {
    engine: &'a dyn SimilarityEngine,
    synonyms: &'a HeaderSynonyms,
}

impl<'a> HeaderResolver<'a> {
    pub fn new(engine: &'a dyn SimilarityEngine, synonyms: &'a HeaderSynonyms) -> Self {
        Self { engine, synonyms }
    }

    /// Best similarity of `label` against a synonym list; an exact
    /// normalized match short-circuits to 1.
    pub fn label_score(&self, label: &str, synonyms: &[String]) -> f64 {
        let norm = normalize_label(label);
        if norm.is_empty() {
            return 0.0;
        }
        let mut best = 0.0f64;
        for syn in synonyms {
            if normalize_label(syn) == norm {
                return 1.0;
            }
            best = best.max(self.engine.similarity(label, syn));
        }
        best
    }

    /// Metadata rows that carry a value in every column populated in the block.
    pub fn labelling_rows(grid: &Grid, block: &TransactionBlock) -> Vec<usize> {
        let populated: Vec<usize> = (0..grid.width())
            .filter(|&c| block.rows().any(|r| !grid.cell(r, c).is_empty()))
            .collect();
        block
            .metadata
            .iter()
            .copied()
            .filter(|&r| populated.iter().all(|&c| !grid.cell(r, c).is_empty()))
            .collect()
    }

    /// Each amount role votes for the candidate row whose label in the role's
    /// column scores highest. The unique plurality winner is the header.
    pub fn vote_header_row(
        &self,
        grid: &Grid,
        candidates: &[usize],
        roles: &ColumnRoleAssignment,
    ) -> Resolution<usize> {
        let ballots = [
            (roles.debit, &self.synonyms.debit),
            (roles.credit, &self.synonyms.credit),
            (roles.balance, &self.synonyms.balance),
        ];
        let mut tally: HashMap<usize, usize> = HashMap::new();
        let mut seen: Vec<usize> = Vec::new();
        for (col, synonyms) in ballots {
            let mut winner: Option<(usize, f64)> = None;
            for &row in candidates {
                let score = self.label_score(&grid.cell(row, col).to_string(), synonyms);
                if score > winner.map_or(0.0, |w| w.1) {
                    winner = Some((row, score));
                    if score >= 1.0 {
                        break;
                    }
                }
            }
            if let Some((row, _)) = winner {
                *tally.entry(row).or_default() += 1;
                if !seen.contains(&row) {
                    seen.push(row);
                }
            }
        }

        let top = tally.values().copied().max().unwrap_or(0);
        let leaders: Vec<usize> = seen.into_iter().filter(|r| tally[r] == top).collect();
        debug!(?tally, ?leaders, "header row vote");
        match leaders.as_slice() {
            [row] => Resolution::Resolved(*row),
            _ => Resolution::Ambiguous(leaders),
        }
    }

    fn best_column(&self, grid: &Grid, header_row: usize, columns: &[usize], synonyms: &[String]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for &col in columns {
            let score = self.label_score(&grid.cell(header_row, col).to_string(), synonyms);
            if score > best.map_or(0.0, |b| b.1) {
                best = Some((col, score));
            }
        }
        best.map(|b| b.0)
    }

    pub fn resolve(
        &self,
        grid: &Grid,
        block: &TransactionBlock,
        classes: &ColumnClasses,
        roles: &ColumnRoleAssignment,
    ) -> Result<HeaderResolution> {
        let labelling = Self::labelling_rows(grid, block);
        let header_row = if labelling.len() == 1 {
            Some(labelling[0])
        } else {
            let candidates = if labelling.is_empty() {
                block
                    .metadata
                    .iter()
                    .copied()
                    .filter(|&r| r < block.start)
                    .filter(|&r| {
                        [roles.debit, roles.credit, roles.balance]
                            .iter()
                            .any(|&c| !grid.cell(r, c).is_empty())
                    })
                    .collect()
            } else {
                labelling
            };
            match self.vote_header_row(grid, &candidates, roles) {
                Resolution::Resolved(row) => Some(row),
                Resolution::Ambiguous(rows) if rows.is_empty() => {
                    warn!("no header candidates; continuing without labels");
                    None
                }
                Resolution::Ambiguous(rows) => {
                    warn!(?rows, "header row is ambiguous; continuing without labels");
                    None
                }
            }
        };

        let transaction_date = match header_row {
            Some(row) => self
                .best_column(grid, row, &classes.date, &self.synonyms.date)
                .or_else(|| classes.date.first().copied()),
            None => classes.date.first().copied(),
        };
        let lone_description = match classes.description.as_slice() {
            [col] => Some(*col),
            _ => None,
        };
        let party = match header_row {
            Some(row) => self
                .best_column(grid, row, &classes.description, &self.synonyms.description)
                .or(lone_description),
            None => lone_description,
        };
        if party.is_none() {
            warn!("no description column resolved; party will be empty");
        }

        let column_map = ColumnMapBuilder {
            transaction_date,
            party,
            ..Default::default()
        }
        .with_roles(roles)
        .build()?;
        debug!(?header_row, ?column_map, "resolved column map");
        Ok(HeaderResolution {
            header_row,
            column_map,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Orientation;
    use crate::similarity::LexicalEngine;

    fn synonyms() -> HeaderSynonyms {
        let v = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        HeaderSynonyms {
            date: v(&["date", "txn date", "transaction date"]),
            description: v(&["description", "narration", "particulars"]),
            debit: v(&["debit", "withdrawal", "withdrawal amt"]),
            credit: v(&["credit", "deposit", "deposit amt"]),
            balance: v(&["balance", "closing balance"]),
        }
    }

    fn roles() -> ColumnRoleAssignment {
        ColumnRoleAssignment {
            credit: 5,
            debit: 4,
            balance: 6,
            score: 100.0,
            orientation: Orientation::Ascending,
        }
    }

    fn classes() -> ColumnClasses {
        ColumnClasses {
            numeric: vec![3, 4, 5, 6],
            date: vec![0, 1],
            description: vec![2],
        }
    }

    fn txn(date: &str, value_date: &str, narration: &str) -> Vec<String> {
        [date, value_date, narration, "", "100.00", "", "900.00"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_labelling_row_is_header() {
        let grid = Grid::from_text_rows(&[
            row(&["Account Number : 0012345678"]),
            row(&["Value Dt", "Txn Date", "Narration", "Chq No", "Withdrawal Amt.", "Deposit Amt.", "Closing Balance"]),
            txn("01/04/2024", "01/04/2024", "UPI/111/SHOP"),
            txn("02/04/2024", "02/04/2024", "UPI/222/CAFE"),
        ]);
        let block = TransactionBlock { start: 2, end: 4, metadata: vec![0, 1] };
        let syn = synonyms();
        let resolver = HeaderResolver::new(&LexicalEngine, &syn);
        let resolution = resolver.resolve(&grid, &block, &classes(), &roles()).unwrap();
        assert_eq!(resolution.header_row, Some(1));
        assert_eq!(resolution.column_map.transaction_date, 1);
        assert_eq!(resolution.column_map.party, Some(2));
        assert_eq!(resolution.column_map.debit_amount, 4);
        assert_eq!(resolution.column_map.credit_amount, 5);
        assert_eq!(resolution.column_map.remaining_balance, 6);
    }

    #[test]
    fn test_vote_picks_row_with_amount_labels() {
        // Two rows label every populated column; only one names the amounts.
        let grid = Grid::from_text_rows(&[
            row(&["Date", "Value Date", "Narration", "Ref", "Withdrawal", "Deposit", "Balance"]),
            row(&["(1)", "(2)", "(3)", "(4)", "(5)", "(6)", "(7)"]),
            txn("01/04/2024", "01/04/2024", "UPI/111/SHOP"),
            txn("02/04/2024", "02/04/2024", "UPI/222/CAFE"),
        ]);
        let block = TransactionBlock { start: 2, end: 4, metadata: vec![0, 1] };
        let syn = synonyms();
        let resolver = HeaderResolver::new(&LexicalEngine, &syn);
        assert_eq!(HeaderResolver::labelling_rows(&grid, &block), vec![0, 1]);
        assert_eq!(resolver.vote_header_row(&grid, &[0, 1], &roles()), Resolution::Resolved(0));
        let resolution = resolver.resolve(&grid, &block, &classes(), &roles()).unwrap();
        assert_eq!(resolution.header_row, Some(0));
        assert_eq!(resolution.column_map.transaction_date, 0);
    }

    #[test]
    fn test_split_vote_is_ambiguous() {
        let grid = Grid::from_text_rows(&[
            row(&["", "", "", "", "Withdrawal", "", ""]),
            row(&["", "", "", "", "", "Deposit", ""]),
            row(&["", "", "", "", "", "", "Balance"]),
            txn("01/04/2024", "01/04/2024", "UPI/111/SHOP"),
        ]);
        let syn = synonyms();
        let resolver = HeaderResolver::new(&LexicalEngine, &syn);
        match resolver.vote_header_row(&grid, &[0, 1, 2], &roles()) {
            Resolution::Ambiguous(rows) => assert_eq!(rows, vec![0, 1, 2]),
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn test_vote_finds_header_missing_a_label() {
        // the cheque number column has no heading, so no row labels every column
        let cheque = |date: &str, narration: &str, chq: &str| {
            row(&[date, date, narration, chq, "250.00", "", "4750.00"])
        };
        let grid = Grid::from_text_rows(&[
            row(&["Statement summary", "", "", "", "", "", "Opening Balance 5,000.00"]),
            row(&["Value Dt", "Txn Date", "Narration", "", "Withdrawal Amt.", "Deposit Amt.", "Closing Balance"]),
            cheque("01/04/2024", "CHQ/117/RENT", "117"),
            cheque("02/04/2024", "CHQ/342/SCHOOL", "342"),
            cheque("03/04/2024", "CHQ/980/INSURANCE", "980"),
        ]);
        let block = TransactionBlock { start: 2, end: 5, metadata: vec![0, 1] };
        let syn = synonyms();
        let resolver = HeaderResolver::new(&LexicalEngine, &syn);
        assert!(HeaderResolver::labelling_rows(&grid, &block).is_empty());

        let resolution = resolver.resolve(&grid, &block, &classes(), &roles()).unwrap();
        assert_eq!(resolution.header_row, Some(1));
        assert_eq!(resolution.column_map.transaction_date, 1);
        assert_eq!(resolution.column_map.party, Some(2));
        assert_eq!(resolution.column_map.debit_amount, 4);
    }

    #[test]
    fn test_vote_without_candidates_has_no_leaders() {
        let grid = Grid::from_text_rows(&[txn("01/04/2024", "01/04/2024", "UPI/111/SHOP")]);
        let syn = synonyms();
        let resolver = HeaderResolver::new(&LexicalEngine, &syn);
        assert_eq!(resolver.vote_header_row(&grid, &[], &roles()), Resolution::Ambiguous(vec![]));
    }

    #[test]
    fn test_no_header_falls_back_to_structure() {
        let grid = Grid::from_text_rows(&[
            row(&["Statement of account"]),
            txn("01/04/2024", "01/04/2024", "UPI/111/SHOP"),
            txn("02/04/2024", "02/04/2024", "UPI/222/CAFE"),
        ]);
        let block = TransactionBlock { start: 1, end: 3, metadata: vec![0] };
        let syn = synonyms();
        let resolver = HeaderResolver::new(&LexicalEngine, &syn);
        let resolution = resolver.resolve(&grid, &block, &classes(), &roles()).unwrap();
        assert_eq!(resolution.header_row, None);
        assert_eq!(resolution.column_map.transaction_date, 0);
        assert_eq!(resolution.column_map.party, Some(2));
    }

    #[test]
    fn test_missing_date_column_is_incomplete() {
        let grid = Grid::from_text_rows(&[txn("01/04/2024", "01/04/2024", "UPI/111/SHOP")]);
        let block = TransactionBlock { start: 0, end: 1, metadata: vec![] };
        let syn = synonyms();
        let resolver = HeaderResolver::new(&LexicalEngine, &syn);
        let no_dates = ColumnClasses {
            date: vec![],
            ..classes()
        };
        let err = resolver.resolve(&grid, &block, &no_dates, &roles()).unwrap_err();
        assert!(matches!(err, crate::error::HisaabError::IncompleteData(_)));
    }

    #[test]
    fn test_label_score_exact_short_circuit() {
        let syn = synonyms();
        let resolver = HeaderResolver::new(&LexicalEngine, &syn);
        assert_eq!(resolver.label_score("CLOSING BALANCE", &syn.balance), 1.0);
        assert_eq!(resolver.label_score("", &syn.balance), 0.0);
        assert!(resolver.label_score("Bal", &syn.balance) < 1.0);
    }
}
