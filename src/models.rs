use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{HisaabError, Result};

/// Outcome of an inference step that may legitimately find more than one
/// equally good answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Resolved(T),
    Ambiguous(Vec<T>),
}

impl<T> Resolution<T> {
    #[cfg(test)]
    pub fn resolved(self) -> Option<T> {
        match self {
            Self::Resolved(value) => Some(value),
            Self::Ambiguous(_) => None,
        }
    }
}

/// Maximal run of consecutive row indices, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCluster {
    pub start: usize,
    pub end: usize,
}

impl RowCluster {
    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Row span holding the transaction line items, plus every other row index
/// of the sheet (the metadata).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBlock {
    pub start: usize,
    pub end: usize,
    pub metadata: Vec<usize>,
}

impl TransactionBlock {
    pub fn rows(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Rows are oldest-first as they appear in the sheet.
    Ascending,
    /// Rows are newest-first; reading them reversed gives chronological order.
    Descending,
}

impl Orientation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ascending => "oldest first",
            Self::Descending => "newest first",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnRoleAssignment {
    pub credit: usize,
    pub debit: usize,
    pub balance: usize,
    /// 0..=100
    pub score: f64,
    pub orientation: Orientation,
}

/// Final column positions handed to the materializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub transaction_date: usize,
    pub party: Option<usize>,
    pub debit_amount: usize,
    pub credit_amount: usize,
    pub remaining_balance: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnMapBuilder {
    pub transaction_date: Option<usize>,
    pub party: Option<usize>,
    pub debit_amount: Option<usize>,
    pub credit_amount: Option<usize>,
    pub remaining_balance: Option<usize>,
}

impl ColumnMapBuilder {
    pub fn with_roles(mut self, roles: &ColumnRoleAssignment) -> Self {
        self.debit_amount = Some(roles.debit);
        self.credit_amount = Some(roles.credit);
        self.remaining_balance = Some(roles.balance);
        self
    }

    pub fn build(self) -> Result<ColumnMap> {
        let missing: Vec<&str> = [
            ("transaction_date", self.transaction_date),
            ("debit_amount", self.debit_amount),
            ("credit_amount", self.credit_amount),
            ("remaining_balance", self.remaining_balance),
        ]
        .iter()
        .filter(|(_, col)| col.is_none())
        .map(|(name, _)| *name)
        .collect();
        if !missing.is_empty() {
            return Err(HisaabError::IncompleteData(format!(
                "column map is missing {}",
                missing.join(", ")
            )));
        }
        Ok(ColumnMap {
            transaction_date: self.transaction_date.unwrap_or_default(),
            party: self.party,
            debit_amount: self.debit_amount.unwrap_or_default(),
            credit_amount: self.credit_amount.unwrap_or_default(),
            remaining_balance: self.remaining_balance.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnType {
    Income,
    Expense,
}

impl TxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "Income",
            Self::Expense => "Expense",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Income" => Some(Self::Income),
            "Expense" => Some(Self::Expense),
            _ => None,
        }
    }

    pub fn from_debit(debit: f64) -> Self {
        if debit != 0.0 {
            Self::Expense
        } else {
            Self::Income
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub account: String,
    pub transaction_date: NaiveDate,
    pub debit_amount: f64,
    pub credit_amount: f64,
    pub remaining_balance: f64,
    pub party: String,
    pub txn_type: TxnType,
}

impl TransactionRecord {
    /// Whichever of debit/credit is positive, debit first.
    pub fn amount(&self) -> f64 {
        if self.debit_amount > 0.0 {
            self.debit_amount
        } else if self.credit_amount > 0.0 {
            self.credit_amount
        } else {
            0.0
        }
    }

    /// Status mirrors the type once the amount side is known.
    pub fn status(&self) -> TxnType {
        if self.debit_amount > 0.0 {
            TxnType::Expense
        } else if self.credit_amount > 0.0 {
            TxnType::Income
        } else {
            self.txn_type
        }
    }
}
