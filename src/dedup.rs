use std::collections::HashSet;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::models::TransactionRecord;

/// Identity used to decide whether an incoming row was already imported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransactionKey {
    Party(String),
    Composite {
        date: NaiveDate,
        net_cents: i64,
        party: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DedupKeyKind {
    /// Date, net amount and description together.
    #[default]
    Composite,
    /// Description only. Two different payments to the same payee collide.
    Party,
}

impl DedupKeyKind {
    pub fn key(&self, record: &TransactionRecord) -> TransactionKey {
        let party = normalize_party(&record.party);
        match self {
            Self::Party => TransactionKey::Party(party),
            Self::Composite => TransactionKey::Composite {
                date: record.transaction_date,
                net_cents: ((record.credit_amount - record.debit_amount) * 100.0).round() as i64,
                party,
            },
        }
    }

    pub fn keys<'a>(&self, records: impl IntoIterator<Item = &'a TransactionRecord>) -> HashSet<TransactionKey> {
        records.into_iter().map(|r| self.key(r)).collect()
    }
}

pub fn normalize_party(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}
