use std::path::Path;

use chrono::NaiveDate;
use clap::ValueEnum;
use rusqlite::Connection;
use tracing::debug;

use crate::error::{HisaabError, Result};
use crate::models::{TransactionRecord, TxnType};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS statement_uploads (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    checksum TEXT NOT NULL,
    account_number TEXT NOT NULL,
    ifsc TEXT,
    block_start INTEGER,
    block_end INTEGER,
    record_count INTEGER,
    date_range_start TEXT,
    date_range_end TEXT,
    uploaded_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS transaction_entries (
    id INTEGER PRIMARY KEY,
    account TEXT NOT NULL,
    transaction_date TEXT NOT NULL,
    debit_amount REAL NOT NULL DEFAULT 0,
    credit_amount REAL NOT NULL DEFAULT 0,
    remaining_balance REAL,
    party TEXT NOT NULL,
    type TEXT NOT NULL,
    status TEXT,
    amount REAL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_entries_account_date
    ON transaction_entries (account, transaction_date);

CREATE TABLE IF NOT EXISTS pattern_fields (
    name TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS pattern_definitions (
    id INTEGER PRIMARY KEY,
    field TEXT NOT NULL,
    kind TEXT NOT NULL,
    pattern TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    UNIQUE (field, kind, pattern)
);
";

/// Fields the entity extractor may be asked for.
const DEFAULT_FIELDS: &[&str] = &["Account Number", "IFSC Code", "MICR Code"];

// (field, kind, pattern)
const DEFAULT_PATTERNS: &[(&str, &str, &str)] = &[
    (
        "Account Number",
        "token",
        r#"[{"LOWER": {"IN": ["account", "a/c", "acct", "ac"]}}, {"LOWER": {"IN": ["number", "no", "num"]}, "OP": "?"}, {"IS_PUNCT": true, "OP": "*"}, {"REGEX": "^[0-9Xx*]{6,20}$"}]"#,
    ),
    (
        "IFSC Code",
        "token",
        r#"[{"LOWER": "ifsc"}, {"LOWER": "code", "OP": "?"}, {"IS_PUNCT": true, "OP": "*"}, {"REGEX": "^[A-Za-z]{4}0[A-Za-z0-9]{6}$"}]"#,
    ),
    (
        "MICR Code",
        "token",
        r#"[{"LOWER": "micr"}, {"LOWER": "code", "OP": "?"}, {"IS_PUNCT": true, "OP": "*"}, {"REGEX": "^[0-9]{9}$"}]"#,
    ),
    ("date", "synonym", "date"),
    ("date", "synonym", "txn date"),
    ("date", "synonym", "transaction date"),
    ("date", "synonym", "tran date"),
    ("date", "synonym", "posting date"),
    ("date", "synonym", "post date"),
    ("description", "synonym", "description"),
    ("description", "synonym", "narration"),
    ("description", "synonym", "particulars"),
    ("description", "synonym", "details"),
    ("description", "synonym", "transaction details"),
    ("description", "synonym", "remarks"),
    ("debit", "synonym", "debit"),
    ("debit", "synonym", "withdrawal"),
    ("debit", "synonym", "withdrawal amt"),
    ("debit", "synonym", "withdrawal amount"),
    ("debit", "synonym", "debit amount"),
    ("debit", "synonym", "dr"),
    ("debit", "synonym", "paid out"),
    ("credit", "synonym", "credit"),
    ("credit", "synonym", "deposit"),
    ("credit", "synonym", "deposit amt"),
    ("credit", "synonym", "deposit amount"),
    ("credit", "synonym", "credit amount"),
    ("credit", "synonym", "cr"),
    ("credit", "synonym", "paid in"),
    ("balance", "synonym", "balance"),
    ("balance", "synonym", "closing balance"),
    ("balance", "synonym", "running balance"),
    ("balance", "synonym", "available balance"),
    ("balance", "synonym", "balance amount"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PatternKind {
    /// JSON token-sequence pattern for the entity extractor.
    Token,
    /// Header alias for a column role.
    Synonym,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Synonym => "synonym",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "token" => Some(Self::Token),
            "synonym" => Some(Self::Synonym),
            _ => None,
        }
    }
}

pub trait PatternRepository {
    /// Enumerated set of field names the entity extractor accepts.
    fn field_names(&self) -> Result<Vec<String>>;

    fn patterns(&self, field: &str, kind: PatternKind) -> Result<Vec<String>>;
}

pub trait TransactionStore {
    fn existing_in_range(
        &self,
        account: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TransactionRecord>>;

    /// Persist all records together with the statement's upload record, or
    /// none of them.
    fn insert_statement(&mut self, records: &[TransactionRecord], upload: &StatementUpload) -> Result<usize>;
}

#[derive(Debug, Clone)]
pub struct StatementUpload {
    pub filename: String,
    pub checksum: String,
    pub account_number: String,
    pub ifsc: Option<String>,
    pub block_start: usize,
    pub block_end: usize,
    pub record_count: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

#[derive(Debug, Clone)]
pub struct PatternRow {
    pub id: i64,
    pub field: String,
    pub kind: PatternKind,
    pub pattern: String,
}

fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;

        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM pattern_fields", [], |row| row.get(0))?;
        if count == 0 {
            for field in DEFAULT_FIELDS {
                self.conn
                    .execute("INSERT INTO pattern_fields (name) VALUES (?1)", [field])?;
            }
            for (field, kind, pattern) in DEFAULT_PATTERNS {
                self.conn.execute(
                    "INSERT OR IGNORE INTO pattern_definitions (field, kind, pattern) VALUES (?1, ?2, ?3)",
                    rusqlite::params![field, kind, pattern],
                )?;
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn is_duplicate_upload(&self, checksum: &str, account: &str) -> Result<bool> {
        let mut stmt = self.conn.prepare(
            "SELECT 1 FROM statement_uploads WHERE checksum = ?1 AND account_number = ?2",
        )?;
        Ok(stmt.exists(rusqlite::params![checksum, account])?)
    }

    pub fn add_pattern(&self, field: &str, kind: PatternKind, pattern: &str) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO pattern_definitions (field, kind, pattern) VALUES (?1, ?2, ?3)",
            rusqlite::params![field, kind.as_str(), pattern],
        )?;
        Ok(inserted > 0)
    }

    pub fn list_patterns(&self, field: Option<&str>) -> Result<Vec<PatternRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, field, kind, pattern FROM pattern_definitions \
             WHERE ?1 IS NULL OR field = ?1 ORDER BY field, kind, id",
        )?;
        let rows = stmt
            .query_map([field], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, field, kind, pattern)| {
                let kind = PatternKind::parse(&kind)
                    .ok_or_else(|| HisaabError::Other(format!("stored pattern kind {kind}")))?;
                Ok(PatternRow { id, field, kind, pattern })
            })
            .collect()
    }

    pub fn list_transactions(
        &self,
        account: Option<&str>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<TransactionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT account, transaction_date, debit_amount, credit_amount, remaining_balance, party, type \
             FROM transaction_entries \
             WHERE (?1 IS NULL OR account = ?1) \
               AND (?2 IS NULL OR transaction_date >= ?2) \
               AND (?3 IS NULL OR transaction_date <= ?3) \
             ORDER BY transaction_date, id",
        )?;
        let rows = stmt
            .query_map(
                rusqlite::params![account, from.map(fmt_date), to.map(fmt_date)],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, Option<f64>>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(account, date, debit, credit, balance, party, txn_type)| {
                let transaction_date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .map_err(|e| HisaabError::Other(format!("stored date {date}: {e}")))?;
                let txn_type = TxnType::parse(&txn_type)
                    .ok_or_else(|| HisaabError::Other(format!("stored type {txn_type}")))?;
                Ok(TransactionRecord {
                    account,
                    transaction_date,
                    debit_amount: debit,
                    credit_amount: credit,
                    remaining_balance: balance.unwrap_or_default(),
                    party,
                    txn_type,
                })
            })
            .collect()
    }
}

impl PatternRepository for Store {
    fn field_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM pattern_fields ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn patterns(&self, field: &str, kind: PatternKind) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT pattern FROM pattern_definitions WHERE field = ?1 AND kind = ?2 ORDER BY id",
        )?;
        let patterns = stmt
            .query_map(rusqlite::params![field, kind.as_str()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(patterns)
    }
}

impl TransactionStore for Store {
    fn existing_in_range(
        &self,
        account: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TransactionRecord>> {
        self.list_transactions(Some(account), Some(from), Some(to))
    }

    fn insert_statement(&mut self, records: &[TransactionRecord], upload: &StatementUpload) -> Result<usize> {
        let tx = self.conn.transaction()?;
        for r in records {
            insert_entry(&tx, r)?;
        }
        let upload_id = insert_upload(&tx, upload)?;
        tx.commit()?;
        debug!(inserted = records.len(), upload_id, "committed statement");
        Ok(records.len())
    }
}

fn insert_entry(conn: &Connection, r: &TransactionRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO transaction_entries \
         (account, transaction_date, debit_amount, credit_amount, remaining_balance, party, type, status, amount) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            r.account,
            fmt_date(r.transaction_date),
            r.debit_amount,
            r.credit_amount,
            r.remaining_balance,
            r.party,
            r.txn_type.as_str(),
            r.status().as_str(),
            r.amount(),
        ],
    )?;
    Ok(())
}

fn insert_upload(conn: &Connection, upload: &StatementUpload) -> Result<i64> {
    let (start, end) = match upload.date_range {
        Some((a, b)) => (Some(fmt_date(a)), Some(fmt_date(b))),
        None => (None, None),
    };
    conn.execute(
        "INSERT INTO statement_uploads (filename, checksum, account_number, ifsc, block_start, block_end, record_count, date_range_start, date_range_end) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            upload.filename,
            upload.checksum,
            upload.account_number,
            upload.ifsc,
            upload.block_start as i64,
            upload.block_end as i64,
            upload.record_count as i64,
            start,
            end,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("test.db")).unwrap();
        store.init().unwrap();
        (dir, store)
    }

    fn record(day: u32, party: &str, debit: f64, credit: f64) -> TransactionRecord {
        TransactionRecord {
            account: "0012345678".to_string(),
            transaction_date: NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
            debit_amount: debit,
            credit_amount: credit,
            remaining_balance: 1000.0,
            party: party.to_string(),
            txn_type: TxnType::from_debit(debit),
        }
    }

    fn count(store: &Store) -> i64 {
        store
            .connection()
            .query_row("SELECT count(*) FROM transaction_entries", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_init_creates_tables() {
        let (_dir, store) = test_store();
        let tables: Vec<String> = store
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["statement_uploads", "transaction_entries", "pattern_fields", "pattern_definitions"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        let (_dir, store) = test_store();
        store.init().unwrap();
        assert_eq!(store.field_names().unwrap().len(), DEFAULT_FIELDS.len());
    }

    #[test]
    fn test_seeds_patterns_and_synonyms() {
        let (_dir, store) = test_store();
        assert_eq!(store.patterns("Account Number", PatternKind::Token).unwrap().len(), 1);
        let balance = store.patterns("balance", PatternKind::Synonym).unwrap();
        assert!(balance.contains(&"closing balance".to_string()));
        assert!(store.patterns("balance", PatternKind::Token).unwrap().is_empty());
    }

    #[test]
    fn test_add_pattern_ignores_duplicates() {
        let (_dir, store) = test_store();
        assert!(store.add_pattern("debit", PatternKind::Synonym, "withdrawals").unwrap());
        assert!(!store.add_pattern("debit", PatternKind::Synonym, "withdrawals").unwrap());
        let debit = store.list_patterns(Some("debit")).unwrap();
        assert_eq!(debit.len(), 8);
        assert!(debit.iter().all(|p| p.kind == PatternKind::Synonym));
    }

    #[test]
    fn test_insert_and_query_range() {
        let (_dir, mut store) = test_store();
        let rows = [
            record(1, "UPI/1/A", 10.0, 0.0),
            record(5, "UPI/2/B", 0.0, 20.0),
            record(9, "UPI/3/C", 30.0, 0.0),
        ];
        store.insert_statement(&rows, &upload("abc")).unwrap();
        let from = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 4, 9).unwrap();
        let found = store.existing_in_range("0012345678", from, to).unwrap();
        let parties: Vec<_> = found.iter().map(|r| r.party.as_str()).collect();
        assert_eq!(parties, vec!["UPI/2/B", "UPI/3/C"]);
        assert_eq!(found[0].txn_type, TxnType::Income);
        assert!(store.existing_in_range("other", from, to).unwrap().is_empty());
    }

    #[test]
    fn test_derived_amount_and_status_persisted() {
        let (_dir, mut store) = test_store();
        store.insert_statement(&[record(1, "ATM/9", 500.0, 0.0)], &upload("abc")).unwrap();
        let (amount, status): (f64, String) = store
            .connection()
            .query_row("SELECT amount, status FROM transaction_entries", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(amount, 500.0);
        assert_eq!(status, "Expense");
    }

    #[test]
    fn test_insert_is_all_or_nothing() {
        let (_dir, mut store) = test_store();
        store
            .connection()
            .execute_batch("CREATE UNIQUE INDEX uq_party ON transaction_entries (party)")
            .unwrap();
        let rows = [
            record(1, "UPI/1/A", 10.0, 0.0),
            record(2, "UPI/2/B", 10.0, 0.0),
            record(3, "UPI/1/A", 10.0, 0.0),
        ];
        assert!(store.insert_statement(&rows, &upload("abc")).is_err());
        assert_eq!(count(&store), 0);
        assert!(!store.is_duplicate_upload("abc", "0012345678").unwrap());
    }

    fn upload(checksum: &str) -> StatementUpload {
        StatementUpload {
            filename: "april.csv".to_string(),
            checksum: checksum.to_string(),
            account_number: "0012345678".to_string(),
            ifsc: None,
            block_start: 4,
            block_end: 6,
            record_count: 2,
            date_range: None,
        }
    }

    #[test]
    fn test_statement_rows_and_upload_commit_together() {
        let (_dir, mut store) = test_store();
        let rows = [record(1, "UPI/1/A", 10.0, 0.0), record(2, "UPI/2/B", 0.0, 20.0)];
        assert_eq!(store.insert_statement(&rows, &upload("abc")).unwrap(), 2);
        assert_eq!(count(&store), 2);
        assert!(store.is_duplicate_upload("abc", "0012345678").unwrap());
    }

    #[test]
    fn test_failed_upload_record_rolls_back_rows() {
        let (_dir, mut store) = test_store();
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_upload BEFORE INSERT ON statement_uploads \
                 BEGIN SELECT RAISE(ABORT, 'upload rejected'); END;",
            )
            .unwrap();
        let rows = [record(1, "UPI/1/A", 10.0, 0.0), record(2, "UPI/2/B", 0.0, 20.0)];
        assert!(store.insert_statement(&rows, &upload("abc")).is_err());
        assert_eq!(count(&store), 0);
        assert!(!store.is_duplicate_upload("abc", "0012345678").unwrap());
    }

    #[test]
    fn test_duplicate_upload_by_checksum_and_account() {
        let (_dir, mut store) = test_store();
        let upload = StatementUpload {
            filename: "april.xlsx".to_string(),
            checksum: "abc".to_string(),
            account_number: "0012345678".to_string(),
            ifsc: Some("SBIN0001234".to_string()),
            block_start: 5,
            block_end: 20,
            record_count: 15,
            date_range: None,
        };
        store.insert_statement(&[], &upload).unwrap();
        assert!(store.is_duplicate_upload("abc", "0012345678").unwrap());
        assert!(!store.is_duplicate_upload("abc", "999").unwrap());
        assert!(!store.is_duplicate_upload("def", "0012345678").unwrap());
    }
}
