pub mod import;
pub mod init;
pub mod inspect;
pub mod patterns;
pub mod transactions;

use clap::{Parser, Subcommand};

use crate::dates::{DateOrder, DateParser};
use crate::dedup::DedupKeyKind;
use crate::error::{HisaabError, Result};
use crate::pipeline::StatementImporter;
use crate::settings::{load_settings, Settings};
use crate::similarity::SimilarityEngine;
use crate::store::{PatternKind, Store};

/// Open the database named by the settings file.
pub(crate) fn open_store(settings: &Settings) -> Result<Store> {
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(HisaabError::Settings(format!(
            "No database found at {}\nRun `hisaab init` to create one.",
            db_path.display()
        )));
    }
    let store = Store::open(&db_path)?;
    store.init()?;
    Ok(store)
}

pub(crate) fn load_store() -> Result<(Settings, Store)> {
    let settings = load_settings();
    let store = open_store(&settings)?;
    Ok((settings, store))
}

pub(crate) fn importer<'a>(settings: &Settings, engine: &'a dyn SimilarityEngine) -> StatementImporter<'a> {
    StatementImporter::new(engine, DateParser::new(settings.date_order), settings.dedup_key)
        .with_default_account(settings.default_account.clone())
}

#[derive(Parser)]
#[command(
    name = "hisaab",
    about = "Import bank statements of any layout into a local ledger, once."
)]
pub struct Cli {
    /// Log pipeline decisions to stderr (overridden by HISAAB_LOG).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for hisaab data (default: ~/Documents/hisaab)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// How to read numeric dates such as 01/02/2024
        #[arg(long, value_enum)]
        date_order: Option<DateOrder>,
        /// Identity used to skip rows that were already imported
        #[arg(long, value_enum)]
        dedup_key: Option<DedupKeyKind>,
        /// Account used when a statement names none
        #[arg(long)]
        default_account: Option<String>,
    },
    /// Import a CSV/XLSX bank statement.
    Import {
        /// Path to the statement file
        file: String,
        /// Account to import into (default: the account number found in the file)
        #[arg(long)]
        account: Option<String>,
        /// Report what would be imported without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Show how a statement would be read, without importing it.
    Inspect {
        /// Path to the statement file
        file: String,
        /// Number of transactions to preview
        #[arg(long, default_value_t = 5)]
        rows: usize,
    },
    /// Manage entity patterns and header synonyms.
    Patterns {
        #[command(subcommand)]
        command: PatternsCommands,
    },
    /// List imported transactions.
    Transactions {
        /// Only this account
        #[arg(long)]
        account: Option<String>,
        /// Start date: YYYY-MM-DD
        #[arg(long)]
        from: Option<String>,
        /// End date: YYYY-MM-DD
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PatternsCommands {
    /// Add a token pattern or a header synonym.
    Add {
        /// Entity field (e.g. "Account Number") or header role (date, description, debit, credit, balance)
        field: String,
        /// JSON token pattern, or a header label for synonyms
        pattern: String,
        #[arg(long, value_enum, default_value = "token")]
        kind: PatternKind,
    },
    /// List stored patterns.
    List {
        #[arg(long)]
        field: Option<String>,
    },
}
