use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::load_store;
use crate::error::{HisaabError, Result};
use crate::fmt::{amount, amount_or_blank};
use crate::models::TxnType;

fn parse_date_arg(flag: &str, raw: Option<&str>) -> Result<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| HisaabError::Validation(format!("--{flag} expects YYYY-MM-DD, got '{s}'")))
    })
    .transpose()
}

pub fn run(account: Option<&str>, from: Option<&str>, to: Option<&str>) -> Result<()> {
    let from = parse_date_arg("from", from)?;
    let to = parse_date_arg("to", to)?;
    let (_, store) = load_store()?;
    let records = store.list_transactions(account, from, to)?;

    let mut table = Table::new();
    table.set_header(vec!["Date", "Account", "Party", "Debit", "Credit", "Balance", "Type"]);
    let (mut debits, mut credits) = (0.0, 0.0);
    for r in &records {
        debits += r.debit_amount;
        credits += r.credit_amount;
        let kind = match r.txn_type {
            TxnType::Income => r.txn_type.as_str().green(),
            TxnType::Expense => r.txn_type.as_str().red(),
        };
        table.add_row(vec![
            Cell::new(r.transaction_date),
            Cell::new(&r.account),
            Cell::new(&r.party),
            Cell::new(amount_or_blank(r.debit_amount)).set_alignment(CellAlignment::Right),
            Cell::new(amount_or_blank(r.credit_amount)).set_alignment(CellAlignment::Right),
            Cell::new(amount(r.remaining_balance)).set_alignment(CellAlignment::Right),
            Cell::new(kind),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(""),
        Cell::new(format!("{} entries", records.len())),
        Cell::new(amount(debits)).set_alignment(CellAlignment::Right),
        Cell::new(amount(credits)).set_alignment(CellAlignment::Right),
        Cell::new(""),
        Cell::new(""),
    ]);
    println!("Transactions\n{table}");
    Ok(())
}
