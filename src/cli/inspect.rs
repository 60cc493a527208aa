use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{importer, load_store};
use crate::error::Result;
use crate::fmt::{amount, amount_or_blank, score};
use crate::grid::{load_grid, Grid};
use crate::models::TxnType;
use crate::similarity::LexicalEngine;

fn column_label(grid: &Grid, header_row: Option<usize>, col: usize) -> String {
    let label = header_row
        .map(|row| grid.cell(row, col).to_string())
        .unwrap_or_default();
    if label.is_empty() {
        format!("column {}", col + 1)
    } else {
        format!("{label} (column {})", col + 1)
    }
}

pub fn run(file: &str, preview_rows: usize) -> Result<()> {
    let file_path = PathBuf::from(file);
    let (settings, store) = load_store()?;
    let importer = importer(&settings, &LexicalEngine);

    let grid = load_grid(&file_path)?;
    let analysis = importer.analyze(&grid, &store)?;
    let s = &analysis.structure;
    let map = &s.header.column_map;
    let label = |col: usize| column_label(&grid, s.header.header_row, col);

    let mut table = Table::new();
    table.set_header(vec!["", ""]);
    let mut row = |name: &str, value: String| {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    };
    row("Sheet", format!("{} rows x {} columns", grid.height(), grid.width()));
    row(
        "Transactions",
        format!("rows {}-{} ({} rows)", s.block.start + 1, s.block.end, s.block.len()),
    );
    row("Metadata rows", s.block.metadata.len().to_string());
    row(
        "Header row",
        s.header
            .header_row
            .map(|r| (r + 1).to_string())
            .unwrap_or_else(|| "none".to_string()),
    );
    row("Date", label(map.transaction_date));
    row("Party", map.party.map(label).unwrap_or_else(|| "none".to_string()));
    row("Debit", label(map.debit_amount));
    row("Credit", label(map.credit_amount));
    row("Balance", label(map.remaining_balance));
    row("Balance fit", score(s.roles.score));
    row("Order", s.roles.orientation.label().to_string());
    row(
        "Account number",
        analysis
            .entities
            .account_number
            .clone()
            .unwrap_or_else(|| "not found".to_string()),
    );
    row(
        "IFSC code",
        analysis.entities.ifsc.clone().unwrap_or_else(|| "not found".to_string()),
    );
    println!("{}\n{table}", file_path.display().to_string().bold());

    if preview_rows == 0 {
        return Ok(());
    }
    let account = analysis
        .entities
        .account_number
        .clone()
        .or(settings.default_account.clone())
        .unwrap_or_default();
    let records = importer.preview(&grid, s, &account)?;

    let mut preview = Table::new();
    preview.set_header(vec!["Date", "Party", "Debit", "Credit", "Balance", "Type"]);
    for r in records.iter().take(preview_rows) {
        let kind = match r.txn_type {
            TxnType::Income => r.txn_type.as_str().green(),
            TxnType::Expense => r.txn_type.as_str().red(),
        };
        preview.add_row(vec![
            Cell::new(r.transaction_date),
            Cell::new(&r.party),
            Cell::new(amount_or_blank(r.debit_amount)),
            Cell::new(amount_or_blank(r.credit_amount)),
            Cell::new(amount(r.remaining_balance)),
            Cell::new(kind),
        ]);
    }
    println!("First {} of {} transactions (oldest first)\n{preview}", preview_rows.min(records.len()), records.len());
    Ok(())
}
