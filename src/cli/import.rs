use std::path::PathBuf;

use colored::Colorize;

use crate::cli::{importer, load_store};
use crate::error::Result;
use crate::pipeline::ImportOptions;
use crate::similarity::LexicalEngine;

pub fn run(file: &str, account: Option<String>, dry_run: bool) -> Result<()> {
    let file_path = PathBuf::from(file);
    let (settings, mut store) = load_store()?;
    let importer = importer(&settings, &LexicalEngine);

    let options = ImportOptions { account, dry_run };
    let summary = importer.import_file(&mut store, &file_path, &options)?;

    if summary.duplicate_file {
        println!(
            "{}",
            format!(
                "This statement has already been imported for account {} (duplicate checksum).",
                summary.account
            )
            .yellow()
        );
        return Ok(());
    }

    let ifsc = summary
        .ifsc
        .as_deref()
        .map(|code| format!(" (IFSC {code})"))
        .unwrap_or_default();
    println!("Account {}{ifsc}", summary.account.bold());
    if let Some((from, to)) = summary.date_range {
        println!("Statement covers {from} to {to}");
    }

    if dry_run {
        println!(
            "{} new of {} scanned (dry run, nothing written)",
            summary.new_rows.to_string().cyan(),
            summary.scanned
        );
    } else {
        println!(
            "{} imported, {} scanned",
            summary.inserted.to_string().green(),
            summary.scanned
        );
    }
    if summary.stopped_early {
        println!("Stopped at the first previously imported transaction.");
    }
    Ok(())
}
