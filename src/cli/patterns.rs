use comfy_table::{Cell, Table};

use crate::cli::load_store;
use crate::error::{HisaabError, Result};
use crate::header::HEADER_FIELDS;
use crate::similarity::TokenPattern;
use crate::store::{PatternKind, PatternRepository};

pub fn add(field: &str, pattern: &str, kind: PatternKind) -> Result<()> {
    let (_, store) = load_store()?;

    match kind {
        PatternKind::Token => {
            let fields = store.field_names()?;
            if !fields.iter().any(|f| f == field) {
                return Err(HisaabError::Validation(format!(
                    "token patterns must target one of {}, got '{field}'",
                    fields.join(", ")
                )));
            }
            TokenPattern::parse(pattern)?;
        }
        PatternKind::Synonym => {
            if !HEADER_FIELDS.contains(&field) {
                return Err(HisaabError::Validation(format!(
                    "header synonyms must target one of {}, got '{field}'",
                    HEADER_FIELDS.join(", ")
                )));
            }
            if pattern.trim().is_empty() {
                return Err(HisaabError::Validation("synonym must not be empty".to_string()));
            }
        }
    }

    if store.add_pattern(field, kind, pattern.trim())? {
        println!("Added {} pattern for {field}: {pattern}", kind.as_str());
    } else {
        println!("Pattern already exists for {field}.");
    }
    Ok(())
}

pub fn list(field: Option<&str>) -> Result<()> {
    let (_, store) = load_store()?;
    let rows = store.list_patterns(field)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Field", "Kind", "Pattern"]);
    for row in &rows {
        table.add_row(vec![
            Cell::new(row.id),
            Cell::new(&row.field),
            Cell::new(row.kind.as_str()),
            Cell::new(&row.pattern),
        ]);
    }
    println!("Patterns\n{table}");
    Ok(())
}
