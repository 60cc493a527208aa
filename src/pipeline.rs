use std::path::Path;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::dates::DateParser;
use crate::dedup::DedupKeyKind;
use crate::error::{HisaabError, Result};
use crate::extract::{EntityExtractor, ACCOUNT_NUMBER, IFSC_CODE};
use crate::grid::{load_grid, Grid};
use crate::header::{HeaderResolution, HeaderResolver, HeaderSynonyms};
use crate::locator::locate_block;
use crate::materializer::Materializer;
use crate::models::{ColumnRoleAssignment, Resolution, TransactionBlock, TransactionRecord};
use crate::roles::{classify_columns, infer_roles, ColumnClasses};
use crate::similarity::SimilarityEngine;
use crate::store::{PatternRepository, StatementUpload, Store};

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementEntities {
    pub account_number: Option<String>,
    pub ifsc: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StatementStructure {
    pub block: TransactionBlock,
    pub classes: ColumnClasses,
    pub roles: ColumnRoleAssignment,
    pub header: HeaderResolution,
}

#[derive(Debug, Clone)]
pub struct StatementAnalysis {
    pub entities: StatementEntities,
    pub structure: StatementStructure,
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub account: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub account: String,
    pub ifsc: Option<String>,
    pub duplicate_file: bool,
    /// Rows not seen before (inserted unless this was a dry run).
    pub new_rows: usize,
    pub inserted: usize,
    pub scanned: usize,
    pub stopped_early: bool,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

// ---------------------------------------------------------------------------
// StatementImporter
// ---------------------------------------------------------------------------

pub struct StatementImporter<'a> {
    engine: &'a dyn SimilarityEngine,
    materializer: Materializer,
    default_account: Option<String>,
}

impl<'a> StatementImporter<'a> {
    pub fn new(engine: &'a dyn SimilarityEngine, dates: DateParser, dedup: DedupKeyKind) -> Self {
        Self {
            engine,
            materializer: Materializer::new(dates, dedup),
            default_account: None,
        }
    }

    pub fn with_default_account(mut self, account: Option<String>) -> Self {
        self.default_account = account;
        self
    }

    /// Account number and IFSC code found anywhere in the sheet.
    pub fn entities(&self, grid: &Grid, repo: &dyn PatternRepository) -> Result<StatementEntities> {
        let tokens = self.engine.tokenize(&grid.to_text());
        let extractor = EntityExtractor::new(self.engine, repo);
        Ok(StatementEntities {
            account_number: extractor.extract(ACCOUNT_NUMBER, None, Some(&tokens))?,
            ifsc: extractor.extract(IFSC_CODE, None, Some(&tokens))?,
        })
    }

    pub fn infer_structure(&self, grid: &Grid, repo: &dyn PatternRepository) -> Result<StatementStructure> {
        let order = self.materializer.dates.order;
        let block = match locate_block(grid, order)? {
            Resolution::Resolved(block) => block,
            Resolution::Ambiguous(blocks) => {
                let spans: Vec<String> = blocks
                    .iter()
                    .map(|b| format!("rows {}-{}", b.start + 1, b.end))
                    .collect();
                return Err(HisaabError::StructuralInference(format!(
                    "several equally long transaction blocks ({})",
                    spans.join(", ")
                )));
            }
        };

        let classes = classify_columns(grid, &block, order);
        debug!(?classes, "classified block columns");
        let roles = match infer_roles(grid, &block, &classes.numeric)? {
            Resolution::Resolved(roles) => roles,
            Resolution::Ambiguous(tied) => {
                return Err(HisaabError::StructuralInference(format!(
                    "{} credit/debit/balance assignments tie at score {:.1}",
                    tied.len(),
                    tied.first().map_or(0.0, |r| r.score)
                )));
            }
        };

        let synonyms = HeaderSynonyms::load(repo)?;
        let header = HeaderResolver::new(self.engine, &synonyms).resolve(grid, &block, &classes, &roles)?;
        Ok(StatementStructure {
            block,
            classes,
            roles,
            header,
        })
    }

    pub fn analyze(&self, grid: &Grid, repo: &dyn PatternRepository) -> Result<StatementAnalysis> {
        Ok(StatementAnalysis {
            entities: self.entities(grid, repo)?,
            structure: self.infer_structure(grid, repo)?,
        })
    }

    /// Records the block would produce, oldest first, without touching the store.
    pub fn preview(&self, grid: &Grid, structure: &StatementStructure, account: &str) -> Result<Vec<TransactionRecord>> {
        self.materializer.rows(
            grid,
            &structure.block,
            &structure.header.column_map,
            structure.roles.orientation,
            account,
        )
    }

    pub fn import_file(&self, store: &mut Store, file_path: &Path, options: &ImportOptions) -> Result<ImportSummary> {
        let checksum = compute_checksum(file_path)?;
        let grid = load_grid(file_path)?;
        let entities = self.entities(&grid, &*store)?;
        let account = options
            .account
            .clone()
            .or_else(|| entities.account_number.clone())
            .or_else(|| self.default_account.clone())
            .ok_or_else(|| {
                HisaabError::IncompleteData(
                    "no account number found in the statement; pass --account".to_string(),
                )
            })?;

        if store.is_duplicate_upload(&checksum, &account)? {
            info!(file = %file_path.display(), account = %account, "statement already imported");
            return Ok(ImportSummary {
                account,
                ifsc: entities.ifsc,
                duplicate_file: true,
                ..Default::default()
            });
        }

        let structure = self.infer_structure(&grid, &*store)?;
        // record_count and date_range are filled in once the new rows are known
        let upload = (!options.dry_run).then(|| StatementUpload {
            filename: file_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string(),
            checksum,
            account_number: account.clone(),
            ifsc: entities.ifsc.clone(),
            block_start: structure.block.start,
            block_end: structure.block.end,
            record_count: 0,
            date_range: None,
        });
        let outcome = self.materializer.materialize(
            store,
            &grid,
            &structure.block,
            &structure.header.column_map,
            structure.roles.orientation,
            &account,
            upload,
        )?;

        Ok(ImportSummary {
            account,
            ifsc: entities.ifsc,
            duplicate_file: false,
            new_rows: outcome.records.len(),
            inserted: outcome.inserted,
            scanned: outcome.scanned,
            stopped_early: outcome.stopped_early,
            date_range: outcome.date_range,
        })
    }
}
