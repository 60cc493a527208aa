use tracing::{debug, warn};

use crate::error::{HisaabError, Result};
use crate::similarity::{match_patterns, SimilarityEngine, Token, TokenPattern};
use crate::store::{PatternKind, PatternRepository};

pub const ACCOUNT_NUMBER: &str = "Account Number";
pub const IFSC_CODE: &str = "IFSC Code";

/// Pulls single-token identifiers (account number, IFSC, ...) out of free
/// statement text using stored token patterns.
pub struct EntityExtractor<'a> {
    engine: &'a dyn SimilarityEngine,
    repo: &'a dyn PatternRepository,
}

impl<'a> EntityExtractor<'a> {
    pub fn new(engine: &'a dyn SimilarityEngine, repo: &'a dyn PatternRepository) -> Self {
        Self { engine, repo }
    }

    /// Last token of the first match for `field`, or `None` when nothing
    /// matches. Pass pre-tokenized text to avoid tokenizing the sheet twice.
    pub fn extract(
        &self,
        field: &str,
        text: Option<&str>,
        tokens: Option<&[Token]>,
    ) -> Result<Option<String>> {
        let valid = self.repo.field_names()?;
        if !valid.iter().any(|v| v == field) {
            return Err(HisaabError::Validation(format!(
                "entity field must be one of {}, got '{field}'",
                valid.join(", ")
            )));
        }

        let owned;
        let tokens = match (tokens, text) {
            (Some(tokens), _) => tokens,
            (None, Some(text)) => {
                owned = self.engine.tokenize(text);
                owned.as_slice()
            }
            (None, None) => {
                return Err(HisaabError::Validation(
                    "entity extraction needs text or tokens".to_string(),
                ))
            }
        };

        let patterns: Vec<TokenPattern> = self
            .repo
            .patterns(field, PatternKind::Token)?
            .iter()
            .filter_map(|raw| match TokenPattern::parse(raw) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(field, error = %e, "skipping stored token pattern");
                    None
                }
            })
            .collect();

        let found = match_patterns(tokens, &patterns)
            .first()
            .map(|&(_, end)| tokens[end - 1].text.clone());
        debug!(field, found = found.as_deref().unwrap_or("-"), "entity extraction");
        Ok(found)
    }
}
