//! Text similarity, tokenization and token-sequence pattern matching.
//!
//! Token patterns are JSON arrays of token specs in the style of rule-based
//! NLP matchers, e.g.
//!
//! ```json
//! [{"LOWER": "ifsc"}, {"IS_PUNCT": true, "OP": "*"}, {"REGEX": "^[A-Z]{4}0"}]
//! ```

use std::collections::HashSet;

use regex::Regex;
use serde::Deserialize;

use crate::error::{HisaabError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
}

impl Token {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    fn is_digit(&self) -> bool {
        !self.text.is_empty() && self.text.chars().all(|c| c.is_ascii_digit())
    }

    fn is_alpha(&self) -> bool {
        !self.text.is_empty() && self.text.chars().all(char::is_alphabetic)
    }

    fn is_punct(&self) -> bool {
        !self.text.is_empty() && self.text.chars().all(|c| c.is_ascii_punctuation())
    }

    fn like_num(&self) -> bool {
        let digits = self.text.replace([',', '.'], "");
        !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
    }
}

pub trait SimilarityEngine {
    /// Similarity in `[0, 1]`; 1 means the same phrase.
    fn similarity(&self, a: &str, b: &str) -> f64;

    fn tokenize(&self, text: &str) -> Vec<Token>;
}

/// Lower-case, drop punctuation, collapse whitespace.
pub fn normalize_label(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn bigrams(s: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Sørensen–Dice coefficient over character bigrams.
fn dice(a: &str, b: &str) -> f64 {
    let a = bigrams(a);
    let mut b = bigrams(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let total = a.len() + b.len();
    let mut shared = 0usize;
    for pair in &a {
        if let Some(pos) = b.iter().position(|p| p == pair) {
            b.swap_remove(pos);
            shared += 1;
        }
    }
    2.0 * shared as f64 / total as f64
}

fn jaccard(a: &str, b: &str) -> f64 {
    let wa: HashSet<&str> = a.split_whitespace().collect();
    let wb: HashSet<&str> = b.split_whitespace().collect();
    let union = wa.union(&wb).count();
    if union == 0 {
        return 0.0;
    }
    wa.intersection(&wb).count() as f64 / union as f64
}

/// Surface-form similarity: word overlap or character-bigram overlap,
/// whichever is stronger.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalEngine;

impl SimilarityEngine for LexicalEngine {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let na = normalize_label(a);
        let nb = normalize_label(b);
        if na.is_empty() || nb.is_empty() {
            return 0.0;
        }
        if na == nb {
            return 1.0;
        }
        jaccard(&na, &nb).max(dice(&na, &nb))
    }

    fn tokenize(&self, text: &str) -> Vec<Token> {
        const LEADING: &[char] = &['(', '[', '{', '"', '\''];
        const TRAILING: &[char] = &['.', ',', ':', ';', ')', ']', '}', '"', '\''];

        let mut tokens = Vec::new();
        for chunk in text.split_whitespace() {
            for (i, piece) in chunk.split(':').enumerate() {
                if i > 0 {
                    tokens.push(Token::new(":"));
                }
                let mut rest = piece;
                while let Some(c) = rest.chars().next().filter(|c| LEADING.contains(c)) {
                    tokens.push(Token::new(&c.to_string()));
                    rest = &rest[c.len_utf8()..];
                }
                let mut trailing = Vec::new();
                while let Some(c) = rest.chars().last().filter(|c| TRAILING.contains(c)) {
                    trailing.push(Token::new(&c.to_string()));
                    rest = &rest[..rest.len() - c.len_utf8()];
                }
                if !rest.is_empty() {
                    tokens.push(Token::new(rest));
                }
                tokens.extend(trailing.into_iter().rev());
            }
        }
        tokens
    }
}

// ---------------------------------------------------------------------------
// Token patterns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextMatch {
    Exact(String),
    In {
        #[serde(rename = "IN")]
        options: Vec<String>,
    },
}

impl TextMatch {
    fn matches(&self, value: &str) -> bool {
        match self {
            Self::Exact(s) => s == value,
            Self::In { options } => options.iter().any(|o| o == value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Quantifier {
    #[serde(rename = "?")]
    Optional,
    #[serde(rename = "*")]
    ZeroOrMore,
    #[serde(rename = "+")]
    OneOrMore,
    #[serde(rename = "!")]
    Negate,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", deny_unknown_fields)]
struct TokenSpec {
    text: Option<TextMatch>,
    lower: Option<TextMatch>,
    is_digit: Option<bool>,
    is_alpha: Option<bool>,
    is_punct: Option<bool>,
    like_num: Option<bool>,
    regex: Option<String>,
    op: Option<Quantifier>,
}

#[derive(Debug, Clone)]
struct CompiledSpec {
    spec: TokenSpec,
    regex: Option<Regex>,
}

impl CompiledSpec {
    fn matches(&self, token: &Token) -> bool {
        let s = &self.spec;
        s.text.as_ref().map_or(true, |m| m.matches(&token.text))
            && s.lower.as_ref().map_or(true, |m| m.matches(&token.text.to_lowercase()))
            && s.is_digit.map_or(true, |v| token.is_digit() == v)
            && s.is_alpha.map_or(true, |v| token.is_alpha() == v)
            && s.is_punct.map_or(true, |v| token.is_punct() == v)
            && s.like_num.map_or(true, |v| token.like_num() == v)
            && self.regex.as_ref().map_or(true, |re| re.is_match(&token.text))
    }
}

#[derive(Debug, Clone)]
pub struct TokenPattern {
    specs: Vec<CompiledSpec>,
}

impl TokenPattern {
    pub fn parse(json: &str) -> Result<Self> {
        let specs: Vec<TokenSpec> = serde_json::from_str(json)
            .map_err(|e| HisaabError::Validation(format!("bad token pattern {json}: {e}")))?;
        if specs.is_empty() {
            return Err(HisaabError::Validation("token pattern is empty".to_string()));
        }
        let specs = specs
            .into_iter()
            .map(|spec| {
                let regex = spec
                    .regex
                    .as_deref()
                    .map(Regex::new)
                    .transpose()
                    .map_err(|e| HisaabError::Validation(format!("bad REGEX in token pattern: {e}")))?;
                Ok(CompiledSpec { spec, regex })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { specs })
    }

    fn ends_from(specs: &[CompiledSpec], tokens: &[Token], pos: usize, out: &mut Vec<usize>) {
        let Some((first, rest)) = specs.split_first() else {
            out.push(pos);
            return;
        };
        let hit = |p: usize| p < tokens.len() && first.matches(&tokens[p]);
        match first.spec.op {
            None => {
                if hit(pos) {
                    Self::ends_from(rest, tokens, pos + 1, out);
                }
            }
            Some(Quantifier::Negate) => {
                if pos < tokens.len() && !first.matches(&tokens[pos]) {
                    Self::ends_from(rest, tokens, pos + 1, out);
                }
            }
            Some(Quantifier::Optional) => {
                Self::ends_from(rest, tokens, pos, out);
                if hit(pos) {
                    Self::ends_from(rest, tokens, pos + 1, out);
                }
            }
            Some(Quantifier::ZeroOrMore) => {
                let mut p = pos;
                loop {
                    Self::ends_from(rest, tokens, p, out);
                    if !hit(p) {
                        break;
                    }
                    p += 1;
                }
            }
            Some(Quantifier::OneOrMore) => {
                let mut p = pos;
                while hit(p) {
                    p += 1;
                    Self::ends_from(rest, tokens, p, out);
                }
            }
        }
    }

    /// Longest match starting at `start`, as an exclusive end index.
    fn longest_at(&self, tokens: &[Token], start: usize) -> Option<usize> {
        let mut ends = Vec::new();
        Self::ends_from(&self.specs, tokens, start, &mut ends);
        ends.into_iter().filter(|&end| end > start).max()
    }
}

/// All `(start, end)` spans matched by any pattern, ordered by start. At each
/// start position a pattern contributes its longest match.
pub fn match_patterns(tokens: &[Token], patterns: &[TokenPattern]) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    for start in 0..tokens.len() {
        for pattern in patterns {
            if let Some(end) = pattern.longest_at(tokens, start) {
                if !spans.contains(&(start, end)) {
                    spans.push((start, end));
                }
            }
        }
    }
    spans.sort();
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_similarity_exact_after_normalization() {
        let engine = LexicalEngine;
        assert_eq!(engine.similarity("Withdrawal Amt.", "withdrawal amt"), 1.0);
        assert_eq!(engine.similarity("BALANCE", "balance"), 1.0);
        assert_eq!(engine.similarity("", "balance"), 0.0);
    }

    #[test]
    fn test_similarity_ranks_related_labels_higher() {
        let engine = LexicalEngine;
        let close = engine.similarity("Txn Date", "transaction date");
        let far = engine.similarity("Txn Date", "closing balance");
        assert!(close > far, "{close} vs {far}");
        assert!(close > 0.0 && close < 1.0);
    }

    #[test]
    fn test_tokenize_splits_punctuation() {
        let engine = LexicalEngine;
        let tokens = engine.tokenize("A/C No. : 0012345678  IFSC:SBIN0001234 (Savings)");
        assert_eq!(
            texts(&tokens),
            vec!["A/C", "No", ".", ":", "0012345678", "IFSC", ":", "SBIN0001234", "(", "Savings", ")"]
        );
    }

    #[test]
    fn test_pattern_with_optional_and_star() {
        let engine = LexicalEngine;
        let pattern = TokenPattern::parse(
            r#"[{"LOWER": {"IN": ["account", "a/c"]}}, {"LOWER": {"IN": ["number", "no"]}, "OP": "?"},
                {"IS_PUNCT": true, "OP": "*"}, {"REGEX": "^[0-9]{6,}$"}]"#,
        )
        .unwrap();
        let tokens = engine.tokenize("Name: R Sharma Account Number : 0012345678 Branch");
        let spans = match_patterns(&tokens, &[pattern.clone()]);
        assert_eq!(spans, vec![(4, 8)]);
        assert_eq!(tokens[spans[0].1 - 1].text, "0012345678");

        let tokens = engine.tokenize("A/C 99887766");
        assert_eq!(match_patterns(&tokens, &[pattern]), vec![(0, 2)]);
    }

    #[test]
    fn test_pattern_one_or_more_and_negate() {
        let engine = LexicalEngine;
        let pattern = TokenPattern::parse(r#"[{"LOWER": "ref"}, {"IS_DIGIT": true, "OP": "+"}, {"IS_PUNCT": true, "OP": "!"}]"#)
            .unwrap();
        let tokens = engine.tokenize("ref 12 34 end");
        assert_eq!(match_patterns(&tokens, &[pattern]), vec![(0, 4)]);
    }

    #[test]
    fn test_no_match_returns_empty() {
        let engine = LexicalEngine;
        let pattern = TokenPattern::parse(r#"[{"LOWER": "ifsc"}, {"REGEX": "^[A-Z]{4}0"}]"#).unwrap();
        assert!(match_patterns(&engine.tokenize("nothing to see"), &[pattern]).is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_patterns() {
        assert!(TokenPattern::parse("not json").is_err());
        assert!(TokenPattern::parse("[]").is_err());
        assert!(TokenPattern::parse(r#"[{"REGEX": "("}]"#).is_err());
        assert!(TokenPattern::parse(r#"[{"SHAPE": "dddd"}]"#).is_err());
    }
}
