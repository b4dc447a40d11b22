// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query classification for adaptive fusion.
//!
//! Keyword-like queries (few tokens, low stopword ratio, symbols/digits)
//! lean on sparse retrieval; semantic-like queries (long natural-language
//! sentences) lean on dense retrieval; everything else is mixed.

/// Coarse query category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Keyword,
    Semantic,
    Mixed,
}

/// Features extracted from a query, consumed by the fusion layer.
#[derive(Debug, Clone)]
pub struct QueryInfo {
    pub token_count: usize,
    pub stopword_ratio: f64,
    pub has_symbols: bool,
    pub has_digits: bool,
    pub kind: QueryKind,
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "do", "does", "for", "from", "how",
    "i", "in", "is", "it", "my", "of", "on", "or", "that", "the", "this", "to", "was", "what",
    "when", "where", "which", "who", "why", "will", "with", "you", "your",
];

/// Analyze a query's surface features and classify it.
pub fn analyze_query(query: &str) -> QueryInfo {
    let tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect();
    let token_count = tokens.len();

    let stopwords = tokens
        .iter()
        .filter(|t| STOPWORDS.contains(&t.as_str()))
        .count();
    let stopword_ratio = if token_count == 0 {
        0.0
    } else {
        stopwords as f64 / token_count as f64
    };

    let has_digits = query.chars().any(|c| c.is_ascii_digit());
    let has_symbols = query
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace() && !matches!(c, '?' | '.' | ',' | '!'));

    let kind = if token_count <= 3 && stopword_ratio < 0.34 {
        QueryKind::Keyword
    } else if token_count <= 6 && (has_symbols || has_digits) && stopword_ratio < 0.34 {
        QueryKind::Keyword
    } else if token_count >= 12 && !has_symbols {
        QueryKind::Semantic
    } else {
        QueryKind::Mixed
    };

    QueryInfo {
        token_count,
        stopword_ratio,
        has_symbols,
        has_digits,
        kind,
    }
}
