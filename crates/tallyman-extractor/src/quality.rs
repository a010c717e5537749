//! Structural quality measurement of provider output

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use tallyman_domain::RawExtraction;

use crate::config::DEFAULT_TOP_CODE_TERMS;

/// Exactly four digits, word bounded (account codes, note refs, years)
static CODE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9]{4}\b").expect("static pattern compiles"));

/// Structural metrics derived from one raw extraction
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QualitySignal {
    /// Page count reported by the provider
    pub pages: usize,

    /// Recognized text length in characters
    pub text_length: usize,

    /// Tables across all pages
    pub tables: usize,

    /// Layout blocks across all pages
    pub blocks: usize,

    /// Paragraphs across all pages
    pub paragraphs: usize,

    /// Distinct four-digit code tokens in the text
    pub distinct_code_terms: usize,

    /// Most frequent code tokens with their counts
    pub top_code_terms: Vec<(String, usize)>,
}

impl QualitySignal {
    /// Recognized characters per page, or `None` when there are no pages
    pub fn chars_per_page(&self) -> Option<f64> {
        (self.pages > 0).then(|| self.text_length as f64 / self.pages as f64)
    }
}

/// Computes [`QualitySignal`]s
///
/// Pure: the same extraction always yields the same signal.
#[derive(Debug, Clone)]
pub struct QualityEvaluator {
    top_n: usize,
}

impl QualityEvaluator {
    /// Create an evaluator reporting the `top_n` most frequent code tokens
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    /// Measure an extraction
    pub fn evaluate(&self, raw: &RawExtraction) -> QualitySignal {
        let (distinct_code_terms, top_code_terms) = self.rank_code_terms(&raw.text);

        QualitySignal {
            pages: raw.page_count,
            text_length: raw.text.chars().count(),
            tables: raw.table_count(),
            blocks: raw.block_count(),
            paragraphs: raw.paragraph_count(),
            distinct_code_terms,
            top_code_terms,
        }
    }

    /// Count code tokens; ties keep first-seen order
    fn rank_code_terms(&self, text: &str) -> (usize, Vec<(String, usize)>) {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut first_seen: Vec<&str> = Vec::new();

        for m in CODE_TOKEN.find_iter(text) {
            let count = counts.entry(m.as_str()).or_insert(0);
            if *count == 0 {
                first_seen.push(m.as_str());
            }
            *count += 1;
        }

        let mut ranked: Vec<(String, usize)> = first_seen
            .into_iter()
            .map(|term| (term.to_string(), counts[term]))
            .collect();
        // Stable sort keeps first-seen order within equal counts
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let distinct = ranked.len();
        ranked.truncate(self.top_n);
        (distinct, ranked)
    }
}

impl Default for QualityEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_CODE_TERMS)
    }
}
