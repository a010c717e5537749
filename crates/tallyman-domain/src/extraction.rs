//! Raw provider output
//!
//! A [`RawExtraction`] lives only for the duration of one extraction attempt:
//! it is scored, optionally replaced by a fallback provider's output, handed
//! to the structural parser, and dropped.

use serde::{Deserialize, Serialize};

/// Output of one provider invocation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawExtraction {
    /// Identity tag of the provider that produced this extraction
    #[serde(default)]
    pub provider: String,

    /// Page count as reported by the provider
    ///
    /// Providers may report pages they returned no layout for, so this can
    /// exceed `pages.len()`.
    pub page_count: usize,

    /// Ordered page layouts
    #[serde(default)]
    pub pages: Vec<Page>,

    /// Full recognized text
    #[serde(default)]
    pub text: String,
}

/// Layout detected on one page
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number
    pub number: usize,

    /// Detected tables
    #[serde(default)]
    pub tables: Vec<Table>,

    /// Detected layout blocks
    #[serde(default)]
    pub blocks: Vec<TextBlock>,

    /// Detected paragraphs
    #[serde(default)]
    pub paragraphs: Vec<String>,
}

/// A detected table, row-major
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    /// Cell text by row
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

/// A detected layout block
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextBlock {
    /// Block text
    pub text: String,
}

impl RawExtraction {
    /// An extraction with no pages and no text
    pub fn empty(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Self::default()
        }
    }

    /// Tag the extraction with the provider that produced it
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Total tables across all pages
    pub fn table_count(&self) -> usize {
        self.pages.iter().map(|p| p.tables.len()).sum()
    }

    /// Total layout blocks across all pages
    pub fn block_count(&self) -> usize {
        self.pages.iter().map(|p| p.blocks.len()).sum()
    }

    /// Total paragraphs across all pages
    pub fn paragraph_count(&self) -> usize {
        self.pages.iter().map(|p| p.paragraphs.len()).sum()
    }
}

impl Table {
    /// Build a table from string rows
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }
}
