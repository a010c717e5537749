//! Baseline structural parser
//!
//! [`LineItemParser`] scans table rows and text lines for known line-item
//! labels and reads the current-period figure next to them. It is deliberately
//! conservative: a label only matches when the rest of the line is numeric, so
//! narrative sentences mentioning "turnover" never produce a figure.

use regex::Regex;
use std::sync::LazyLock;
use tallyman_domain::traits::{ParseRequest, ParsedDocument, StructuralParser};
use tallyman_domain::{
    EntitySize, FilingType, ParseError, RawExtraction, RecordMetadata, ReportingStandard,
    StructuredRecord, TransactionLine, UnitScale,
};
use tracing::debug;

/// Numeric amount token: optional parentheses, optional currency, digits with
/// thousands separators, optional decimals
static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(?-?£?[0-9][0-9,]*(?:\.[0-9]+)?\)?|\(?-\)?").expect("static pattern compiles")
});

/// Line-item labels and the metric they populate, most specific first
const LABELS: &[(&str, &[&str])] = &[
    ("total_assets_less_current_liabilities", &["total assets less current liabilities"]),
    ("net_current_assets", &["net current assets", "net current liabilities", "net current assets/(liabilities)"]),
    ("total_liabilities", &["total liabilities"]),
    ("total_assets", &["total assets"]),
    ("current_assets", &["total current assets", "current assets"]),
    ("fixed_assets", &["total fixed assets", "fixed assets", "non-current assets"]),
    ("current_liabilities", &["creditors: amounts falling due within one year", "current liabilities"]),
    ("long_term_liabilities", &["creditors: amounts falling due after more than one year", "non-current liabilities"]),
    ("net_assets", &["net assets", "net liabilities", "net assets/(liabilities)", "total equity"]),
    ("cash", &["cash at bank and in hand", "cash and cash equivalents", "cash at bank"]),
    ("profit_before_tax", &["profit before taxation", "profit before tax", "(loss)/profit before taxation", "profit/(loss) before taxation"]),
    ("profit_after_tax", &["profit for the financial year", "profit for the year", "profit after tax"]),
    ("turnover", &["turnover", "revenue"]),
    ("cost_of_sales", &["cost of sales"]),
    ("gross_profit", &["gross profit"]),
];

/// Metrics whose absence is reported as a parser warning
const EXPECTED_METRICS: &[&str] = &["total_assets", "net_assets", "turnover", "profit_before_tax"];

/// Label-driven line-item parser
#[derive(Debug, Clone, Default)]
pub struct LineItemParser;

impl LineItemParser {
    /// Create a parser
    pub fn new() -> Self {
        Self
    }
}

impl StructuralParser for LineItemParser {
    fn parse(
        &self,
        raw: &RawExtraction,
        request: &ParseRequest,
    ) -> Result<ParsedDocument, ParseError> {
        let lines = collect_lines(raw);
        if raw.page_count == 0 && lines.is_empty() {
            return Err(ParseError::new("0 pages detected; nothing to parse"));
        }
        if lines.is_empty() {
            return Err(ParseError::new("no recognizable text in extraction"));
        }

        let lower_text = lines.join("\n").to_lowercase();
        let (unit_scale, unit_scale_validated) = detect_unit_scale(&lower_text);
        let filing_type = detect_filing_type(&lower_text);
        let reporting_standard = detect_standard(&lower_text, filing_type);

        let mut record = StructuredRecord::new(RecordMetadata {
            filing_type,
            reporting_standard,
            unit_scale,
            unit_scale_validated,
            ..RecordMetadata::default()
        });

        for line in &lines {
            if let Some((metric, value)) = match_line_item(line) {
                // First occurrence wins: statements precede the notes
                if !record.metrics.contains_key(metric) {
                    record.set_metric(metric, value * unit_scale.multiplier());
                }
            }
        }

        if record.metric("total_liabilities").is_none() {
            let current = record.metric("current_liabilities");
            let long_term = record.metric("long_term_liabilities");
            if current.is_some() || long_term.is_some() {
                let total = current.unwrap_or(0.0).abs() + long_term.unwrap_or(0.0).abs();
                record.set_metric("total_liabilities", total);
            }
        }

        derive_ratios(&mut record);

        record.metadata.entity_size = classify_size(&record);
        record.related_party_transactions = collect_transactions(&lines, "related part", unit_scale);
        record.intercompany_transactions = collect_transactions(&lines, "intercompany", unit_scale);

        let mut warnings = Vec::new();
        for metric in EXPECTED_METRICS {
            if record.metric(metric).is_none() {
                warnings.push(format!("metric '{}' not found", metric));
            }
        }
        if !unit_scale_validated {
            warnings.push("currency unit scale not stated; assuming whole units".to_string());
        }

        record.metadata.confidence_score = confidence(&record, warnings.len());

        debug!(
            "Parsed '{}' ({}) period {}: {} metrics, {} warnings",
            request.entity_name,
            request.entity_id,
            request.period_end,
            record.metrics.len(),
            warnings.len()
        );

        Ok(ParsedDocument { record, warnings })
    }
}

/// Table rows (cells joined) followed by text lines
fn collect_lines(raw: &RawExtraction) -> Vec<String> {
    let mut lines = Vec::new();
    for page in &raw.pages {
        for table in &page.tables {
            for row in &table.rows {
                let joined = row.join(" ");
                if !joined.trim().is_empty() {
                    lines.push(joined.trim().to_string());
                }
            }
        }
    }
    lines.extend(
        raw.text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string),
    );
    lines
}

/// Match a line against the label table, returning the current-period figure
fn match_line_item(line: &str) -> Option<(&'static str, f64)> {
    let lower = line.to_lowercase();
    for (metric, synonyms) in LABELS {
        for label in *synonyms {
            if let Some(rest) = lower.strip_prefix(label) {
                // A letter after the label means a longer label or prose
                if rest.chars().any(|c| c.is_alphabetic()) {
                    continue;
                }
                let value = current_period_amount(rest)?;
                return Some((*metric, value));
            }
        }
    }
    None
}

/// Pick the current-period figure from the numeric columns after a label
///
/// Three tokens are read as note, current, prior; two as current, prior.
fn current_period_amount(rest: &str) -> Option<f64> {
    let tokens: Vec<&str> = AMOUNT.find_iter(rest).map(|m| m.as_str()).collect();
    let token = match tokens.len() {
        0 => return None,
        1 | 2 => tokens[0],
        _ => tokens[1],
    };
    parse_amount(token)
}

/// Parse an amount token; parentheses mean negative, a lone dash means zero
pub(crate) fn parse_amount(token: &str) -> Option<f64> {
    let trimmed = token.trim();
    let negative =
        (trimmed.starts_with('(') && trimmed.ends_with(')')) || trimmed.starts_with('-');
    let digits: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() {
        return trimmed.contains('-').then_some(0.0);
    }
    let value: f64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

fn detect_unit_scale(lower_text: &str) -> (UnitScale, bool) {
    if ["£'000", "£000", "£ 000", "in thousands", "thousands of pounds"]
        .iter()
        .any(|m| lower_text.contains(m))
    {
        (UnitScale::Thousands, true)
    } else if ["£m", "£'m", "in millions", "millions of pounds"]
        .iter()
        .any(|m| lower_text.contains(m))
    {
        (UnitScale::Millions, true)
    } else if lower_text.contains('£') {
        (UnitScale::Units, true)
    } else {
        (UnitScale::Units, false)
    }
}

fn detect_filing_type(lower_text: &str) -> FilingType {
    if lower_text.contains("dormant") {
        FilingType::Dormant
    } else if lower_text.contains("micro-entit") || lower_text.contains("micro entit") {
        FilingType::Micro
    } else if lower_text.contains("abridged") {
        FilingType::Abridged
    } else if lower_text.contains("profit and loss account has not been delivered")
        || lower_text.contains("not delivered a copy of the")
    {
        FilingType::Filleted
    } else if lower_text.contains("profit and loss")
        || lower_text.contains("income statement")
        || lower_text.contains("turnover")
    {
        FilingType::Full
    } else {
        FilingType::Unknown
    }
}

fn detect_standard(lower_text: &str, filing_type: FilingType) -> ReportingStandard {
    if lower_text.contains("frs 105") || lower_text.contains("frs105") {
        ReportingStandard::Frs105
    } else if lower_text.contains("frs 102") || lower_text.contains("frs102") {
        ReportingStandard::Frs102
    } else if lower_text.contains("ifrs") || lower_text.contains("international financial reporting") {
        ReportingStandard::Ifrs
    } else if filing_type == FilingType::Micro {
        ReportingStandard::Frs105
    } else {
        ReportingStandard::Unknown
    }
}

fn derive_ratios(record: &mut StructuredRecord) {
    if let (Some(assets), Some(liabilities)) = (
        record.metric("current_assets"),
        record.metric("current_liabilities"),
    ) {
        if liabilities != 0.0 {
            record.set_metric("current_ratio", assets / liabilities.abs());
        }
    }
    if let (Some(profit), Some(turnover)) =
        (record.metric("profit_after_tax"), record.metric("turnover"))
    {
        if turnover != 0.0 {
            record.set_metric("net_margin", profit / turnover);
        }
    }
    if let (Some(liabilities), Some(net_assets)) =
        (record.metric("total_liabilities"), record.metric("net_assets"))
    {
        if net_assets > 0.0 {
            record.set_metric("gearing", liabilities / net_assets);
        }
    }
}

/// Size class from the two-of-three thresholds (turnover, total assets)
fn classify_size(record: &StructuredRecord) -> EntitySize {
    let turnover = record.metric("turnover");
    let assets = record.metric("total_assets");
    let largest = match (turnover, assets) {
        (None, None) => return EntitySize::Unknown,
        (t, a) => t.unwrap_or(0.0).max(a.unwrap_or(0.0)),
    };
    if largest <= 632_000.0 {
        EntitySize::Micro
    } else if largest <= 10_200_000.0 {
        EntitySize::Small
    } else if largest <= 36_000_000.0 {
        EntitySize::Medium
    } else {
        EntitySize::Large
    }
}

/// Lines mentioning `marker` with a counterparty and a trailing amount
///
/// Expected shape: `<marker text> - <counterparty>: <description> <amount>`.
fn collect_transactions(lines: &[String], marker: &str, scale: UnitScale) -> Vec<TransactionLine> {
    let mut found = Vec::new();
    for line in lines {
        let lower = line.to_lowercase();
        if !lower.contains(marker) {
            continue;
        }
        let Some((_, detail)) = line.split_once(" - ") else {
            continue;
        };
        let Some((counterparty, rest)) = detail.split_once(':') else {
            continue;
        };
        let Some(amount_match) = AMOUNT.find_iter(rest).last() else {
            continue;
        };
        let Some(amount) = parse_amount(amount_match.as_str()) else {
            continue;
        };
        let description = rest[..amount_match.start()].trim().to_string();
        found.push(TransactionLine {
            counterparty: counterparty.trim().to_string(),
            description,
            amount: amount * scale.multiplier(),
        });
    }
    found
}

/// Share of expected values present, discounted per warning
fn confidence(record: &StructuredRecord, warning_count: usize) -> f64 {
    let present = EXPECTED_METRICS
        .iter()
        .filter(|m| record.metric(m).is_some())
        .count();
    let coverage = present as f64 / EXPECTED_METRICS.len() as f64;
    let mut score = 0.3 + 0.7 * coverage;
    if !record.metadata.unit_scale_validated {
        score -= 0.1;
    }
    score -= 0.02 * warning_count as f64;
    (score.clamp(0.0, 1.0) * 100.0).round() / 100.0
}
