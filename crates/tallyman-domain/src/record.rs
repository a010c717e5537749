//! Structured record: the durable, versioned output of parsing

use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version written on every new record
pub const SCHEMA_VERSION: u32 = 2;

/// Oldest schema version this build still reads
///
/// Version 1 predates the transaction sequences; they deserialize as empty.
pub const MIN_SCHEMA_VERSION: u32 = 1;

/// Parsed financial statement with its readiness assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRecord {
    /// Schema version, checked before any field is trusted
    pub schema_version: u32,

    /// Entity and filing metadata
    pub metadata: RecordMetadata,

    /// Named ratios and amounts computed without AI involvement
    ///
    /// A `BTreeMap` keeps key order stable, which the fingerprint depends on.
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,

    /// Pre-Analysis Gate
    pub gate: PreAnalysisGate,

    /// Intercompany transactions
    #[serde(default)]
    pub intercompany_transactions: Vec<TransactionLine>,

    /// Related-party transactions
    #[serde(default)]
    pub related_party_transactions: Vec<TransactionLine>,
}

impl StructuredRecord {
    /// Create an empty record at the current schema version
    pub fn new(metadata: RecordMetadata) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            metadata,
            metrics: BTreeMap::new(),
            gate: PreAnalysisGate::default(),
            intercompany_transactions: Vec::new(),
            related_party_transactions: Vec::new(),
        }
    }

    /// Fail unless the schema version is one this build understands
    pub fn check_schema(&self) -> Result<(), RecordError> {
        if (MIN_SCHEMA_VERSION..=SCHEMA_VERSION).contains(&self.schema_version) {
            Ok(())
        } else {
            Err(RecordError::UnsupportedSchema {
                found: self.schema_version,
                min: MIN_SCHEMA_VERSION,
                max: SCHEMA_VERSION,
            })
        }
    }

    /// Look up a finite metric value
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied().filter(|v| v.is_finite())
    }

    /// Set a metric value
    pub fn set_metric(&mut self, name: impl Into<String>, value: f64) {
        self.metrics.insert(name.into(), value);
    }

    /// Fail on the first NaN or infinite number in the record
    pub fn check_finite(&self) -> Result<(), RecordError> {
        let non_finite = |field: String| RecordError::NonFinite { field };
        if !self.metadata.confidence_score.is_finite() {
            return Err(non_finite("metadata.confidence_score".to_string()));
        }
        if let Some((name, _)) = self.metrics.iter().find(|(_, v)| !v.is_finite()) {
            return Err(non_finite(name.clone()));
        }
        for (list, lines) in [
            ("intercompany_transactions", &self.intercompany_transactions),
            ("related_party_transactions", &self.related_party_transactions),
        ] {
            if let Some(i) = lines.iter().position(|line| !line.amount.is_finite()) {
                return Err(non_finite(format!("{}[{}].amount", list, i)));
            }
        }
        Ok(())
    }

    /// Remove every NaN or infinite number from the record
    ///
    /// Metrics and transaction lines holding one are dropped and a
    /// non-finite confidence becomes 0.0. Returns one warning per removal.
    pub fn drop_non_finite(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.metadata.confidence_score.is_finite() {
            warnings.push(format!(
                "confidence score {} is not a finite number; reset to 0",
                self.metadata.confidence_score
            ));
            self.metadata.confidence_score = 0.0;
        }
        self.metrics.retain(|name, value| {
            if value.is_finite() {
                return true;
            }
            warnings.push(format!("metric '{}' is not a finite number ({}); dropped", name, value));
            false
        });
        for (list, lines) in [
            ("intercompany", &mut self.intercompany_transactions),
            ("related-party", &mut self.related_party_transactions),
        ] {
            lines.retain(|line| {
                if line.amount.is_finite() {
                    return true;
                }
                warnings.push(format!(
                    "{} transaction with '{}' has a non-finite amount ({}); dropped",
                    list, line.counterparty, line.amount
                ));
                false
            });
        }
        warnings
    }
}

/// Entity and filing metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Entity size class
    pub entity_size: EntitySize,

    /// Account-filing type
    pub filing_type: FilingType,

    /// Reporting standard the accounts were prepared under
    pub reporting_standard: ReportingStandard,

    /// Overall parser confidence in [0.0, 1.0]
    pub confidence_score: f64,

    /// Currency-unit scale amounts are presented in
    pub unit_scale: UnitScale,

    /// Whether the unit scale was confirmed from the document
    pub unit_scale_validated: bool,
}

impl Default for RecordMetadata {
    fn default() -> Self {
        Self {
            entity_size: EntitySize::Unknown,
            filing_type: FilingType::Unknown,
            reporting_standard: ReportingStandard::Unknown,
            confidence_score: 0.0,
            unit_scale: UnitScale::Units,
            unit_scale_validated: false,
        }
    }
}

/// Entity size class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySize {
    /// Micro-entity
    Micro,
    /// Small company
    Small,
    /// Medium-sized company
    Medium,
    /// Large company
    Large,
    /// Not determined
    Unknown,
}

/// Account-filing type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingType {
    /// Full accounts
    Full,
    /// Abridged accounts
    Abridged,
    /// Filleted accounts (profit and loss omitted)
    Filleted,
    /// Micro-entity accounts
    Micro,
    /// Dormant company accounts
    Dormant,
    /// Not determined
    Unknown,
}

impl FilingType {
    /// Filing types whose disclosures are too thin for unrestricted analysis
    pub fn is_limited_disclosure(&self) -> bool {
        matches!(
            self,
            FilingType::Abridged | FilingType::Filleted | FilingType::Micro | FilingType::Dormant
        )
    }
}

/// Reporting standard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportingStandard {
    /// FRS 102
    Frs102,
    /// FRS 105 (micro-entities)
    Frs105,
    /// IFRS
    Ifrs,
    /// Not determined
    Unknown,
}

/// Currency-unit scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitScale {
    /// Whole currency units
    Units,
    /// Thousands (e.g. £'000)
    Thousands,
    /// Millions
    Millions,
}

impl UnitScale {
    /// Multiplier from presented figures to whole currency units
    pub fn multiplier(&self) -> f64 {
        match self {
            UnitScale::Units => 1.0,
            UnitScale::Thousands => 1_000.0,
            UnitScale::Millions => 1_000_000.0,
        }
    }
}

/// Readiness classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessLevel {
    /// Analysis may run unrestricted
    Ready,
    /// Analysis may run; opportunity output is filtered
    ReadyLimited,
    /// Analysis refused unless overridden
    Blocked,
}

impl ReadinessLevel {
    /// Wire name of the level
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadinessLevel::Ready => "READY",
            ReadinessLevel::ReadyLimited => "READY_LIMITED",
            ReadinessLevel::Blocked => "BLOCKED",
        }
    }

    /// Parse a level from its wire name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "READY" => Some(ReadinessLevel::Ready),
            "READY_LIMITED" => Some(ReadinessLevel::ReadyLimited),
            "BLOCKED" => Some(ReadinessLevel::Blocked),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReadinessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pre-Analysis Gate embedded in the structured record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreAnalysisGate {
    /// Readiness level
    pub level: ReadinessLevel,

    /// Issues that block analysis, in detection order
    #[serde(default)]
    pub blocking_issues: Vec<String>,

    /// Issues that limit analysis, in detection order
    #[serde(default)]
    pub warning_issues: Vec<String>,

    /// Manual review actions an operator should take
    #[serde(default)]
    pub review_actions: Vec<String>,

    /// Whether analysis may run
    pub can_proceed_to_analysis: bool,

    /// Whether a caller override lifted a block
    #[serde(default)]
    pub override_applied: bool,
}

impl Default for PreAnalysisGate {
    fn default() -> Self {
        Self {
            level: ReadinessLevel::Ready,
            blocking_issues: Vec::new(),
            warning_issues: Vec::new(),
            review_actions: Vec::new(),
            can_proceed_to_analysis: true,
            override_applied: false,
        }
    }
}

impl PreAnalysisGate {
    /// Whether the gate blocks analysis
    pub fn is_blocked(&self) -> bool {
        self.level == ReadinessLevel::Blocked
    }
}

/// One intercompany or related-party transaction line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionLine {
    /// Counterparty name
    pub counterparty: String,

    /// Nature of the transaction as disclosed
    pub description: String,

    /// Amount in whole currency units
    pub amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_uses_current_schema() {
        let record = StructuredRecord::new(RecordMetadata::default());
        assert_eq!(record.schema_version, SCHEMA_VERSION);
        assert!(record.check_schema().is_ok());
    }

    #[test]
    fn test_unsupported_schema_rejected() {
        let mut record = StructuredRecord::new(RecordMetadata::default());
        record.schema_version = SCHEMA_VERSION + 1;
        assert!(matches!(
            record.check_schema(),
            Err(RecordError::UnsupportedSchema { found, .. }) if found == SCHEMA_VERSION + 1
        ));

        record.schema_version = 0;
        assert!(record.check_schema().is_err());
    }

    #[test]
    fn test_v1_record_reads_without_transactions() {
        let json = r#"{
            "schema_version": 1,
            "metadata": {
                "entity_size": "small",
                "filing_type": "full",
                "reporting_standard": "frs102",
                "confidence_score": 0.9,
                "unit_scale": "units",
                "unit_scale_validated": true
            },
            "metrics": {"total_assets": 100.0},
            "gate": {"level": "READY", "can_proceed_to_analysis": true}
        }"#;
        let record: StructuredRecord = serde_json::from_str(json).unwrap();
        assert!(record.check_schema().is_ok());
        assert!(record.intercompany_transactions.is_empty());
        assert_eq!(record.metric("total_assets"), Some(100.0));
    }

    #[test]
    fn test_metric_ignores_non_finite() {
        let mut record = StructuredRecord::new(RecordMetadata::default());
        record.set_metric("ratio", f64::NAN);
        assert_eq!(record.metric("ratio"), None);
        assert_eq!(record.metric("missing"), None);
    }

    #[test]
    fn test_drop_non_finite_values() {
        let mut record = StructuredRecord::new(RecordMetadata {
            confidence_score: f64::NAN,
            ..RecordMetadata::default()
        });
        record.set_metric("gearing", f64::INFINITY);
        record.set_metric("net_assets", 400.0);
        record.related_party_transactions.push(TransactionLine {
            counterparty: "Director".to_string(),
            description: "loan".to_string(),
            amount: f64::NEG_INFINITY,
        });
        assert!(matches!(
            record.check_finite(),
            Err(RecordError::NonFinite { field }) if field == "metadata.confidence_score"
        ));

        let warnings = record.drop_non_finite();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.contains("'gearing'")));
        assert!(warnings.iter().any(|w| w.contains("'Director'")));
        assert_eq!(record.metadata.confidence_score, 0.0);
        assert_eq!(record.metric("net_assets"), Some(400.0));
        assert!(!record.metrics.contains_key("gearing"));
        assert!(record.related_party_transactions.is_empty());
        assert!(record.check_finite().is_ok());
        assert!(record.drop_non_finite().is_empty());
    }

    #[test]
    fn test_check_finite_names_metric() {
        let mut record = StructuredRecord::new(RecordMetadata::default());
        record.set_metric("gearing", f64::NAN);
        assert_eq!(
            record.check_finite().unwrap_err().to_string(),
            "non-finite value in 'gearing'"
        );
    }

    #[test]
    fn test_readiness_wire_names() {
        let json = serde_json::to_string(&ReadinessLevel::ReadyLimited).unwrap();
        assert_eq!(json, "\"READY_LIMITED\"");
        assert_eq!(ReadinessLevel::parse("blocked"), Some(ReadinessLevel::Blocked));
        assert_eq!(ReadinessLevel::parse("maybe"), None);
    }

    #[test]
    fn test_limited_disclosure_filings() {
        assert!(FilingType::Filleted.is_limited_disclosure());
        assert!(!FilingType::Full.is_limited_disclosure());
        assert!(!FilingType::Unknown.is_limited_disclosure());
    }
}
