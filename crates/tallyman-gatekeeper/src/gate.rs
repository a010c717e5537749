//! Readiness gate evaluation
//!
//! The gate reads only deterministic metrics and metadata from a
//! [`StructuredRecord`]; raw text never reaches it. Its output is the
//! [`PreAnalysisGate`] embedded in the record, which the analysis stage uses
//! to refuse or constrain analysis.

use crate::{GateConfig, GatekeeperError};
use std::fmt;
use tallyman_domain::{
    FilingType, PreAnalysisGate, ReadinessLevel, RecordError, ReportingStandard,
    StructuredRecord,
};
use tracing::{debug, info};

/// One finding of the readiness gate
#[derive(Debug, Clone, PartialEq)]
pub enum GateIssue {
    /// Record schema version is outside the supported range
    UnsupportedSchema {
        /// Version found on the record
        found: u32,
        /// Oldest supported version
        min: u32,
        /// Newest supported version
        max: u32,
    },

    /// Parser confidence below the blocking threshold
    ConfidenceTooLow {
        /// Confidence on the record
        actual: f64,
        /// Blocking threshold
        required: f64,
    },

    /// A required metric is missing or non-finite
    RequiredMetricMissing(String),

    /// Assets, liabilities and net assets do not reconcile
    BalanceMismatch {
        /// `|total_assets - total_liabilities - net_assets|`
        difference: f64,
        /// Allowed difference
        tolerance: f64,
    },

    /// Parser confidence below the limited-readiness threshold
    LimitedConfidence {
        /// Confidence on the record
        actual: f64,
        /// Limited-readiness threshold
        threshold: f64,
    },

    /// Currency-unit scale was assumed rather than read from the document
    UnitScaleNotValidated,

    /// Filing type omits disclosures analysis relies on
    LimitedDisclosure(FilingType),

    /// Reporting standard could not be determined
    UnknownStandard,

    /// An advisory metric is missing or non-finite
    AdvisoryMetricMissing(String),
}

fn filing_name(filing: FilingType) -> &'static str {
    match filing {
        FilingType::Full => "full",
        FilingType::Abridged => "abridged",
        FilingType::Filleted => "filleted",
        FilingType::Micro => "micro-entity",
        FilingType::Dormant => "dormant",
        FilingType::Unknown => "unknown",
    }
}

impl GateIssue {
    /// Whether the issue blocks analysis
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            GateIssue::UnsupportedSchema { .. }
                | GateIssue::ConfidenceTooLow { .. }
                | GateIssue::RequiredMetricMissing(_)
                | GateIssue::BalanceMismatch { .. }
        )
    }

    /// The manual-review action an operator should take
    pub fn review_action(&self) -> String {
        match self {
            GateIssue::UnsupportedSchema { .. } => {
                "re-extract the document with the current parser".to_string()
            }
            GateIssue::ConfidenceTooLow { .. } | GateIssue::LimitedConfidence { .. } => {
                "verify extracted figures against the source document".to_string()
            }
            GateIssue::RequiredMetricMissing(metric) | GateIssue::AdvisoryMetricMissing(metric) => {
                format!("enter '{}' manually from the source document", metric)
            }
            GateIssue::BalanceMismatch { .. } => {
                "reconcile total assets, total liabilities and net assets".to_string()
            }
            GateIssue::UnitScaleNotValidated => {
                "confirm the currency unit scale (units, thousands, millions)".to_string()
            }
            GateIssue::LimitedDisclosure(_) => {
                "obtain full accounts before relying on profit and loss analysis".to_string()
            }
            GateIssue::UnknownStandard => "confirm the reporting standard".to_string(),
        }
    }
}

impl fmt::Display for GateIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateIssue::UnsupportedSchema { found, min, max } => write!(
                f,
                "unsupported schema version {} (supported {}..={})",
                found, min, max
            ),
            GateIssue::ConfidenceTooLow { actual, required } => write!(
                f,
                "confidence {:.2} below minimum {:.2}",
                actual, required
            ),
            GateIssue::RequiredMetricMissing(metric) => {
                write!(f, "required metric '{}' missing", metric)
            }
            GateIssue::BalanceMismatch {
                difference,
                tolerance,
            } => write!(
                f,
                "balance sheet does not reconcile: difference {:.2} exceeds tolerance {:.2}",
                difference, tolerance
            ),
            GateIssue::LimitedConfidence { actual, threshold } => write!(
                f,
                "confidence {:.2} below {:.2}; figures need verification",
                actual, threshold
            ),
            GateIssue::UnitScaleNotValidated => f.write_str("currency unit scale not validated"),
            GateIssue::LimitedDisclosure(filing) => write!(
                f,
                "{} accounts filed; disclosures are limited",
                filing_name(*filing)
            ),
            GateIssue::UnknownStandard => f.write_str("reporting standard unknown"),
            GateIssue::AdvisoryMetricMissing(metric) => {
                write!(f, "advisory metric '{}' missing", metric)
            }
        }
    }
}

impl From<RecordError> for GateIssue {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::UnsupportedSchema { found, min, max } => {
                GateIssue::UnsupportedSchema { found, min, max }
            }
        }
    }
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

/// The readiness gate evaluator
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    config: GateConfig,
}

impl ReadinessGate {
    /// Create a gate with the given configuration
    pub fn new(config: GateConfig) -> Result<Self, GatekeeperError> {
        config.validate().map_err(GatekeeperError::Config)?;
        Ok(Self { config })
    }

    /// Create a gate with default configuration
    pub fn default_config() -> Self {
        Self {
            config: GateConfig::default(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Collect the gate's own findings for a record, in rule order
    pub fn check(&self, record: &StructuredRecord) -> Vec<GateIssue> {
        // Field presence is not trusted on an unknown schema
        if let Err(e) = record.check_schema() {
            return vec![GateIssue::from(e)];
        }

        let mut blocking = Vec::new();
        let mut warnings = Vec::new();

        let confidence = if record.metadata.confidence_score.is_finite() {
            record.metadata.confidence_score
        } else {
            0.0
        };

        if confidence < self.config.min_confidence {
            blocking.push(GateIssue::ConfidenceTooLow {
                actual: confidence,
                required: self.config.min_confidence,
            });
        } else if confidence < self.config.limited_confidence {
            warnings.push(GateIssue::LimitedConfidence {
                actual: confidence,
                threshold: self.config.limited_confidence,
            });
        }

        for metric in &self.config.required_metrics {
            if record.metric(metric).is_none() {
                blocking.push(GateIssue::RequiredMetricMissing(metric.clone()));
            }
        }

        if let (Some(assets), Some(liabilities), Some(net_assets)) = (
            record.metric("total_assets"),
            record.metric("total_liabilities"),
            record.metric("net_assets"),
        ) {
            let difference = (assets - liabilities - net_assets).abs();
            let tolerance = self.config.balance_tolerance(assets);
            if difference > tolerance {
                blocking.push(GateIssue::BalanceMismatch {
                    difference,
                    tolerance,
                });
            }
        }

        if self.config.require_validated_unit_scale && !record.metadata.unit_scale_validated {
            warnings.push(GateIssue::UnitScaleNotValidated);
        }

        if record.metadata.filing_type.is_limited_disclosure() {
            warnings.push(GateIssue::LimitedDisclosure(record.metadata.filing_type));
        }

        if record.metadata.reporting_standard == ReportingStandard::Unknown {
            warnings.push(GateIssue::UnknownStandard);
        }

        for metric in &self.config.advisory_metrics {
            if record.metric(metric).is_none() {
                warnings.push(GateIssue::AdvisoryMetricMissing(metric.clone()));
            }
        }

        blocking.extend(warnings);
        blocking
    }

    /// Evaluate a record's readiness
    ///
    /// Issues the parser already placed on `record.gate` come first, in their
    /// original order; duplicates are dropped. `force` lifts a `BLOCKED`
    /// refusal without changing the level.
    pub fn evaluate(&self, record: &StructuredRecord, force: bool) -> PreAnalysisGate {
        let mut gate = PreAnalysisGate {
            blocking_issues: Vec::new(),
            warning_issues: Vec::new(),
            review_actions: Vec::new(),
            ..PreAnalysisGate::default()
        };

        for issue in &record.gate.blocking_issues {
            push_unique(&mut gate.blocking_issues, issue.clone());
        }
        for issue in &record.gate.warning_issues {
            push_unique(&mut gate.warning_issues, issue.clone());
        }
        for action in &record.gate.review_actions {
            push_unique(&mut gate.review_actions, action.clone());
        }
        let parser_issues: Vec<String> = gate
            .blocking_issues
            .iter()
            .chain(gate.warning_issues.iter())
            .cloned()
            .collect();
        for issue in parser_issues {
            push_unique(&mut gate.review_actions, format!("review parser finding: {}", issue));
        }

        for issue in self.check(record) {
            let text = issue.to_string();
            if issue.is_blocking() {
                push_unique(&mut gate.blocking_issues, text);
            } else {
                push_unique(&mut gate.warning_issues, text);
            }
            push_unique(&mut gate.review_actions, issue.review_action());
        }

        gate.level = if !gate.blocking_issues.is_empty() {
            ReadinessLevel::Blocked
        } else if !gate.warning_issues.is_empty() {
            ReadinessLevel::ReadyLimited
        } else {
            ReadinessLevel::Ready
        };

        let blocked = gate.level == ReadinessLevel::Blocked;
        gate.can_proceed_to_analysis = !blocked || force;
        gate.override_applied = blocked && force;

        debug!(
            "Gate evaluated: {} ({} blocking, {} warnings)",
            gate.level,
            gate.blocking_issues.len(),
            gate.warning_issues.len()
        );
        if gate.override_applied {
            info!("Override applied to BLOCKED record: {}", gate.blocking_issues.join("; "));
        }

        gate
    }

    /// Apply or lift an override on an already evaluated gate
    pub fn with_override(gate: &PreAnalysisGate, force: bool) -> PreAnalysisGate {
        let mut gate = Self::normalize(gate.clone());
        let blocked = gate.is_blocked();
        gate.can_proceed_to_analysis = !blocked || force;
        gate.override_applied = blocked && force;
        gate
    }

    /// Restore the gate contract on a gate read back from storage
    ///
    /// Blocking issues force `BLOCKED`, `BLOCKED` always carries a reason, and
    /// `can_proceed_to_analysis` is false on `BLOCKED` unless an override was
    /// recorded.
    pub fn normalize(mut gate: PreAnalysisGate) -> PreAnalysisGate {
        if !gate.blocking_issues.is_empty() {
            gate.level = ReadinessLevel::Blocked;
        }
        if gate.level == ReadinessLevel::Blocked && gate.blocking_issues.is_empty() {
            gate.blocking_issues
                .push("record marked blocked without a recorded reason".to_string());
        }
        if gate.level == ReadinessLevel::Ready && !gate.warning_issues.is_empty() {
            gate.level = ReadinessLevel::ReadyLimited;
        }
        if gate.level == ReadinessLevel::Blocked {
            gate.can_proceed_to_analysis = gate.override_applied;
        } else {
            gate.can_proceed_to_analysis = true;
            gate.override_applied = false;
        }
        gate
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::default_config()
    }
}
