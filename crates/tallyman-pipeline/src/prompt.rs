//! Analysis prompts built from a structured record
//!
//! The engine never sees raw OCR text: only deterministic metrics, metadata,
//! transaction lines and the readiness gate.

use tallyman_domain::{PreAnalysisGate, ReadinessLevel, StructuredRecord, TransactionLine};

/// Builds the system and user prompts for one analysis call
pub struct PromptBuilder<'a> {
    entity_name: &'a str,
    period_end: String,
    record: &'a StructuredRecord,
    gate: &'a PreAnalysisGate,
}

impl<'a> PromptBuilder<'a> {
    /// Create a prompt builder for `record`, constrained by `gate`
    pub fn new(
        entity_name: &'a str,
        period_end: chrono::NaiveDate,
        record: &'a StructuredRecord,
        gate: &'a PreAnalysisGate,
    ) -> Self {
        Self {
            entity_name,
            period_end: period_end.format("%Y-%m-%d").to_string(),
            record,
            gate,
        }
    }

    /// Fixed instructions and output format
    pub fn system(&self) -> String {
        let mut prompt = String::from(ANALYSIS_INSTRUCTIONS);
        prompt.push_str("\n\n");
        prompt.push_str(OUTPUT_FORMAT);
        prompt
    }

    /// Record-specific content
    pub fn user(&self) -> String {
        let meta = &self.record.metadata;
        let mut prompt = String::new();

        prompt.push_str(&format!(
            "Entity: {}\nPeriod end: {}\n",
            self.entity_name, self.period_end
        ));
        prompt.push_str(&format!(
            "Filing type: {:?}\nReporting standard: {:?}\nEntity size: {:?}\n",
            meta.filing_type, meta.reporting_standard, meta.entity_size
        ));
        prompt.push_str(&format!(
            "Extraction confidence: {:.2}\n\n",
            meta.confidence_score
        ));

        prompt.push_str(&format!("Readiness: {}\n", self.gate.level));
        match self.gate.level {
            ReadinessLevel::Ready => {}
            ReadinessLevel::ReadyLimited => {
                prompt.push_str(
                    "The data has known limitations. Do not make full-accounts claims.\n",
                );
                for warning in &self.gate.warning_issues {
                    prompt.push_str(&format!("- {}\n", warning));
                }
            }
            ReadinessLevel::Blocked => {
                prompt.push_str("The data failed validation; treat every figure as unverified.\n");
                for issue in &self.gate.blocking_issues {
                    prompt.push_str(&format!("- {}\n", issue));
                }
            }
        }
        prompt.push('\n');

        prompt.push_str("Metrics (whole currency units):\n");
        for (name, value) in &self.record.metrics {
            if value.is_finite() {
                prompt.push_str(&format!("- {}: {}\n", name, value));
            }
        }

        push_transactions(
            &mut prompt,
            "Intercompany transactions",
            &self.record.intercompany_transactions,
        );
        push_transactions(
            &mut prompt,
            "Related-party transactions",
            &self.record.related_party_transactions,
        );

        prompt
    }
}

fn push_transactions(prompt: &mut String, heading: &str, lines: &[TransactionLine]) {
    if lines.is_empty() {
        return;
    }
    prompt.push_str(&format!("\n{}:\n", heading));
    for line in lines {
        prompt.push_str(&format!(
            "- {}: {} ({})\n",
            line.counterparty, line.description, line.amount
        ));
    }
}

const ANALYSIS_INSTRUCTIONS: &str = r#"You are reviewing the filed accounts of a private company.
Identify concrete opportunities to improve working capital, margins, financing or
compliance, and flag material risks.

Rules:
- Only use the figures provided; never invent numbers
- affected_amount is in whole currency units and must not exceed turnover or total assets
- severity is one of: low, medium, high
- scope is one of: confirmed, indicative, full_accounts
  - confirmed: directly supported by the figures
  - indicative: plausible but needs confirmation
  - full_accounts: would need the full statutory accounts to assess"#;

const OUTPUT_FORMAT: &str = r#"Output format (a single JSON object, no additional text):
{
  "opportunities": [
    {
      "type": "working_capital",
      "severity": "medium",
      "affected_amount": 12000,
      "description": "what was found",
      "recommendation": "what to do",
      "scope": "indicative"
    }
  ],
  "risk_flags": {
    "going_concern": false,
    "negative_net_assets": false,
    "related_party_exposure": false,
    "intercompany_exposure": false,
    "low_confidence": false,
    "late_filing": false
  }
}"#;
