//! Mechanical filtering of analysis output
//!
//! The analysis engine may assert anything; what survives into the Analysis
//! Record is decided here from the readiness level and the deterministic
//! metrics. Every opportunity dropped or downgraded leaves a limitation
//! behind, so the record explains its own gaps.

use tallyman_domain::{
    Opportunity, OpportunityScope, ReadinessLevel, Severity, StructuredRecord,
};
use tracing::debug;

/// Opportunities that survived filtering and the caveats produced on the way
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterOutcome {
    /// Surviving opportunities, in engine order
    pub opportunities: Vec<Opportunity>,

    /// Caveats for the Analysis Record
    pub limitations: Vec<String>,
}

/// Filters engine opportunities against the record they were computed from
#[derive(Debug, Clone, Default)]
pub struct OpportunityFilter;

impl OpportunityFilter {
    /// Create a filter
    pub fn new() -> Self {
        Self
    }

    /// Largest amount any opportunity may claim: the larger of turnover and
    /// total assets, when either is known
    pub fn amount_ceiling(record: &StructuredRecord) -> Option<f64> {
        match (record.metric("turnover"), record.metric("total_assets")) {
            (None, None) => None,
            (turnover, assets) => Some(
                turnover
                    .unwrap_or(0.0)
                    .abs()
                    .max(assets.unwrap_or(0.0).abs()),
            ),
        }
    }

    /// Filter opportunities under the record's readiness gate
    pub fn apply(&self, record: &StructuredRecord, opportunities: Vec<Opportunity>) -> FilterOutcome {
        let gate = &record.gate;
        let mut outcome = FilterOutcome::default();

        match gate.level {
            ReadinessLevel::Blocked => {
                let suffix = if gate.override_applied {
                    " (override applied)"
                } else {
                    ""
                };
                outcome.limitations.push(format!(
                    "readiness BLOCKED{}: {}",
                    suffix,
                    gate.blocking_issues.join("; ")
                ));
                if !opportunities.is_empty() {
                    outcome.limitations.push(format!(
                        "{} opportunities suppressed because the record is BLOCKED",
                        opportunities.len()
                    ));
                }
                debug!("Suppressed {} opportunities on BLOCKED record", opportunities.len());
                return outcome;
            }
            ReadinessLevel::ReadyLimited => {
                for warning in &gate.warning_issues {
                    outcome
                        .limitations
                        .push(format!("readiness limited: {}", warning));
                }
            }
            ReadinessLevel::Ready => {}
        }

        let ceiling = Self::amount_ceiling(record);

        for mut opportunity in opportunities {
            let amount = opportunity.affected_amount;
            if !amount.is_finite() || amount < 0.0 {
                outcome.limitations.push(format!(
                    "dropped '{}': affected amount {} is not a valid amount",
                    opportunity.kind, amount
                ));
                continue;
            }
            if let Some(ceiling) = ceiling {
                if amount > ceiling {
                    outcome.limitations.push(format!(
                        "dropped '{}': affected amount {:.0} exceeds ceiling {:.0}",
                        opportunity.kind, amount, ceiling
                    ));
                    continue;
                }
            }

            if gate.level == ReadinessLevel::ReadyLimited {
                if opportunity.scope == OpportunityScope::FullAccounts {
                    outcome.limitations.push(format!(
                        "dropped '{}': requires full accounts",
                        opportunity.kind
                    ));
                    continue;
                }
                if opportunity.severity == Severity::High {
                    opportunity.severity = Severity::Medium;
                    outcome.limitations.push(format!(
                        "downgraded '{}' from high to medium severity",
                        opportunity.kind
                    ));
                }
                opportunity.scope = OpportunityScope::Indicative;
            }

            outcome.opportunities.push(opportunity);
        }

        outcome
    }
}
