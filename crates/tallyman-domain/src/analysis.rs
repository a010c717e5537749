//! Analysis Record and its opportunity list

use crate::id::{AnalysisId, DocumentId};
use crate::record::ReadinessLevel;
use serde::{Deserialize, Serialize};

/// Opportunity severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Minor
    Low,
    /// Worth raising
    Medium,
    /// Material
    High,
}

impl Severity {
    /// Storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Parse a severity, accepting a few common synonyms
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" | "minor" => Some(Severity::Low),
            "medium" | "moderate" => Some(Severity::Medium),
            "high" | "critical" | "major" => Some(Severity::High),
            _ => None,
        }
    }
}

/// How far an opportunity's applicability has been established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityScope {
    /// Supported directly by the extracted figures
    Confirmed,
    /// Directional only; needs verification
    Indicative,
    /// Only assessable from full statutory accounts
    FullAccounts,
}

impl OpportunityScope {
    /// Storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityScope::Confirmed => "confirmed",
            OpportunityScope::Indicative => "indicative",
            OpportunityScope::FullAccounts => "full_accounts",
        }
    }

    /// Parse a scope tag
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "confirmed" => Some(OpportunityScope::Confirmed),
            "indicative" => Some(OpportunityScope::Indicative),
            "full_accounts" | "full-accounts" => Some(OpportunityScope::FullAccounts),
            _ => None,
        }
    }
}

/// One opportunity asserted by the analysis engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Opportunity type (e.g. "working_capital", "tax_relief")
    pub kind: String,

    /// Severity
    pub severity: Severity,

    /// Affected amount in whole currency units
    pub affected_amount: f64,

    /// What was found
    pub description: String,

    /// What to do about it
    pub recommendation: String,

    /// Applicability tag
    pub scope: OpportunityScope,
}

/// Boolean risk indicators attached to an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RiskFlags {
    /// Material uncertainty over going concern
    #[serde(default)]
    pub going_concern: bool,

    /// Liabilities exceed assets
    #[serde(default)]
    pub negative_net_assets: bool,

    /// Related-party transactions disclosed
    #[serde(default)]
    pub related_party_exposure: bool,

    /// Intercompany balances disclosed
    #[serde(default)]
    pub intercompany_exposure: bool,

    /// Extraction confidence below the limited-readiness threshold
    #[serde(default)]
    pub low_confidence: bool,

    /// Accounts filed after the statutory deadline
    #[serde(default)]
    pub late_filing: bool,
}

impl RiskFlags {
    /// Union of two flag sets
    pub fn merge(self, other: RiskFlags) -> RiskFlags {
        RiskFlags {
            going_concern: self.going_concern || other.going_concern,
            negative_net_assets: self.negative_net_assets || other.negative_net_assets,
            related_party_exposure: self.related_party_exposure || other.related_party_exposure,
            intercompany_exposure: self.intercompany_exposure || other.intercompany_exposure,
            low_confidence: self.low_confidence || other.low_confidence,
            late_filing: self.late_filing || other.late_filing,
        }
    }

    /// Names of the raised flags
    pub fn raised(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.going_concern {
            names.push("going_concern");
        }
        if self.negative_net_assets {
            names.push("negative_net_assets");
        }
        if self.related_party_exposure {
            names.push("related_party_exposure");
        }
        if self.intercompany_exposure {
            names.push("intercompany_exposure");
        }
        if self.low_confidence {
            names.push("low_confidence");
        }
        if self.late_filing {
            names.push("late_filing");
        }
        names
    }
}

/// One completed (or refused) analysis attempt
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
    /// Identifier
    pub id: AnalysisId,

    /// Document the analysis belongs to
    pub document_id: DocumentId,

    /// Opportunities that survived filtering
    pub opportunities: Vec<Opportunity>,

    /// Fingerprint of the structured record consumed
    pub input_fingerprint: String,

    /// Readiness level that constrained the output
    pub readiness: ReadinessLevel,

    /// Risk indicators
    pub risk_flags: RiskFlags,

    /// Aggregate risk score in [0, 100]
    pub risk_score: u8,

    /// Caveats from the gate, the filter and integrity checks
    pub limitations: Vec<String>,

    /// Tokens consumed by the engine call
    pub tokens_used: u64,

    /// Engine model name
    pub model_name: String,

    /// Creation time (seconds since epoch)
    pub created_at: u64,
}
