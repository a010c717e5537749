//! Risk flags and aggregate risk score

use crate::GateConfig;
use tallyman_domain::{Opportunity, RiskFlags, Severity, StructuredRecord};

const GOING_CONCERN_WEIGHT: u32 = 30;
const NEGATIVE_NET_ASSETS_WEIGHT: u32 = 25;
const RELATED_PARTY_WEIGHT: u32 = 10;
const INTERCOMPANY_WEIGHT: u32 = 10;
const LOW_CONFIDENCE_WEIGHT: u32 = 10;
const LATE_FILING_WEIGHT: u32 = 10;

fn severity_points(severity: Severity) -> u32 {
    match severity {
        Severity::High => 8,
        Severity::Medium => 4,
        Severity::Low => 1,
    }
}

/// Flags derivable from the record without the engine
pub fn deterministic_flags(record: &StructuredRecord, config: &GateConfig) -> RiskFlags {
    RiskFlags {
        negative_net_assets: record.metric("net_assets").is_some_and(|v| v < 0.0),
        related_party_exposure: !record.related_party_transactions.is_empty(),
        intercompany_exposure: !record.intercompany_transactions.is_empty(),
        low_confidence: record.metadata.confidence_score < config.limited_confidence,
        ..RiskFlags::default()
    }
}

/// Weighted flag sum plus severity points, clamped to 0-100
pub fn risk_score(flags: &RiskFlags, opportunities: &[Opportunity]) -> u8 {
    let weighted = [
        (flags.going_concern, GOING_CONCERN_WEIGHT),
        (flags.negative_net_assets, NEGATIVE_NET_ASSETS_WEIGHT),
        (flags.related_party_exposure, RELATED_PARTY_WEIGHT),
        (flags.intercompany_exposure, INTERCOMPANY_WEIGHT),
        (flags.low_confidence, LOW_CONFIDENCE_WEIGHT),
        (flags.late_filing, LATE_FILING_WEIGHT),
    ];
    let flag_points: u32 = weighted
        .iter()
        .filter(|(raised, _)| *raised)
        .map(|(_, weight)| weight)
        .sum();
    let opportunity_points: u32 = opportunities
        .iter()
        .map(|o| severity_points(o.severity))
        .sum();

    (flag_points + opportunity_points).min(100) as u8
}
