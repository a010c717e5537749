//! Parse engine output into typed opportunities and risk flags

use crate::PipelineError;
use serde_json::Value;
use tallyman_domain::{Opportunity, OpportunityScope, RiskFlags, Severity};
use tracing::warn;

/// Typed engine output, before filtering
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineAnalysis {
    /// Opportunities that parsed cleanly, in engine order
    pub opportunities: Vec<Opportunity>,

    /// Flags the engine raised
    pub risk_flags: RiskFlags,

    /// One note per opportunity that could not be parsed
    pub skipped: Vec<String>,
}

/// Parse the engine's JSON response
///
/// The top level must be an object with an `opportunities` array; a missing
/// `risk_flags` object means no flags. Malformed opportunities are skipped
/// and noted rather than failing the whole response.
pub fn parse_engine_response(response: &str) -> Result<EngineAnalysis, PipelineError> {
    let json_str = extract_json(response)?;

    let json: Value = serde_json::from_str(&json_str)
        .map_err(|e| PipelineError::InvalidResponse(format!("JSON parse error: {}", e)))?;

    let obj = json
        .as_object()
        .ok_or_else(|| PipelineError::InvalidResponse("Expected JSON object".to_string()))?;

    let items = obj
        .get("opportunities")
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            PipelineError::InvalidResponse("Missing or invalid 'opportunities'".to_string())
        })?;

    let mut analysis = EngineAnalysis::default();
    for (idx, item) in items.iter().enumerate() {
        match parse_opportunity(item) {
            Ok(opportunity) => analysis.opportunities.push(opportunity),
            Err(e) => {
                warn!("Failed to parse opportunity {}: {}", idx, e);
                analysis
                    .skipped
                    .push(format!("engine opportunity {} ignored: {}", idx, e));
            }
        }
    }

    analysis.risk_flags = match obj.get("risk_flags") {
        None | Some(Value::Null) => RiskFlags::default(),
        Some(flags) => serde_json::from_value(flags.clone())
            .map_err(|e| PipelineError::InvalidResponse(format!("invalid 'risk_flags': {}", e)))?,
    };

    Ok(analysis)
}

/// Extract JSON from response, handling markdown code blocks
fn extract_json(response: &str) -> Result<String, PipelineError> {
    let trimmed = response.trim();

    if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() < 2 {
            return Err(PipelineError::InvalidResponse("Empty code block".to_string()));
        }
        let end = if lines[lines.len() - 1].trim_start().starts_with("```") {
            lines.len() - 1
        } else {
            lines.len()
        };
        Ok(lines[1..end].join("\n"))
    } else if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        // Prose around a bare object
        if start <= end {
            Ok(trimmed[start..=end].to_string())
        } else {
            Ok(trimmed.to_string())
        }
    } else {
        Ok(trimmed.to_string())
    }
}

fn parse_opportunity(json: &Value) -> Result<Opportunity, String> {
    let obj = json
        .as_object()
        .ok_or_else(|| "Opportunity is not a JSON object".to_string())?;

    let kind = obj
        .get("type")
        .or_else(|| obj.get("kind"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| "Missing or invalid 'type'".to_string())?
        .trim()
        .to_string();

    let severity_text = obj
        .get("severity")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "Missing or invalid 'severity'".to_string())?;
    let severity = Severity::parse(severity_text)
        .ok_or_else(|| format!("Unknown severity '{}'", severity_text))?;

    let affected_amount = match obj.get("affected_amount") {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| "Invalid 'affected_amount'".to_string())?,
        Some(Value::String(s)) => s
            .replace(',', "")
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("Invalid 'affected_amount' '{}'", s))?,
        Some(Value::Null) | None => 0.0,
        Some(_) => return Err("Invalid 'affected_amount'".to_string()),
    };

    let description = obj
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let recommendation = obj
        .get("recommendation")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    // Unscoped claims are treated as needing confirmation
    let scope = match obj.get("scope").and_then(|v| v.as_str()) {
        Some(s) => OpportunityScope::parse(s).ok_or_else(|| format!("Unknown scope '{}'", s))?,
        None => OpportunityScope::Indicative,
    };

    Ok(Opportunity {
        kind,
        severity,
        affected_amount,
        description,
        recommendation,
        scope,
    })
}
