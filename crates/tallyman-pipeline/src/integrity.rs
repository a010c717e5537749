//! Integrity link between a structured record and the analyses computed
//! from it
//!
//! The fingerprint is SHA-256 over the record's canonical JSON: object keys
//! sorted lexicographically, no insignificant whitespace. Encoding is done
//! here rather than trusting `serde_json`'s map ordering, which changes with
//! the `preserve_order` feature.

use crate::PipelineError;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tallyman_domain::StructuredRecord;

/// Canonical JSON text of a record
///
/// # Errors
///
/// Fails on NaN or infinite numbers: `serde_json` writes all three as
/// `null`, which would make distinct records share a fingerprint.
pub fn canonical_json(record: &StructuredRecord) -> Result<String, PipelineError> {
    record.check_finite()?;
    let value = serde_json::to_value(record)?;
    let mut out = String::new();
    write_canonical(&value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> Result<(), PipelineError> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

/// Lowercase hex SHA-256 of the record's canonical JSON
pub fn fingerprint(record: &StructuredRecord) -> Result<String, PipelineError> {
    let canonical = canonical_json(record)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

fn short(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

/// Compare a recomputed fingerprint against the stored ones
///
/// Returns one warning per mismatch; an empty list means no drift.
pub fn detect_drift(
    current: &str,
    expected: Option<&str>,
    last_analysis: Option<&str>,
) -> Vec<String> {
    let mut warnings = Vec::new();
    match expected {
        Some(expected) if expected != current => warnings.push(format!(
            "integrity drift: record fingerprint {} differs from extraction fingerprint {}",
            short(current),
            short(expected)
        )),
        None => warnings.push(
            "integrity drift: no extraction fingerprint recorded for this record".to_string(),
        ),
        _ => {}
    }
    if let Some(last) = last_analysis {
        if last != current {
            warnings.push(format!(
                "integrity drift: record fingerprint {} differs from previous analysis input {}",
                short(current),
                short(last)
            ));
        }
    }
    warnings
}
