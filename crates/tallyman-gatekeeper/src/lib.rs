//! Tallyman Gatekeeper
//!
//! Decides whether extracted data is trustworthy enough for analysis, and
//! constrains what analysis may claim.
//!
//! The Gatekeeper provides:
//! - Readiness classification (`READY`, `READY_LIMITED`, `BLOCKED`)
//! - Manual-review actions for every issue found
//! - Opportunity filtering by readiness level and metric ceilings
//! - Deterministic risk flags and risk scoring
//!
//! # Examples
//!
//! ```
//! use tallyman_gatekeeper::{GateConfig, ReadinessGate};
//! use tallyman_domain::{RecordMetadata, StructuredRecord, ReadinessLevel};
//!
//! let gate = ReadinessGate::new(GateConfig::default()).unwrap();
//! let record = StructuredRecord::new(RecordMetadata::default());
//!
//! let result = gate.evaluate(&record, false);
//! assert_eq!(result.level, ReadinessLevel::Blocked);
//! assert!(!result.can_proceed_to_analysis);
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod filter;
mod gate;
mod risk;

pub use config::GateConfig;
pub use error::GatekeeperError;
pub use filter::{FilterOutcome, OpportunityFilter};
pub use gate::{GateIssue, ReadinessGate};
pub use risk::{deterministic_flags, risk_score};
