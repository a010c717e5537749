//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::{Color, Colorize};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};
use tallyman_domain::{AnalysisRecord, DocumentUnit, ReadinessLevel};
use tallyman_pipeline::{AnalysisOutcome, ExtractionOutcome, PipelineMetrics, SweepReport};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format a list of documents.
    pub fn format_documents(&self, documents: &[DocumentUnit]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let values: Vec<serde_json::Value> = documents.iter().map(document_json).collect();
                Ok(serde_json::to_string_pretty(&values)?)
            }
            OutputFormat::Quiet => Ok(documents
                .iter()
                .map(|d| d.id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if documents.is_empty() {
                    return Ok(self.paint("No documents found.", Color::Yellow));
                }

                let mut builder = Builder::default();
                builder.push_record([
                    "ID", "Entity", "Name", "Period End", "Extraction", "Analysis", "Readiness",
                ]);
                for document in documents {
                    let readiness = document
                        .record
                        .as_ref()
                        .map(|r| self.readiness(r.gate.level))
                        .unwrap_or_else(|| "-".to_string());
                    builder.push_record([
                        document.id.to_string(),
                        document.entity_id.clone(),
                        document.entity_name.clone(),
                        document.period_end.to_string(),
                        document.extraction_status.as_str().to_string(),
                        document.analysis_status.as_str().to_string(),
                        readiness,
                    ]);
                }
                Ok(self.table(builder))
            }
        }
    }

    /// Format one document with its gate and diagnostics.
    pub fn format_document(&self, document: &DocumentUnit) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let mut value = document_json(document);
                value["record"] = serde_json::to_value(&document.record)?;
                value["diagnostics"] = serde_json::to_value(&document.diagnostics)?;
                value["analysis_diagnostics"] =
                    serde_json::to_value(&document.analysis_diagnostics)?;
                Ok(serde_json::to_string_pretty(&value)?)
            }
            OutputFormat::Quiet => Ok(document.extraction_status.as_str().to_string()),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Field", "Value"]);
                builder.push_record(["ID".to_string(), document.id.to_string()]);
                builder.push_record([
                    "Entity".to_string(),
                    format!("{} ({})", document.entity_name, document.entity_id),
                ]);
                builder.push_record(["Period end".to_string(), document.period_end.to_string()]);
                builder.push_record(["Source".to_string(), document.source_handle.clone()]);
                builder.push_record([
                    "Extraction".to_string(),
                    document.extraction_status.as_str().to_string(),
                ]);
                builder.push_record([
                    "Analysis".to_string(),
                    document.analysis_status.as_str().to_string(),
                ]);
                if let Some(version) = document.schema_version {
                    builder.push_record(["Schema".to_string(), format!("v{}", version)]);
                }
                if let Some(fingerprint) = &document.expected_fingerprint {
                    builder.push_record(["Fingerprint".to_string(), fingerprint.clone()]);
                }
                builder.push_record(["Updated".to_string(), timestamp(document.updated_at)]);

                let mut out = vec![self.table(builder)];
                if let Some(record) = &document.record {
                    out.push(format!("Readiness: {}", self.readiness(record.gate.level)));
                    out.extend(self.issues(&record.gate.blocking_issues, &record.gate.warning_issues));
                    for action in &record.gate.review_actions {
                        out.push(self.info(action));
                    }
                }
                for line in &document.diagnostics {
                    out.push(format!("  {}", line));
                }
                for line in &document.analysis_diagnostics {
                    out.push(self.paint(&format!("  {}", line), Color::Red));
                }
                Ok(out.join("\n"))
            }
        }
    }

    /// Format the result of an extraction.
    pub fn format_extraction(&self, outcome: &ExtractionOutcome) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "document_id": outcome.document_id.to_string(),
                "provider": outcome.provider,
                "source": outcome.source,
                "fallback_triggered": outcome.fallback_triggered,
                "gate": outcome.gate,
                "fingerprint": outcome.fingerprint,
                "warnings": outcome.warnings,
            }))?),
            OutputFormat::Quiet => Ok(outcome.fingerprint.clone()),
            OutputFormat::Table => {
                let mut out = vec![self.success(&format!(
                    "Extracted {} with '{}'{}",
                    outcome.document_id,
                    outcome.provider,
                    if outcome.fallback_triggered { " (fallback triggered)" } else { "" }
                ))];
                out.push(format!("Readiness: {}", self.readiness(outcome.gate.level)));
                out.extend(self.issues(&outcome.gate.blocking_issues, &outcome.gate.warning_issues));
                for warning in &outcome.warnings {
                    out.push(self.warning(warning));
                }
                out.push(format!("Fingerprint: {}", outcome.fingerprint));
                Ok(out.join("\n"))
            }
        }
    }

    /// Format the result of an analysis request.
    pub fn format_analysis(&self, outcome: &AnalysisOutcome) -> Result<String> {
        let analysis = match outcome {
            AnalysisOutcome::Completed(analysis) => analysis,
            AnalysisOutcome::Refused { blocking_issues } => {
                return match self.format {
                    OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                        "refused": true,
                        "blocking_issues": blocking_issues,
                    }))?),
                    OutputFormat::Quiet => Ok("refused".to_string()),
                    OutputFormat::Table => {
                        let mut out = vec![self.error("Analysis refused: readiness BLOCKED")];
                        out.extend(blocking_issues.iter().map(|i| format!("  - {}", i)));
                        out.push(self.info("Resolve the issues and re-extract, or pass --force"));
                        Ok(out.join("\n"))
                    }
                };
            }
        };

        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&analysis_json(analysis))?),
            OutputFormat::Quiet => Ok(analysis.id.to_string()),
            OutputFormat::Table => {
                let mut out = vec![self.success(&format!("Analysis {} stored", analysis.id))];
                if analysis.opportunities.is_empty() {
                    out.push(self.paint("No opportunities reported.", Color::Yellow));
                } else {
                    let mut builder = Builder::default();
                    builder.push_record(["Type", "Severity", "Amount", "Scope", "Description"]);
                    for opportunity in &analysis.opportunities {
                        builder.push_record([
                            opportunity.kind.clone(),
                            opportunity.severity.as_str().to_string(),
                            format!("{:.0}", opportunity.affected_amount),
                            opportunity.scope.as_str().to_string(),
                            opportunity.description.clone(),
                        ]);
                    }
                    out.push(self.table(builder));
                }

                out.push(format!("Readiness: {}", self.readiness(analysis.readiness)));
                let flags = analysis.risk_flags.raised();
                out.push(format!(
                    "Risk score: {} ({})",
                    analysis.risk_score,
                    if flags.is_empty() { "no flags".to_string() } else { flags.join(", ") }
                ));
                for limitation in &analysis.limitations {
                    out.push(self.warning(limitation));
                }
                out.push(format!(
                    "Model: {} ({} tokens)",
                    analysis.model_name, analysis.tokens_used
                ));
                Ok(out.join("\n"))
            }
        }
    }

    /// Format a document's analysis history.
    pub fn format_history(&self, analyses: &[AnalysisRecord]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let values: Vec<serde_json::Value> = analyses.iter().map(analysis_json).collect();
                Ok(serde_json::to_string_pretty(&values)?)
            }
            OutputFormat::Quiet => Ok(analyses
                .iter()
                .map(|a| a.id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if analyses.is_empty() {
                    return Ok(self.paint("No analyses found.", Color::Yellow));
                }

                let mut builder = Builder::default();
                builder.push_record([
                    "ID", "Created", "Readiness", "Risk", "Opportunities", "Model", "Input",
                ]);
                for analysis in analyses {
                    builder.push_record([
                        analysis.id.to_string(),
                        timestamp(analysis.created_at),
                        analysis.readiness.as_str().to_string(),
                        analysis.risk_score.to_string(),
                        analysis.opportunities.len().to_string(),
                        analysis.model_name.clone(),
                        analysis.input_fingerprint.chars().take(12).collect(),
                    ]);
                }
                Ok(self.table(builder))
            }
        }
    }

    /// Format a worker run.
    pub fn format_sweep(&self, report: &SweepReport, metrics: &PipelineMetrics) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "picked": report.picked,
                "extracted": report.extracted,
                "failed": report.failed,
                "analyzed": report.analyzed,
                "refused": report.refused,
                "sweeps": metrics.sweep_count,
            }))?),
            OutputFormat::Quiet => Ok(report.extracted.to_string()),
            OutputFormat::Table => Ok([
                self.success(&format!(
                    "{} picked, {} extracted, {} failed, {} analyzed, {} refused",
                    report.picked, report.extracted, report.failed, report.analyzed, report.refused
                )),
                metrics.summary(),
            ]
            .join("\n")),
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.paint(&format!("✓ {}", message), Color::Green)
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.paint(&format!("✗ {}", message), Color::Red)
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.paint(&format!("ℹ {}", message), Color::Blue)
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.paint(&format!("⚠ {}", message), Color::Yellow)
    }

    fn readiness(&self, level: ReadinessLevel) -> String {
        let color = match level {
            ReadinessLevel::Ready => Color::Green,
            ReadinessLevel::ReadyLimited => Color::Yellow,
            ReadinessLevel::Blocked => Color::Red,
        };
        self.paint(level.as_str(), color)
    }

    fn issues(&self, blocking: &[String], warnings: &[String]) -> Vec<String> {
        blocking
            .iter()
            .map(|i| self.error(i))
            .chain(warnings.iter().map(|i| self.warning(i)))
            .collect()
    }

    fn table(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Colorize text if color is enabled.
    fn paint(&self, text: &str, color: Color) -> String {
        if !self.color_enabled {
            return text.to_string();
        }
        text.color(color).to_string()
    }
}

fn document_json(document: &DocumentUnit) -> serde_json::Value {
    serde_json::json!({
        "id": document.id.to_string(),
        "entity_id": document.entity_id,
        "entity_name": document.entity_name,
        "period_end": document.period_end.to_string(),
        "source_handle": document.source_handle,
        "extraction_status": document.extraction_status.as_str(),
        "analysis_status": document.analysis_status.as_str(),
        "readiness": document.record.as_ref().map(|r| r.gate.level.as_str()),
        "schema_version": document.schema_version,
        "expected_fingerprint": document.expected_fingerprint,
        "created_at": document.created_at,
        "updated_at": document.updated_at,
    })
}

fn analysis_json(analysis: &AnalysisRecord) -> serde_json::Value {
    serde_json::json!({
        "id": analysis.id.to_string(),
        "document_id": analysis.document_id.to_string(),
        "readiness": analysis.readiness.as_str(),
        "opportunities": analysis.opportunities,
        "risk_flags": analysis.risk_flags,
        "risk_score": analysis.risk_score,
        "limitations": analysis.limitations,
        "input_fingerprint": analysis.input_fingerprint,
        "model_name": analysis.model_name,
        "tokens_used": analysis.tokens_used,
        "created_at": analysis.created_at,
    })
}

fn timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tallyman_domain::{
        AnalysisId, Opportunity, OpportunityScope, RecordMetadata, RiskFlags, Severity,
        StructuredRecord,
    };

    fn document() -> DocumentUnit {
        let period = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        DocumentUnit::new("01234567", "Acme Ltd", period, "acme-2024.pdf")
    }

    fn analysis(document: &DocumentUnit) -> AnalysisRecord {
        AnalysisRecord {
            id: AnalysisId::new(),
            document_id: document.id,
            opportunities: vec![Opportunity {
                kind: "working_capital".to_string(),
                severity: Severity::Medium,
                affected_amount: 125_000.0,
                description: "Debtor days well above sector".to_string(),
                recommendation: "Review collection terms".to_string(),
                scope: OpportunityScope::Indicative,
            }],
            input_fingerprint: "ab".repeat(32),
            readiness: ReadinessLevel::Ready,
            risk_flags: RiskFlags {
                related_party_exposure: true,
                ..RiskFlags::default()
            },
            risk_score: 14,
            limitations: vec!["integrity drift: example".to_string()],
            tokens_used: 812,
            model_name: "llama3.1".to_string(),
            created_at: 1_711_843_200,
        }
    }

    #[test]
    fn test_documents_table() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_documents(&[document()]).unwrap();
        assert!(output.contains("Period End"));
        assert!(output.contains("Acme Ltd"));
        assert!(output.contains("pending"));
    }

    #[test]
    fn test_empty_documents() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_documents(&[]).unwrap();
        assert!(output.contains("No documents found"));
    }

    #[test]
    fn test_documents_quiet_lists_ids() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let doc = document();
        let output = formatter.format_documents(std::slice::from_ref(&doc)).unwrap();
        assert_eq!(output, doc.id.to_string());
    }

    #[test]
    fn test_document_json_includes_record() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let mut doc = document();
        doc.record = Some(StructuredRecord::new(RecordMetadata::default()));
        let output = formatter.format_document(&doc).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["extraction_status"], "pending");
        assert!(value["record"]["gate"].is_object());
    }

    #[test]
    fn test_document_shows_analysis_failures() {
        let mut doc = document();
        doc.analysis_diagnostics = vec!["analysis failed: engine timed out after 120s".to_string()];

        let table = Formatter::new(OutputFormat::Table, false)
            .format_document(&doc)
            .unwrap();
        assert!(table.contains("analysis failed: engine timed out after 120s"));

        let json = Formatter::new(OutputFormat::Json, false)
            .format_document(&doc)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value["analysis_diagnostics"][0],
            "analysis failed: engine timed out after 120s"
        );
    }

    #[test]
    fn test_refusal_lists_blocking_issues() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let outcome = AnalysisOutcome::Refused {
            blocking_issues: vec!["required metric 'total_assets' missing".to_string()],
        };
        let output = formatter.format_analysis(&outcome).unwrap();
        assert!(output.contains("✗ Analysis refused"));
        assert!(output.contains("required metric 'total_assets' missing"));
    }

    #[test]
    fn test_completed_analysis_table() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let doc = document();
        let output = formatter
            .format_analysis(&AnalysisOutcome::Completed(analysis(&doc)))
            .unwrap();
        assert!(output.contains("working_capital"));
        assert!(output.contains("Risk score: 14 (related_party_exposure)"));
        assert!(output.contains("⚠ integrity drift: example"));
    }

    #[test]
    fn test_history_json() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let doc = document();
        let output = formatter.format_history(&[analysis(&doc)]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value[0]["risk_score"], 14);
        assert_eq!(value[0]["readiness"], "READY");
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(formatter.success("test"), "✓ test");
        assert_eq!(formatter.readiness(ReadinessLevel::Blocked), "BLOCKED");
    }

    #[test]
    fn test_timestamp_formatting() {
        assert_eq!(timestamp(0), "1970-01-01 00:00:00");
    }
}
