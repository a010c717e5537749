//! Tallyman Storage Layer
//!
//! Implements the DocumentStore trait using SQLite.
//!
//! # Architecture
//!
//! - One row per Document Unit, with the structured record stored as JSON
//!   next to its schema version and fingerprint
//! - One row per Analysis Record, linked by document id
//! - A denormalized `transactions` table for intercompany and related-party
//!   lines, written as a secondary step after the record
//!
//! Every status change is a conditional `UPDATE ... WHERE status IN (...)`;
//! the changed-row count tells the caller whether it won the transition.
//!
//! # Examples
//!
//! ```no_run
//! use tallyman_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready for document operations
//! ```

#![warn(missing_docs)]

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use std::path::Path;
use tallyman_domain::record::MIN_SCHEMA_VERSION;
use tallyman_domain::traits::{DocumentQuery, DocumentStore, ExtractionCompletion};
use tallyman_domain::{
    now_secs, AnalysisId, AnalysisRecord, AnalysisStatus, DocumentId, DocumentUnit,
    ExtractionStatus, ReadinessLevel, TransactionLine, SCHEMA_VERSION,
};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Payload (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Document with the same ID already exists
    #[error("Duplicate document detected")]
    Duplicate,
}

const DOCUMENT_COLUMNS: &str = "id, entity_id, entity_name, period_end, source_handle, \
     extraction_status, analysis_status, record_json, schema_version, expected_fingerprint, \
     last_analysis_fingerprint, diagnostics, analysis_diagnostics, created_at, updated_at";

const ANALYSIS_COLUMNS: &str = "id, document_id, opportunities, input_fingerprint, readiness, \
     risk_flags, risk_score, limitations, tokens_used, model_name, created_at";

const PERIOD_FORMAT: &str = "%Y-%m-%d";

/// SQLite-based implementation of DocumentStore
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Share a store between tasks by
/// wrapping it in a mutex and holding the lock for one call at a time.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tallyman_store::SqliteStore;
    ///
    /// let store = SqliteStore::new("tallyman.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        self.conn.execute_batch(schema)?;

        // Databases created before analysis diagnostics were tracked
        let has_column: bool = self
            .conn
            .query_row(
                "SELECT 1 FROM pragma_table_info('documents') WHERE name = 'analysis_diagnostics'",
                [],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !has_column {
            self.conn.execute_batch(
                "ALTER TABLE documents ADD COLUMN analysis_diagnostics TEXT NOT NULL DEFAULT '[]'",
            )?;
            debug!("Added analysis_diagnostics column to documents");
        }
        Ok(())
    }

    /// Transaction rows for a document, in position order
    pub fn get_transactions(
        &self,
        id: DocumentId,
    ) -> Result<(Vec<TransactionLine>, Vec<TransactionLine>), StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, counterparty, description, amount FROM transactions
             WHERE document_id = ?1 ORDER BY kind, position",
        )?;
        let rows = stmt
            .query_map(params![id_to_bytes(id.value())], |row| {
                let kind: String = row.get(0)?;
                Ok((
                    kind,
                    TransactionLine {
                        counterparty: row.get(1)?,
                        description: row.get(2)?,
                        amount: row.get(3)?,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut intercompany = Vec::new();
        let mut related_party = Vec::new();
        for (kind, line) in rows {
            if kind == "intercompany" {
                intercompany.push(line);
            } else {
                related_party.push(line);
            }
        }
        Ok((intercompany, related_party))
    }

    /// Run a conditional status update, returning whether a row changed
    fn conditional_update(
        &self,
        set_clause: &str,
        set_params: Vec<Box<dyn ToSql>>,
        id: DocumentId,
        extra_condition: &str,
        status_column: &str,
        from: &[&str],
    ) -> Result<bool, StoreError> {
        if from.is_empty() {
            return Ok(false);
        }

        let placeholders = vec!["?"; from.len()].join(", ");
        let sql = format!(
            "UPDATE documents SET {} WHERE id = ? {} AND {} IN ({})",
            set_clause, extra_condition, status_column, placeholders
        );

        let mut params = set_params;
        params.push(Box::new(id_to_bytes(id.value())));
        for state in from {
            params.push(Box::new(state.to_string()));
        }
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let changed = self.conn.execute(&sql, &param_refs[..])?;
        Ok(changed > 0)
    }
}

fn id_to_bytes(value: u128) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

fn bytes_to_u128(bytes: &[u8]) -> Result<u128, StoreError> {
    if bytes.len() != 16 {
        return Err(StoreError::InvalidData(format!(
            "Expected 16 bytes for an id, got {}",
            bytes.len()
        )));
    }
    let mut arr = [0u8; 16];
    arr.copy_from_slice(bytes);
    Ok(u128::from_be_bytes(arr))
}

fn conversion<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

fn row_id(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<u128> {
    let bytes: Vec<u8> = row.get(idx)?;
    bytes_to_u128(&bytes).map_err(|e| conversion(idx, Type::Blob, e))
}

fn row_json<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion(idx, Type::Text, e))
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentUnit> {
    let id = DocumentId::from_value(row_id(row, 0)?);

    let period: String = row.get(3)?;
    let period_end = NaiveDate::parse_from_str(&period, PERIOD_FORMAT)
        .map_err(|e| conversion(3, Type::Text, e))?;

    let extraction: String = row.get(5)?;
    let extraction_status = ExtractionStatus::parse(&extraction).ok_or_else(|| {
        conversion(
            5,
            Type::Text,
            StoreError::InvalidData(format!("Unknown extraction status: {}", extraction)),
        )
    })?;

    let analysis: String = row.get(6)?;
    let analysis_status = AnalysisStatus::parse(&analysis).ok_or_else(|| {
        conversion(
            6,
            Type::Text,
            StoreError::InvalidData(format!("Unknown analysis status: {}", analysis)),
        )
    })?;

    let schema_version = row.get::<_, Option<i64>>(8)?.map(|v| v as u32);
    let record_json: Option<String> = row.get(7)?;

    // Payloads from an unsupported schema are not decoded at all
    let record = match (record_json, schema_version) {
        (Some(json), Some(version))
            if (MIN_SCHEMA_VERSION..=SCHEMA_VERSION).contains(&version) =>
        {
            Some(serde_json::from_str(&json).map_err(|e| conversion(7, Type::Text, e))?)
        }
        _ => None,
    };

    Ok(DocumentUnit {
        id,
        entity_id: row.get(1)?,
        entity_name: row.get(2)?,
        period_end,
        source_handle: row.get(4)?,
        extraction_status,
        analysis_status,
        record,
        schema_version,
        expected_fingerprint: row.get(9)?,
        last_analysis_fingerprint: row.get(10)?,
        diagnostics: row_json(row, 11)?,
        analysis_diagnostics: row_json(row, 12)?,
        created_at: row.get::<_, i64>(13)? as u64,
        updated_at: row.get::<_, i64>(14)? as u64,
    })
}

fn row_to_analysis(row: &rusqlite::Row<'_>) -> rusqlite::Result<AnalysisRecord> {
    let readiness_text: String = row.get(4)?;
    let readiness = ReadinessLevel::parse(&readiness_text).ok_or_else(|| {
        conversion(
            4,
            Type::Text,
            StoreError::InvalidData(format!("Unknown readiness level: {}", readiness_text)),
        )
    })?;

    Ok(AnalysisRecord {
        id: AnalysisId::from_value(row_id(row, 0)?),
        document_id: DocumentId::from_value(row_id(row, 1)?),
        opportunities: row_json(row, 2)?,
        input_fingerprint: row.get(3)?,
        readiness,
        risk_flags: row_json(row, 5)?,
        risk_score: row.get::<_, i64>(6)?.clamp(0, 100) as u8,
        limitations: row_json(row, 7)?,
        tokens_used: row.get::<_, i64>(8)? as u64,
        model_name: row.get(9)?,
        created_at: row.get::<_, i64>(10)? as u64,
    })
}

impl DocumentStore for SqliteStore {
    type Error = StoreError;

    fn insert_document(&mut self, document: &DocumentUnit) -> Result<(), Self::Error> {
        let id_bytes = id_to_bytes(document.id.value());

        let exists: bool = self
            .conn
            .query_row(
                "SELECT 1 FROM documents WHERE id = ?1",
                params![&id_bytes],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        if exists {
            return Err(StoreError::Duplicate);
        }

        let record_json = document
            .record
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            &format!(
                "INSERT INTO documents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                DOCUMENT_COLUMNS
            ),
            params![
                &id_bytes,
                &document.entity_id,
                &document.entity_name,
                document.period_end.format(PERIOD_FORMAT).to_string(),
                &document.source_handle,
                document.extraction_status.as_str(),
                document.analysis_status.as_str(),
                record_json,
                document.schema_version.map(|v| v as i64),
                &document.expected_fingerprint,
                &document.last_analysis_fingerprint,
                serde_json::to_string(&document.diagnostics)?,
                serde_json::to_string(&document.analysis_diagnostics)?,
                document.created_at as i64,
                document.updated_at as i64,
            ],
        )?;

        debug!("Inserted document {}", document.id);
        Ok(())
    }

    fn get_document(&self, id: DocumentId) -> Result<Option<DocumentUnit>, Self::Error> {
        let document = self
            .conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                params![id_to_bytes(id.value())],
                row_to_document,
            )
            .optional()?;

        Ok(document)
    }

    fn query_documents(&self, query: &DocumentQuery) -> Result<Vec<DocumentUnit>, Self::Error> {
        let mut sql = format!("SELECT {} FROM documents WHERE 1=1", DOCUMENT_COLUMNS);
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(status) = query.extraction_status {
            sql.push_str(" AND extraction_status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(entity_id) = &query.entity_id {
            sql.push_str(" AND entity_id = ?");
            params.push(Box::new(entity_id.clone()));
        }

        sql.push_str(" ORDER BY created_at ASC, id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(limit as i64));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let documents = stmt
            .query_map(&param_refs[..], row_to_document)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(documents)
    }

    fn transition_extraction(
        &mut self,
        id: DocumentId,
        from: &[ExtractionStatus],
        to: ExtractionStatus,
    ) -> Result<bool, Self::Error> {
        let legal: Vec<&str> = from
            .iter()
            .filter(|s| s.can_transition_to(to))
            .map(|s| s.as_str())
            .collect();

        // Leaving `completed` also returns the analysis lifecycle to its start
        let moved = self.conditional_update(
            "extraction_status = ?, analysis_status = 'none', updated_at = ?",
            vec![Box::new(to.as_str()), Box::new(now_secs() as i64)],
            id,
            "",
            "extraction_status",
            &legal,
        )?;

        debug!("Extraction {} -> {}: {}", id, to, if moved { "applied" } else { "rejected" });
        Ok(moved)
    }

    fn complete_extraction(
        &mut self,
        id: DocumentId,
        completion: &ExtractionCompletion,
    ) -> Result<bool, Self::Error> {
        // serde_json writes NaN and infinities as null, which cannot be read back
        completion
            .record
            .check_finite()
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        let changed = self.conn.execute(
            "UPDATE documents SET extraction_status = 'completed', analysis_status = ?1,
                 record_json = ?2, schema_version = ?3, expected_fingerprint = ?4,
                 diagnostics = ?5, updated_at = ?6
             WHERE id = ?7 AND extraction_status = 'processing'",
            params![
                completion.analysis_status.as_str(),
                serde_json::to_string(&completion.record)?,
                completion.record.schema_version as i64,
                &completion.fingerprint,
                serde_json::to_string(&completion.diagnostics)?,
                now_secs() as i64,
                id_to_bytes(id.value()),
            ],
        )?;

        Ok(changed > 0)
    }

    fn fail_extraction(
        &mut self,
        id: DocumentId,
        diagnostics: &[String],
    ) -> Result<bool, Self::Error> {
        let changed = self.conn.execute(
            "UPDATE documents SET extraction_status = 'failed', analysis_status = 'none',
                 diagnostics = ?1, updated_at = ?2
             WHERE id = ?3 AND extraction_status = 'processing'",
            params![
                serde_json::to_string(diagnostics)?,
                now_secs() as i64,
                id_to_bytes(id.value()),
            ],
        )?;

        Ok(changed > 0)
    }

    fn replace_transactions(
        &mut self,
        id: DocumentId,
        intercompany: &[TransactionLine],
        related_party: &[TransactionLine],
    ) -> Result<(), Self::Error> {
        let id_bytes = id_to_bytes(id.value());
        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM transactions WHERE document_id = ?1",
            params![&id_bytes],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO transactions (document_id, kind, position, counterparty, description, amount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (kind, lines) in [("intercompany", intercompany), ("related_party", related_party)] {
                for (position, line) in lines.iter().enumerate() {
                    stmt.execute(params![
                        &id_bytes,
                        kind,
                        position as i64,
                        &line.counterparty,
                        &line.description,
                        line.amount,
                    ])?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn transition_analysis(
        &mut self,
        id: DocumentId,
        from: &[AnalysisStatus],
        to: AnalysisStatus,
    ) -> Result<bool, Self::Error> {
        let legal: Vec<&str> = from
            .iter()
            .filter(|s| s.can_transition_to(to, ExtractionStatus::Completed))
            .map(|s| s.as_str())
            .collect();

        let moved = self.conditional_update(
            "analysis_status = ?, updated_at = ?",
            vec![Box::new(to.as_str()), Box::new(now_secs() as i64)],
            id,
            "AND extraction_status = 'completed'",
            "analysis_status",
            &legal,
        )?;

        debug!("Analysis {} -> {}: {}", id, to, if moved { "applied" } else { "rejected" });
        Ok(moved)
    }

    fn fail_analysis(&mut self, id: DocumentId, reason: &str) -> Result<bool, Self::Error> {
        let changed = self.conn.execute(
            "UPDATE documents SET analysis_status = 'failed',
                 analysis_diagnostics = json_insert(analysis_diagnostics, '$[#]', ?1),
                 updated_at = ?2
             WHERE id = ?3 AND analysis_status = 'processing' AND extraction_status = 'completed'",
            params![reason, now_secs() as i64, id_to_bytes(id.value())],
        )?;

        debug!(
            "Analysis {} -> failed: {}",
            id,
            if changed > 0 { "applied" } else { "rejected" }
        );
        Ok(changed > 0)
    }

    fn complete_analysis(&mut self, record: &AnalysisRecord) -> Result<bool, Self::Error> {
        let document_bytes = id_to_bytes(record.document_id.value());
        let tx = self.conn.transaction()?;

        let changed = tx.execute(
            "UPDATE documents SET analysis_status = 'completed', last_analysis_fingerprint = ?1,
                 updated_at = ?2
             WHERE id = ?3 AND analysis_status = 'processing' AND extraction_status = 'completed'",
            params![&record.input_fingerprint, now_secs() as i64, &document_bytes],
        )?;

        if changed == 0 {
            // Dropping the transaction rolls it back
            return Ok(false);
        }

        tx.execute(
            &format!(
                "INSERT INTO analyses ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                ANALYSIS_COLUMNS
            ),
            params![
                id_to_bytes(record.id.value()),
                &document_bytes,
                serde_json::to_string(&record.opportunities)?,
                &record.input_fingerprint,
                record.readiness.as_str(),
                serde_json::to_string(&record.risk_flags)?,
                record.risk_score as i64,
                serde_json::to_string(&record.limitations)?,
                record.tokens_used as i64,
                &record.model_name,
                record.created_at as i64,
            ],
        )?;

        tx.commit()?;
        Ok(true)
    }

    fn list_analyses(&self, id: DocumentId) -> Result<Vec<AnalysisRecord>, Self::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM analyses WHERE document_id = ?1 ORDER BY created_at DESC, id DESC",
            ANALYSIS_COLUMNS
        ))?;

        let analyses = stmt
            .query_map(params![id_to_bytes(id.value())], row_to_analysis)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(analyses)
    }
}
