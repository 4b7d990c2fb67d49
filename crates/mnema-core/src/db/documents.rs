//! Document operations

use super::Store;
use crate::error::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

/// Starting confidence for a newly indexed document
pub const INITIAL_CONFIDENCE: f64 = 0.8;

/// Multiplicative confidence boost applied on access, capped at 1.0
pub const ACCESS_BOOST: f64 = 1.03;

/// Document classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocType {
    /// Declarative knowledge: specs, notes, references
    Semantic,
    /// How-to content: task lists, workflows
    Procedural,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Semantic => "semantic",
            DocType::Procedural => "procedural",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "procedural" => DocType::Procedural,
            _ => DocType::Semantic,
        }
    }
}

/// Document record from the store
#[derive(Debug, Clone)]
pub struct Document {
    pub id: i64,
    pub path: String,
    pub content_hash: String,
    pub chunk_count: usize,
    pub updated_at: String,
    pub confidence: f64,
    pub access_count: i64,
    pub last_accessed_at: Option<String>,
    pub pagerank: f64,
    pub doc_type: DocType,
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        path: row.get(1)?,
        content_hash: row.get(2)?,
        chunk_count: row.get::<_, i64>(3)? as usize,
        updated_at: row.get(4)?,
        confidence: row.get(5)?,
        access_count: row.get(6)?,
        last_accessed_at: row.get(7)?,
        pagerank: row.get(8)?,
        doc_type: DocType::parse(&row.get::<_, String>(9)?),
    })
}

const DOCUMENT_COLUMNS: &str = "id, path, content_hash, chunk_count, updated_at, \
     confidence, access_count, last_accessed_at, pagerank, doc_type";

impl Store {
    /// Find document by path
    pub fn find_document(&self, path: &str) -> Result<Option<Document>> {
        let doc = self
            .conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE path = ?1"),
                params![path],
                document_from_row,
            )
            .optional()?;
        Ok(doc)
    }

    /// Get document by id
    pub fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let doc = self
            .conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
                params![id],
                document_from_row,
            )
            .optional()?;
        Ok(doc)
    }

    /// All documents, ordered by path
    pub fn all_documents(&self) -> Result<Vec<Document>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY path"
            ))?;
        let docs = stmt
            .query_map([], document_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    /// All stored document paths
    pub fn all_document_paths(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT path FROM documents")?;
        let paths = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(paths)
    }

    /// Delete a document and everything hanging off it.
    ///
    /// Chunks, labels and co-access edges cascade via foreign keys.
    pub fn delete_document(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Delete a document by path, returns whether a record existed
    pub fn delete_document_by_path(&self, path: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM documents WHERE path = ?1", params![path])?;
        Ok(rows > 0)
    }

    /// Labels attached to a document, sorted
    pub fn document_labels(&self, doc_id: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT label FROM document_labels WHERE doc_id = ?1 ORDER BY label")?;
        let labels = stmt
            .query_map(params![doc_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(labels)
    }

    /// Rewrite a document's labels and type without touching its chunks.
    ///
    /// Used when the content hash is unchanged but the derived metadata
    /// drifted.
    pub fn resync_document_metadata(
        &self,
        doc_id: i64,
        labels: &[String],
        doc_type: DocType,
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM document_labels WHERE doc_id = ?1",
            params![doc_id],
        )?;
        for label in labels {
            tx.execute(
                "INSERT OR IGNORE INTO document_labels (doc_id, label) VALUES (?1, ?2)",
                params![doc_id, label],
            )?;
        }
        tx.execute(
            "UPDATE documents SET doc_type = ?2 WHERE id = ?1",
            params![doc_id, doc_type.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Record that a search surfaced these documents: bump access counts,
    /// boost confidence, and stamp the access time.
    pub fn record_access(&self, doc_ids: &[i64]) -> Result<()> {
        if doc_ids.is_empty() {
            return Ok(());
        }
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        for id in doc_ids {
            tx.execute(
                "UPDATE documents SET
                    access_count = access_count + 1,
                    confidence = MIN(1.0, confidence * ?2),
                    last_accessed_at = ?3
                 WHERE id = ?1",
                params![id, ACCESS_BOOST, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
