//! Chunk storage operations
//!
//! A document's chunk set is always written whole: insert and replace run as
//! one transaction per document so a crash can never leave a half-replaced
//! chunk set behind.

use super::vectors::{bytes_to_embedding, embedding_to_bytes};
use super::{DocType, Store};
use crate::error::Result;
use chrono::Utc;
use rusqlite::params;
use std::collections::BTreeSet;

/// Chunk ready for insertion
#[derive(Debug, Clone)]
pub struct ChunkInsert {
    pub heading: Option<String>,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
}

/// Stored chunk carrying its embedding, used by consolidation and the
/// brute-force vector path
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk_id: i64,
    pub doc_id: i64,
    pub doc_updated_at: String,
    pub embedding: Vec<f32>,
}

impl Store {
    /// Insert a brand-new document together with its chunks and labels
    pub fn insert_document_with_chunks(
        &self,
        path: &str,
        content_hash: &str,
        doc_type: DocType,
        labels: &[String],
        chunks: &[ChunkInsert],
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO documents (path, content_hash, chunk_count, updated_at, doc_type)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![path, content_hash, chunks.len() as i64, now, doc_type.as_str()],
        )?;
        let doc_id = tx.last_insert_rowid();

        insert_chunk_rows(&tx, doc_id, chunks)?;
        for label in labels {
            tx.execute(
                "INSERT OR IGNORE INTO document_labels (doc_id, label) VALUES (?1, ?2)",
                params![doc_id, label],
            )?;
        }

        tx.commit()?;
        Ok(doc_id)
    }

    /// Replace a changed document's chunk set and metadata in place.
    ///
    /// The document id survives, so co-access edges and importance history
    /// keep their slots.
    pub fn replace_document_content(
        &self,
        doc_id: i64,
        content_hash: &str,
        doc_type: DocType,
        labels: &[String],
        chunks: &[ChunkInsert],
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("DELETE FROM chunks WHERE doc_id = ?1", params![doc_id])?;
        insert_chunk_rows(&tx, doc_id, chunks)?;

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
            "UPDATE documents SET
                content_hash = ?2,
                chunk_count = ?3,
                updated_at = ?4,
                doc_type = ?5
             WHERE id = ?1",
            params![
                doc_id,
                content_hash,
                chunks.len() as i64,
                now,
                doc_type.as_str()
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Concatenated chunk text of a document, in chunk order
    pub fn document_text(&self, doc_id: i64) -> Result<String> {
        let mut stmt = self.conn.prepare(
            "SELECT content FROM chunks WHERE doc_id = ?1 ORDER BY chunk_index",
        )?;
        let parts = stmt
            .query_map(params![doc_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(parts.join("\n\n"))
    }

    /// Chunk rows of a document as (chunk_index, heading, content)
    pub fn document_chunks(&self, doc_id: i64) -> Result<Vec<(usize, Option<String>, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT chunk_index, heading, content FROM chunks
             WHERE doc_id = ?1 ORDER BY chunk_index",
        )?;
        let rows = stmt
            .query_map(params![doc_id], |row| {
                Ok((
                    row.get::<_, i64>(0)? as usize,
                    row.get(1)?,
                    row.get(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every chunk that carries an embedding, in (doc_id, chunk_index) order
    pub fn embedded_chunks(&self) -> Result<Vec<EmbeddedChunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.doc_id, d.updated_at, c.embedding
             FROM chunks c
             JOIN documents d ON d.id = c.doc_id
             WHERE c.embedding IS NOT NULL
             ORDER BY c.doc_id, c.chunk_index",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let bytes: Vec<u8> = row.get(3)?;
                Ok(EmbeddedChunk {
                    chunk_id: row.get(0)?,
                    doc_id: row.get(1)?,
                    doc_updated_at: row.get(2)?,
                    embedding: bytes_to_embedding(&bytes),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete chunks by id and recompute chunk counts for the owning
    /// documents, all in one transaction
    pub fn remove_chunks(&self, chunk_ids: &[i64]) -> Result<usize> {
        if chunk_ids.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;

        let mut affected: BTreeSet<i64> = BTreeSet::new();
        let mut removed = 0;
        for chunk_id in chunk_ids {
            let doc_id: Option<i64> = tx
                .query_row(
                    "SELECT doc_id FROM chunks WHERE id = ?1",
                    params![chunk_id],
                    |row| row.get(0),
                )
                .ok();
            if let Some(doc_id) = doc_id {
                removed += tx.execute("DELETE FROM chunks WHERE id = ?1", params![chunk_id])?;
                affected.insert(doc_id);
            }
        }

        for doc_id in affected {
            tx.execute(
                "UPDATE documents SET chunk_count =
                    (SELECT COUNT(*) FROM chunks WHERE doc_id = ?1)
                 WHERE id = ?1",
                params![doc_id],
            )?;
        }

        tx.commit()?;
        Ok(removed)
    }
}

fn insert_chunk_rows(
    tx: &rusqlite::Transaction<'_>,
    doc_id: i64,
    chunks: &[ChunkInsert],
) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO chunks (doc_id, chunk_index, heading, content, embedding)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (index, chunk) in chunks.iter().enumerate() {
        let blob = chunk.embedding.as_deref().map(embedding_to_bytes);
        stmt.execute(params![
            doc_id,
            index as i64,
            chunk.heading,
            chunk.content,
            blob
        ])?;
    }
    Ok(())
}
