//! Store statistics

use super::Store;
use crate::error::Result;
use serde::Serialize;

/// Snapshot of store contents
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub documents: usize,
    pub chunks: usize,
    pub embedded_chunks: usize,
    pub labels: usize,
    pub co_access_edges: usize,
    /// Top documents by importance as (path, score)
    pub top_documents: Vec<(String, f64)>,
}

impl Store {
    /// Gather store-wide statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(StoreStats {
            documents: count("SELECT COUNT(*) FROM documents")?,
            chunks: count("SELECT COUNT(*) FROM chunks")?,
            embedded_chunks: self.count_embedded_chunks()?,
            labels: count("SELECT COUNT(*) FROM document_labels")?,
            co_access_edges: count("SELECT COUNT(*) FROM co_access")?,
            top_documents: self.top_by_importance(10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::chunks::ChunkInsert;
    use crate::db::DocType;

    #[test]
    fn test_stats_counts() {
        let store = Store::open_in_memory().unwrap();
        store.initialize().unwrap();

        store
            .insert_document_with_chunks(
                "a.md",
                "h",
                DocType::Semantic,
                &["doc".to_string()],
                &[
                    ChunkInsert {
                        heading: None,
                        content: "one".to_string(),
                        embedding: Some(vec![1.0, 0.0]),
                    },
                    ChunkInsert {
                        heading: None,
                        content: "two".to_string(),
                        embedding: None,
                    },
                ],
            )
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.embedded_chunks, 1);
        assert_eq!(stats.labels, 1);
        assert_eq!(stats.co_access_edges, 0);
    }
}
