//! Importance score persistence

use super::Store;
use crate::error::Result;
use rusqlite::params;
use std::collections::HashMap;

impl Store {
    /// Persist freshly computed importance scores.
    ///
    /// Every stored score is reset to 0 and the new scores written in the
    /// same transaction, so documents that dropped out of the graph land at
    /// exactly 0 instead of keeping a stale value.
    pub fn write_importance(&self, scores: &HashMap<String, f64>) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("UPDATE documents SET pagerank = 0.0", [])?;
        {
            let mut stmt = tx.prepare("UPDATE documents SET pagerank = ?2 WHERE path = ?1")?;
            for (path, score) in scores {
                stmt.execute(params![path, score])?;
            }
        }
        tx.commit()?;

        tracing::info!(documents = scores.len(), "persisted importance scores");
        Ok(())
    }

    /// Top documents by importance, for stats and inspection
    pub fn top_by_importance(&self, limit: usize) -> Result<Vec<(String, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, pagerank FROM documents ORDER BY pagerank DESC, path LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Largest stored importance score, 0 when the graph is empty
    pub fn max_importance(&self) -> Result<f64> {
        let max: Option<f64> = self.conn.query_row(
            "SELECT MAX(pagerank) FROM documents",
            [],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::chunks::ChunkInsert;
    use crate::db::DocType;

    fn insert_doc(store: &Store, path: &str) -> i64 {
        store
            .insert_document_with_chunks(
                path,
                "h",
                DocType::Semantic,
                &[],
                &[ChunkInsert {
                    heading: None,
                    content: "x".to_string(),
                    embedding: None,
                }],
            )
            .unwrap()
    }

    #[test]
    fn test_reset_then_write() {
        let store = Store::open_in_memory().unwrap();
        store.initialize().unwrap();
        insert_doc(&store, "a.md");
        insert_doc(&store, "b.md");

        let mut scores = HashMap::new();
        scores.insert("a.md".to_string(), 0.7);
        scores.insert("b.md".to_string(), 0.3);
        store.write_importance(&scores).unwrap();

        // b.md drops out of the next graph: its score must land at exactly 0
        let mut scores = HashMap::new();
        scores.insert("a.md".to_string(), 0.9);
        store.write_importance(&scores).unwrap();

        let top = store.top_by_importance(10).unwrap();
        assert_eq!(top[0], ("a.md".to_string(), 0.9));
        assert_eq!(top[1], ("b.md".to_string(), 0.0));
        assert!((store.max_importance().unwrap() - 0.9).abs() < 1e-12);
    }
}
