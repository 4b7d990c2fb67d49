//! Co-access edge tracking
//!
//! Unordered document pairs that appeared together in one search's top
//! results. Pairs are stored canonically with the smaller id first, and
//! counts only ever grow.

use super::Store;
use crate::error::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

impl Store {
    /// Record a co-access increment for every pair among the given documents.
    ///
    /// Callers pass the distinct documents of a search's top results, in rank
    /// order. New edges start at count 1; existing edges are incremented and
    /// their timestamp refreshed.
    pub fn record_co_access(&self, doc_ids: &[i64]) -> Result<()> {
        if doc_ids.len() < 2 {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        for (i, &a) in doc_ids.iter().enumerate() {
            for &b in &doc_ids[i + 1..] {
                if a == b {
                    continue;
                }
                let (lo, hi) = if a < b { (a, b) } else { (b, a) };
                tx.execute(
                    "INSERT INTO co_access (doc_id_a, doc_id_b, co_count, last_co_access)
                     VALUES (?1, ?2, 1, ?3)
                     ON CONFLICT(doc_id_a, doc_id_b) DO UPDATE SET
                        co_count = co_count + 1,
                        last_co_access = excluded.last_co_access",
                    params![lo, hi, now],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Current co-access count for a pair, in either order
    pub fn co_access_count(&self, a: i64, b: i64) -> Result<i64> {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let count = self
            .conn
            .query_row(
                "SELECT co_count FROM co_access WHERE doc_id_a = ?1 AND doc_id_b = ?2",
                params![lo, hi],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0))
    }
}
