//! Store schema and initialization

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Main store handle
pub struct Store {
    pub(crate) conn: Connection,
}

pub(crate) const SCHEMA_VERSION: i32 = 4;

/// Capabilities discovered while opening the store, threaded to call sites
/// instead of process-global flags.
#[derive(Debug, Clone, Copy)]
pub struct StoreCapabilities {
    /// Whether initialization destroyed and recreated the store
    pub rebuilt: bool,
    /// Embedding width recorded in the store, 0 when nothing was embedded yet
    pub embedding_dimensions: usize,
}

const CREATE_TABLES: &str = r#"
-- One row per indexed source file
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    content_hash TEXT NOT NULL,
    chunk_count INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    confidence REAL NOT NULL DEFAULT 0.8,
    access_count INTEGER NOT NULL DEFAULT 0,
    last_accessed_at TEXT,
    pagerank REAL NOT NULL DEFAULT 0.0,
    doc_type TEXT NOT NULL DEFAULT 'semantic'
);

-- Bounded fragments of a document, fully replaced on every content change
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    chunk_index INTEGER NOT NULL,
    heading TEXT,
    content TEXT NOT NULL,
    embedding BLOB,
    UNIQUE(doc_id, chunk_index)
);

-- Full-text search index over chunks
CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    heading,
    content,
    tokenize='porter unicode61'
);

-- Memoized (model, chunk text) -> vector lookups
CREATE TABLE IF NOT EXISTS embedding_cache (
    model_id TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    embedding BLOB NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (model_id, content_hash)
);

-- Unordered document pairs surfaced together by one search
CREATE TABLE IF NOT EXISTS co_access (
    doc_id_a INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    doc_id_b INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    co_count INTEGER NOT NULL DEFAULT 1,
    last_co_access TEXT NOT NULL,
    PRIMARY KEY (doc_id_a, doc_id_b),
    CHECK (doc_id_a < doc_id_b)
);

-- Label membership, exact-match filterable
CREATE TABLE IF NOT EXISTS document_labels (
    doc_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    label TEXT NOT NULL,
    PRIMARY KEY (doc_id, label)
);

-- Versioned key/value record
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_chunks_doc_id ON chunks(doc_id);
CREATE INDEX IF NOT EXISTS idx_document_labels_label ON document_labels(label);
"#;

const CREATE_TRIGGERS: &str = r#"
-- Sync FTS on chunk insert
CREATE TRIGGER IF NOT EXISTS chunks_ai
AFTER INSERT ON chunks
BEGIN
    INSERT INTO chunks_fts(rowid, heading, content)
    VALUES (new.id, new.heading, new.content);
END;

-- Sync FTS on chunk update
CREATE TRIGGER IF NOT EXISTS chunks_au
AFTER UPDATE ON chunks
BEGIN
    DELETE FROM chunks_fts WHERE rowid = old.id;
    INSERT INTO chunks_fts(rowid, heading, content)
    VALUES (new.id, new.heading, new.content);
END;

-- Sync FTS on chunk delete
CREATE TRIGGER IF NOT EXISTS chunks_ad
AFTER DELETE ON chunks
BEGIN
    DELETE FROM chunks_fts WHERE rowid = old.id;
END;
"#;

const DROP_ALL: &str = r#"
DROP TRIGGER IF EXISTS chunks_ai;
DROP TRIGGER IF EXISTS chunks_au;
DROP TRIGGER IF EXISTS chunks_ad;
DROP TABLE IF EXISTS chunks_fts;
DROP TABLE IF EXISTS chunks;
DROP TABLE IF EXISTS document_labels;
DROP TABLE IF EXISTS co_access;
DROP TABLE IF EXISTS embedding_cache;
DROP TABLE IF EXISTS documents;
DROP TABLE IF EXISTS meta;
"#;

impl Store {
    /// Open store at path, creating if necessary
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Open in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Initialize the schema, upgrading or rebuilding an out-of-date store
    pub fn initialize(&self) -> Result<StoreCapabilities> {
        // Set PRAGMAs for performance and cascade semantics
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA cache_size = -64000;
             PRAGMA busy_timeout = 5000;",
        )?;

        self.conn.execute_batch(CREATE_TABLES)?;
        self.conn.execute_batch(CREATE_TRIGGERS)?;

        let rebuilt = self.migrate()?;

        Ok(StoreCapabilities {
            rebuilt,
            embedding_dimensions: self.embedding_dimensions()?,
        })
    }

    /// Get current schema version
    pub fn schema_version(&self) -> Result<Option<i32>> {
        Ok(self
            .get_meta("schema_version")?
            .and_then(|v| v.parse().ok()))
    }

    /// Recorded embedding width, 0 when never set
    pub fn embedding_dimensions(&self) -> Result<usize> {
        Ok(self
            .get_meta("embedding_dimensions")?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    pub(crate) fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub(crate) fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Bring the stored schema to the current version.
    ///
    /// Versions 1 and 2 have in-place upgrades. The v4 chunk and embedding
    /// layout has no in-place path from v3, so anything the upgrades cannot
    /// carry to v4 is wiped and recreated. Returns whether a rebuild happened.
    fn migrate(&self) -> Result<bool> {
        let stored = self.schema_version()?;

        let Some(version) = stored else {
            // Fresh store
            self.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;
            return Ok(false);
        };

        if version == SCHEMA_VERSION {
            return Ok(false);
        }

        let reached = match version {
            1 => {
                self.upgrade_v1_to_v2()?;
                self.upgrade_v2_to_v3()?;
                3
            }
            2 => {
                self.upgrade_v2_to_v3()?;
                3
            }
            v => v,
        };

        if reached != SCHEMA_VERSION {
            tracing::warn!(
                stored = reached,
                expected = SCHEMA_VERSION,
                "schema version behind expected, rebuilding store"
            );
            self.rebuild()?;
            return Ok(true);
        }

        self.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;
        Ok(false)
    }

    /// Destroy and recreate every table
    fn rebuild(&self) -> Result<()> {
        self.conn.execute_batch(DROP_ALL)?;
        self.conn.execute_batch(CREATE_TABLES)?;
        self.conn.execute_batch(CREATE_TRIGGERS)?;
        self.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;
        Ok(())
    }

    fn upgrade_v1_to_v2(&self) -> Result<()> {
        let has_last_accessed: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('documents') WHERE name = 'last_accessed_at'",
            [],
            |row| row.get(0),
        ).unwrap_or(false);

        if !has_last_accessed {
            self.conn.execute(
                "ALTER TABLE documents ADD COLUMN last_accessed_at TEXT",
                [],
            )?;
        }

        self.set_meta("schema_version", "2")?;
        Ok(())
    }

    fn upgrade_v2_to_v3(&self) -> Result<()> {
        let has_pagerank: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('documents') WHERE name = 'pagerank'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !has_pagerank {
            self.conn.execute(
                "ALTER TABLE documents ADD COLUMN pagerank REAL NOT NULL DEFAULT 0.0",
                [],
            )?;
        }

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS co_access (
                doc_id_a INTEGER NOT NULL,
                doc_id_b INTEGER NOT NULL,
                co_count INTEGER NOT NULL DEFAULT 1,
                last_co_access TEXT NOT NULL,
                PRIMARY KEY (doc_id_a, doc_id_b),
                CHECK (doc_id_a < doc_id_b)
            )",
            [],
        )?;

        self.set_meta("schema_version", "3")?;
        Ok(())
    }
}
