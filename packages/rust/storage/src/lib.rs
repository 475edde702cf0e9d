//! libSQL storage for the docset search index (`docSet.dsidx`).
//!
//! The [`IndexStore`] struct wraps a local libSQL database holding the single
//! `searchIndex` table documentation browsers query.
//!
//! **Access rules:**
//! - Index builds: read-write, schema reset on open, via [`IndexStore::create`]
//! - Lookups: read-only via [`IndexStore::open_readonly`]

mod schema;

use std::path::Path;

use docsetter_shared::{DocsetError, IndexRecord, Result};
use libsql::{Connection, Database, params};

/// Search index handle wrapping a libSQL database.
pub struct IndexStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl IndexStore {
    /// Open or create the index at `path` and reset it to an empty
    /// `searchIndex` table. Any previous rows are dropped.
    pub async fn create(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DocsetError::io(parent, e))?;
        }

        let store = Self::connect(path, false).await?;
        store.reset().await?;
        Ok(store)
    }

    /// Open an existing index at `path` for lookups.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DocsetError::not_found(path));
        }
        Self::connect(path, true).await
    }

    async fn connect(path: &Path, readonly: bool) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DocsetError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DocsetError::Storage(e.to_string()))?;

        Ok(Self { db, conn, readonly })
    }

    /// Drop and recreate the `searchIndex` table and its unique index.
    pub async fn reset(&self) -> Result<()> {
        self.check_writable()?;
        tracing::debug!("resetting searchIndex");
        self.conn
            .execute_batch(schema::RESET_SQL)
            .await
            .map_err(|e| DocsetError::Storage(format!("schema reset failed: {e}")))?;
        Ok(())
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(DocsetError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert a record, committing immediately.
    ///
    /// Returns `false` when an identical (name, type, path) row already exists;
    /// the existing row is left as is.
    pub async fn insert(&self, record: &IndexRecord) -> Result<bool> {
        self.check_writable()?;
        let changed = self
            .conn
            .execute(
                schema::INSERT_SQL,
                params![
                    record.name.as_str(),
                    record.kind.as_str(),
                    record.path.as_str()
                ],
            )
            .await
            .map_err(|e| DocsetError::Storage(e.to_string()))?;
        Ok(changed > 0)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// All records in insertion order.
    pub async fn records(&self) -> Result<Vec<IndexRecord>> {
        let rows = self
            .conn
            .query(
                "SELECT name, type, path FROM searchIndex ORDER BY id",
                params![],
            )
            .await
            .map_err(|e| DocsetError::Storage(e.to_string()))?;
        collect_records(rows).await
    }

    /// Records whose name contains `term` (case-insensitive for ASCII).
    pub async fn search(&self, term: &str, limit: u32) -> Result<Vec<IndexRecord>> {
        let pattern = format!("%{}%", escape_like(term));
        let rows = self
            .conn
            .query(
                "SELECT name, type, path FROM searchIndex
                 WHERE name LIKE ?1 ESCAPE '\\'
                 ORDER BY id
                 LIMIT ?2",
                params![pattern.as_str(), limit],
            )
            .await
            .map_err(|e| DocsetError::Storage(e.to_string()))?;
        collect_records(rows).await
    }

    /// Number of rows in the index.
    pub async fn count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM searchIndex", params![])
            .await
            .map_err(|e| DocsetError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let n: i64 = row
                    .get(0)
                    .map_err(|e| DocsetError::Storage(e.to_string()))?;
                Ok(n as usize)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DocsetError::Storage(e.to_string())),
        }
    }
}

/// Drain `rows` of `(name, type, path)` into records.
async fn collect_records(mut rows: libsql::Rows) -> Result<Vec<IndexRecord>> {
    let mut results = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DocsetError::Storage(e.to_string()))?
    {
        results.push(IndexRecord {
            name: row
                .get::<String>(0)
                .map_err(|e| DocsetError::Storage(e.to_string()))?,
            kind: row
                .get::<String>(1)
                .map_err(|e| DocsetError::Storage(e.to_string()))?,
            path: row
                .get::<String>(2)
                .map_err(|e| DocsetError::Storage(e.to_string()))?,
        });
    }
    Ok(results)
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
