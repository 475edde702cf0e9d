//! `searchIndex` schema.
//!
//! Table name, column names, and the unique index are what documentation
//! browsers read from `docSet.dsidx`; they must stay exactly as written.

/// Drop any previous index and create an empty one.
pub(crate) const RESET_SQL: &str = r#"
DROP TABLE IF EXISTS searchIndex;

CREATE TABLE
    searchIndex(id INTEGER PRIMARY KEY,
                name TEXT,
                type TEXT,
                path TEXT);

CREATE UNIQUE INDEX
    anchor
ON
    searchIndex (name, type, path);
"#;

/// Duplicate (name, type, path) triples are ignored, never overwritten.
pub(crate) const INSERT_SQL: &str =
    "INSERT OR IGNORE INTO searchIndex(name, type, path) VALUES (?1, ?2, ?3)";
