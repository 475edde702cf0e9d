//! Core domain types shared across the docsetter crates.

use serde::{Deserialize, Serialize};

/// The only record category emitted into the search index.
pub const GUIDE_TYPE: &str = "Guide";

/// Default suffix of documents processed by the tree rewriter.
pub const DEFAULT_SUFFIX: &str = ".html";

// ---------------------------------------------------------------------------
// IndexRecord
// ---------------------------------------------------------------------------

/// One `searchIndex` row: a title the browser can jump to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Display name (breadcrumb-composed where applicable).
    pub name: String,
    /// Record category, always [`GUIDE_TYPE`] for records built here.
    #[serde(rename = "type")]
    pub kind: String,
    /// Path of the page relative to the docset's `Documents/` directory.
    pub path: String,
}

impl IndexRecord {
    /// Build a `Guide` record.
    pub fn guide(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: GUIDE_TYPE.to_string(),
            path: path.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorPolicy
// ---------------------------------------------------------------------------

/// What to do when one input unit (a markup file, a navigation entry) is bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Fail the whole run with the offending input.
    #[default]
    Abort,
    /// Leave the unit untouched and report a diagnostic.
    Skip,
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

impl std::str::FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown error policy '{other}': expected 'abort' or 'skip'")),
        }
    }
}
