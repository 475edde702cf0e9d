//! Navigation description → `docSet.dsidx`.

use std::path::{Path, PathBuf};

use tracing::instrument;

use docsetter_navigation::{NavNode, index_records, load_navigation};
use docsetter_shared::{DiagnosticSink, ErrorPolicy, Result};
use docsetter_storage::IndexStore;

/// Outcome of an index build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    /// The index file written.
    pub index_path: PathBuf,
    /// Rows inserted.
    pub records_added: usize,
    /// Records dropped because an identical row already existed.
    pub duplicates: usize,
}

/// Build the search index at `index_path` from the navigation file at
/// `nav_path`.
///
/// The navigation file is read and parsed before the index is touched, so a
/// missing file or an aborting malformed entry leaves any previous index in
/// place.
#[instrument(skip_all, fields(nav = %nav_path.display(), index = %index_path.display()))]
pub async fn build_index(
    nav_path: &Path,
    index_path: &Path,
    on_malformed: ErrorPolicy,
    sink: &dyn DiagnosticSink,
) -> Result<IndexReport> {
    let nodes = load_navigation(nav_path, on_malformed, sink)?;
    build_index_from_nodes(&nodes, index_path, sink).await
}

/// Reset the index at `index_path` and fill it from an already parsed tree.
pub async fn build_index_from_nodes(
    nodes: &[NavNode],
    index_path: &Path,
    sink: &dyn DiagnosticSink,
) -> Result<IndexReport> {
    let records = index_records(nodes, sink);
    let store = IndexStore::create(index_path).await?;

    let mut report = IndexReport {
        index_path: index_path.to_path_buf(),
        records_added: 0,
        duplicates: 0,
    };
    for record in &records {
        if store.insert(record).await? {
            sink.record_added(record);
            report.records_added += 1;
        } else {
            report.duplicates += 1;
        }
    }
    Ok(report)
}
