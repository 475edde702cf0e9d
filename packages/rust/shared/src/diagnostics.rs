//! Diagnostic sink passed explicitly into the core components.
//!
//! Library code never configures or reaches into global logging. Callers pick a
//! sink: [`TracingDiagnostics`] forwards to `tracing`, [`SilentDiagnostics`]
//! drops everything, tests can collect events in their own implementation.

use std::path::Path;

use crate::types::IndexRecord;

/// Receiver for observable events emitted while building a docset.
pub trait DiagnosticSink: Send + Sync {
    /// A pipeline phase is starting.
    fn phase(&self, _name: &str) {}
    /// A document was re-serialized with `links_changed` rewritten values.
    fn file_rewritten(&self, _path: &Path, _links_changed: usize) {}
    /// Anchor markers were inserted into a document.
    fn anchors_added(&self, _path: &Path, _count: usize) {}
    /// A document was left untouched under the skip policy.
    fn file_skipped(&self, _path: &Path, _reason: &str) {}
    /// A navigation entry was deliberately left out of the index.
    fn entry_skipped(&self, _title: &str, _reason: &str) {}
    /// A navigation entry could not be interpreted as a title/page pair.
    fn entry_malformed(&self, _detail: &str) {}
    /// A record was handed to the index store.
    fn record_added(&self, _record: &IndexRecord) {}
}

/// No-op sink for headless/test usage.
pub struct SilentDiagnostics;

impl DiagnosticSink for SilentDiagnostics {}

/// Sink that forwards every event to `tracing`.
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn phase(&self, name: &str) {
        tracing::info!(phase = name, "starting phase");
    }

    fn file_rewritten(&self, path: &Path, links_changed: usize) {
        tracing::debug!(path = %path.display(), links_changed, "rewrote links");
    }

    fn anchors_added(&self, path: &Path, count: usize) {
        tracing::debug!(path = %path.display(), count, "added dash anchors");
    }

    fn file_skipped(&self, path: &Path, reason: &str) {
        tracing::warn!(path = %path.display(), reason, "skipped document");
    }

    fn entry_skipped(&self, title: &str, reason: &str) {
        tracing::debug!(title, reason, "skipped navigation entry");
    }

    fn entry_malformed(&self, detail: &str) {
        tracing::warn!(detail, "malformed navigation entry");
    }

    fn record_added(&self, record: &IndexRecord) {
        tracing::info!(
            name = %record.name,
            kind = %record.kind,
            path = %record.path,
            "added index entry"
        );
    }
}
