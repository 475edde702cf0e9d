//! Directory-wide application of the markup passes.

use std::path::{Path, PathBuf};

use tracing::instrument;
use walkdir::WalkDir;

use docsetter_shared::{DiagnosticSink, DocsetError, ErrorPolicy, Result, TreeConfig};

use crate::{Document, LinkNormalizer, inject_anchors, rewrite_links};

/// Outcome of a tree pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Documents re-serialized to disk.
    pub files_written: usize,
    /// Attribute values changed across all documents.
    pub links_rewritten: usize,
    /// Anchor markers inserted across all documents.
    pub anchors_added: usize,
    /// Documents left untouched under [`ErrorPolicy::Skip`].
    pub skipped: Vec<PathBuf>,
}

/// Rewrite links in every matching file under `root`, in place.
#[instrument(skip_all, fields(root = %root.display(), suffix = %config.suffix))]
pub fn rewrite_tree(
    root: &Path,
    config: &TreeConfig,
    sink: &dyn DiagnosticSink,
) -> Result<RewriteReport> {
    run(root, config, sink, false)
}

/// Rewrite links, then add dash anchors, in every matching file under `root`.
///
/// Each file is read and written once.
#[instrument(skip_all, fields(root = %root.display(), suffix = %config.suffix))]
pub fn process_tree(
    root: &Path,
    config: &TreeConfig,
    sink: &dyn DiagnosticSink,
) -> Result<RewriteReport> {
    run(root, config, sink, true)
}

fn run(
    root: &Path,
    config: &TreeConfig,
    sink: &dyn DiagnosticSink,
    with_anchors: bool,
) -> Result<RewriteReport> {
    if !root.is_dir() {
        return Err(DocsetError::not_found(root));
    }

    let files = collect_files(root, &config.suffix)?;
    let mut report = RewriteReport::default();

    // Decode everything up front: an aborting parse failure leaves the tree
    // untouched.
    let mut docs = Vec::with_capacity(files.len());
    for path in files {
        match Document::read(&path) {
            Ok(doc) => docs.push(doc),
            Err(err @ DocsetError::Parse { .. })
                if config.on_markup_error == ErrorPolicy::Skip =>
            {
                sink.file_skipped(&path, &err.to_string());
                report.skipped.push(path);
            }
            Err(err) => return Err(err),
        }
    }

    for doc in docs {
        let dir = doc.path().parent().unwrap_or(root).to_path_buf();
        let (doc, links) = rewrite_links(doc, &LinkNormalizer::new(&dir, root));
        let (doc, anchors) = if with_anchors {
            inject_anchors(doc)
        } else {
            (doc, 0)
        };
        doc.write()?;

        sink.file_rewritten(doc.path(), links);
        if with_anchors {
            sink.anchors_added(doc.path(), anchors);
        }
        report.files_written += 1;
        report.links_rewritten += links;
        report.anchors_added += anchors;
    }

    Ok(report)
}

/// All files under `root` whose name ends with `suffix`, in a stable order.
fn collect_files(root: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            DocsetError::io(path, e.into())
        })?;
        if entry.file_type().is_file() && entry.file_name().to_string_lossy().ends_with(suffix) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Collect {
        skipped: Mutex<Vec<String>>,
        rewritten: Mutex<Vec<(PathBuf, usize)>>,
    }

    impl DiagnosticSink for Collect {
        fn file_rewritten(&self, path: &Path, links_changed: usize) {
            self.rewritten
                .lock()
                .unwrap()
                .push((path.to_path_buf(), links_changed));
        }

        fn file_skipped(&self, _path: &Path, reason: &str) {
            self.skipped.lock().unwrap().push(reason.to_string());
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn read(root: &Path, rel: &str) -> String {
        std::fs::read_to_string(root.join(rel)).unwrap()
    }

    fn site() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path();
        write(root, "index.html", r#"<link href="/css/a.css"><a href="/guide/">g</a>"#);
        write(root, "guide/index.html", r#"<h1 id="guide">Guide</h1><a href="/">home</a>"#);
        write(root, "guide/deep/page.html", r#"<script src="//cdn/x.js"></script><img src="/i.png">"#);
        write(root, "css/a.css", "body { background: url(/i.png) }");
        tmp
    }

    const NOT_UTF8: &[u8] = &[b'<', b'p', b'>', 0xFF, 0xFE, b'<', b'/', b'p', b'>'];

    #[test]
    fn rewrite_tree_relativizes_by_depth() {
        let tmp = site();
        let root = tmp.path();
        let sink = Collect::default();

        let report = rewrite_tree(root, &TreeConfig::default(), &sink).expect("rewrite");

        assert_eq!(report.files_written, 3);
        assert_eq!(report.links_rewritten, 5);
        assert_eq!(report.anchors_added, 0);
        let index = read(root, "index.html");
        assert!(index.contains(r#"<link href="css/a.css">"#));
        assert!(index.contains(r#"<a href="guide/">g</a>"#));
        let guide = read(root, "guide/index.html");
        assert!(guide.contains(r#"<h1 id="guide">Guide</h1><a href="../">home</a>"#));
        let deep = read(root, "guide/deep/page.html");
        assert!(deep.contains(r#"<script src="https://cdn/x.js"></script>"#));
        assert!(deep.contains(r#"<img src="../../i.png">"#));
        assert_eq!(read(root, "css/a.css"), "body { background: url(/i.png) }");
        assert_eq!(sink.rewritten.lock().unwrap().len(), 3);
    }

    #[test]
    fn process_tree_adds_anchors_after_links() {
        let tmp = site();
        let root = tmp.path();

        let report = process_tree(root, &TreeConfig::default(), &docsetter_shared::SilentDiagnostics)
            .expect("process");

        assert_eq!(report.anchors_added, 1);
        assert!(read(root, "guide/index.html").contains(
            "<a name=\"//apple_ref/cpp/Section/Guide\" class=\"dashAnchor\"></a>\n<h1 id=\"guide\">Guide</h1><a href=\"../\">home</a>"
        ));
    }

    #[test]
    fn suffix_filter_is_respected() {
        let tmp = site();
        let root = tmp.path();
        write(root, "legacy.htm", r#"<a href="/x">x</a>"#);
        let config = TreeConfig {
            suffix: ".htm".into(),
            ..TreeConfig::default()
        };

        let report = rewrite_tree(root, &config, &docsetter_shared::SilentDiagnostics).unwrap();

        assert_eq!(report.files_written, 1);
        assert!(read(root, "legacy.htm").contains(r#"<a href="x">x</a>"#));
        assert_eq!(read(root, "index.html"), r#"<link href="/css/a.css"><a href="/guide/">g</a>"#);
    }

    #[test]
    fn broken_markup_is_rewritten_not_rejected() {
        let tmp = site();
        let root = tmp.path();
        write(root, "broken.html", r#"<p><a href="/x">x<div>unclosed"#);

        let report = rewrite_tree(root, &TreeConfig::default(), &docsetter_shared::SilentDiagnostics)
            .expect("rewrite");

        assert_eq!(report.files_written, 4);
        assert!(read(root, "broken.html").contains(r#"href="x""#));
    }

    #[test]
    fn abort_policy_leaves_tree_untouched() {
        let tmp = site();
        let root = tmp.path();
        std::fs::write(root.join("broken.html"), NOT_UTF8).unwrap();

        let err = rewrite_tree(root, &TreeConfig::default(), &docsetter_shared::SilentDiagnostics)
            .unwrap_err();

        assert!(matches!(err, DocsetError::Parse { .. }));
        assert_eq!(read(root, "index.html"), r#"<link href="/css/a.css"><a href="/guide/">g</a>"#);
    }

    #[test]
    fn skip_policy_reports_and_continues() {
        let tmp = site();
        let root = tmp.path();
        std::fs::write(root.join("broken.html"), NOT_UTF8).unwrap();
        let config = TreeConfig {
            on_markup_error: ErrorPolicy::Skip,
            ..TreeConfig::default()
        };
        let sink = Collect::default();

        let report = rewrite_tree(root, &config, &sink).expect("rewrite");

        assert_eq!(report.files_written, 3);
        assert_eq!(report.skipped, vec![root.join("broken.html")]);
        assert_eq!(std::fs::read(root.join("broken.html")).unwrap(), NOT_UTF8);
        assert_eq!(sink.skipped.lock().unwrap().len(), 1);
    }

    #[test]
    fn missing_root_is_not_found() {
        let err = rewrite_tree(
            Path::new("/definitely/not/here"),
            &TreeConfig::default(),
            &docsetter_shared::SilentDiagnostics,
        )
        .unwrap_err();
        assert!(matches!(err, DocsetError::NotFound { .. }));
    }
}
