//! Docset bundle assembler.
//!
//! Takes a generator's built site directory and an optional navigation
//! description, then writes the final `<name>.docset` bundle to disk.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use docsetter_html::process_tree;
use docsetter_navigation::{NavNode, load_navigation};
use docsetter_shared::{DiagnosticSink, DocsetError, ErrorPolicy, Result, TreeConfig};
use docsetter_storage::IndexStore;

use crate::index::build_index_from_nodes;

/// Index file name inside `Contents/Resources/`.
pub const INDEX_FILE: &str = "docSet.dsidx";

/// Output from a successful docset assembly.
#[derive(Debug, Clone)]
pub struct AssembleResult {
    /// Path to the assembled `<name>.docset` directory.
    pub docset_path: PathBuf,
    /// Markup documents rewritten under `Documents/`.
    pub files_processed: usize,
    /// Link attributes changed.
    pub links_rewritten: usize,
    /// Dash anchors inserted.
    pub anchors_added: usize,
    /// Rows written to the search index.
    pub index_records: usize,
    /// Documents left untouched because they could not be decoded.
    pub skipped: Vec<PathBuf>,
}

/// Configuration for docset assembly.
#[derive(Debug, Clone)]
pub struct AssembleConfig {
    /// Docset name; also the bundle identifier and platform family.
    pub name: String,
    /// Built site to package.
    pub site_dir: PathBuf,
    /// Directory the bundle is created in.
    pub output_dir: PathBuf,
    /// Navigation description. Without one the index is created empty.
    pub nav: Option<PathBuf>,
    /// Markup pass settings.
    pub tree: TreeConfig,
    /// Policy for malformed navigation entries.
    pub on_malformed_entry: ErrorPolicy,
    /// Site-relative paths deleted from the copy.
    pub remove: Vec<String>,
    /// Copied to `icon.png`.
    pub icon: Option<PathBuf>,
    /// Copied to `icon@2x.png`.
    pub icon_2x: Option<PathBuf>,
}

impl AssembleConfig {
    /// Config with default policies, the default removal list and no icons.
    pub fn new(
        name: impl Into<String>,
        site_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            site_dir: site_dir.into(),
            output_dir: output_dir.into(),
            nav: None,
            tree: TreeConfig::default(),
            on_malformed_entry: ErrorPolicy::Skip,
            remove: vec!["search_content.json".into()],
            icon: None,
            icon_2x: None,
        }
    }

    /// Where the bundle will be written.
    pub fn docset_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.docset", self.name))
    }
}

/// Assemble a complete docset.
///
/// Creates the following layout:
/// ```text
/// <output_dir>/<name>.docset/
/// ├── icon.png         (when configured)
/// ├── icon@2x.png      (when configured)
/// └── Contents/
///     ├── Info.plist
///     └── Resources/
///         ├── docSet.dsidx
///         └── Documents/
/// ```
///
/// Inputs and the navigation description are checked before anything is
/// written. An existing bundle of the same name is replaced.
#[instrument(skip_all, fields(name = %config.name, site = %config.site_dir.display()))]
pub async fn assemble(
    config: &AssembleConfig,
    sink: &dyn DiagnosticSink,
) -> Result<AssembleResult> {
    validate_inputs(config)?;

    let nodes: Vec<NavNode> = match &config.nav {
        Some(nav) => {
            sink.phase("reading navigation");
            load_navigation(nav, config.on_malformed_entry, sink)?
        }
        None => Vec::new(),
    };

    let docset_dir = config.docset_path();
    info!(path = %docset_dir.display(), "assembling docset");

    let resources = docset_dir.join("Contents").join("Resources");
    let documents = resources.join("Documents");
    create_dirs(&docset_dir, &documents)?;

    sink.phase("copying site");
    let copied = copy_tree(&config.site_dir, &documents)?;
    debug!(files = copied, "site copied");
    remove_entries(&documents, &config.remove)?;

    sink.phase("rewriting documents");
    let tree = process_tree(&documents, &config.tree, sink)?;

    sink.phase("building index");
    let index = build_index_from_nodes(&nodes, &resources.join(INDEX_FILE), sink).await?;

    copy_icon(config.icon.as_deref(), &docset_dir.join("icon.png"))?;
    copy_icon(config.icon_2x.as_deref(), &docset_dir.join("icon@2x.png"))?;

    let plist_path = docset_dir.join("Contents").join("Info.plist");
    std::fs::write(&plist_path, info_plist(&config.name))
        .map_err(|e| DocsetError::io(&plist_path, e))?;

    info!(
        files = tree.files_written,
        records = index.records_added,
        path = %docset_dir.display(),
        "docset assembly complete"
    );

    Ok(AssembleResult {
        docset_path: docset_dir,
        files_processed: tree.files_written,
        links_rewritten: tree.links_rewritten,
        anchors_added: tree.anchors_added,
        index_records: index.records_added,
        skipped: tree.skipped,
    })
}

/// Verify that a docset directory is well-formed. Returns the number of
/// search index rows.
pub async fn validate_docset(docset_path: &Path) -> Result<usize> {
    let contents = docset_path.join("Contents");
    let plist_path = contents.join("Info.plist");
    let resources = contents.join("Resources");

    if !plist_path.is_file() {
        return Err(DocsetError::validation("missing Contents/Info.plist"));
    }
    if !resources.join("Documents").is_dir() {
        return Err(DocsetError::validation(
            "missing Contents/Resources/Documents/ directory",
        ));
    }
    let index_path = resources.join(INDEX_FILE);
    if !index_path.is_file() {
        return Err(DocsetError::validation(format!(
            "missing Contents/Resources/{INDEX_FILE}"
        )));
    }

    let plist =
        std::fs::read_to_string(&plist_path).map_err(|e| DocsetError::io(&plist_path, e))?;
    for key in ["CFBundleIdentifier", "DocSetPlatformFamily", "dashIndexFilePath"] {
        if !plist.contains(&format!("<key>{key}</key>")) {
            return Err(DocsetError::validation(format!(
                "Info.plist is missing {key}"
            )));
        }
    }

    IndexStore::open_readonly(&index_path).await?.count().await
}

/// Render `Info.plist` for a docset called `name`.
pub fn info_plist(name: &str) -> String {
    let name = xml_escape(name);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>CFBundleIdentifier</key>
	<string>{name}</string>
	<key>CFBundleName</key>
	<string>{name}</string>
	<key>DashDocSetFamily</key>
	<string>dashtoc</string>
	<key>DocSetPlatformFamily</key>
	<string>{name}</string>
	<key>dashIndexFilePath</key>
	<string>index.html</string>
	<key>isJavaScriptEnabled</key>
	<true/>
	<key>isDashDocset</key>
	<true/>
</dict>
</plist>
"#
    )
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_inputs(config: &AssembleConfig) -> Result<()> {
    let name = config.name.trim();
    if name.is_empty() || name != config.name {
        return Err(DocsetError::validation(
            "docset name must be non-empty without surrounding whitespace",
        ));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(DocsetError::validation(format!(
            "docset name {name:?} must not contain path separators"
        )));
    }

    if !config.site_dir.is_dir() {
        return Err(DocsetError::not_found(&config.site_dir));
    }
    for input in [&config.nav, &config.icon, &config.icon_2x]
        .into_iter()
        .flatten()
    {
        if !input.is_file() {
            return Err(DocsetError::not_found(input));
        }
    }

    for entry in &config.remove {
        let rel = Path::new(entry);
        if !rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(DocsetError::validation(format!(
                "removal entry {entry:?} must be relative to the site"
            )));
        }
    }

    let site = std::path::absolute(&config.site_dir)
        .map_err(|e| DocsetError::io(&config.site_dir, e))?;
    let docset = config.docset_path();
    let docset = std::path::absolute(&docset).map_err(|e| DocsetError::io(&docset, e))?;
    if docset.starts_with(&site) {
        return Err(DocsetError::validation(format!(
            "output {} lies inside the site directory",
            docset.display()
        )));
    }
    Ok(())
}

/// Recreate the bundle directory structure from scratch.
fn create_dirs(docset_dir: &Path, documents: &Path) -> Result<()> {
    if docset_dir.exists() {
        debug!(path = %docset_dir.display(), "removing previous docset");
        std::fs::remove_dir_all(docset_dir).map_err(|e| DocsetError::io(docset_dir, e))?;
    }
    std::fs::create_dir_all(documents).map_err(|e| DocsetError::io(documents, e))?;
    Ok(())
}

/// Copy every file under `from` into `to`, preserving relative paths.
fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(from).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            DocsetError::io(path, e.into())
        })?;
        let Ok(rel) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| DocsetError::io(&target, e))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| DocsetError::io(&target, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn remove_entries(documents: &Path, entries: &[String]) -> Result<()> {
    for entry in entries {
        let path = documents.join(entry);
        let outcome = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else if path.exists() {
            std::fs::remove_file(&path)
        } else {
            debug!(entry = %entry, "removal entry not present");
            continue;
        };
        outcome.map_err(|e| DocsetError::io(&path, e))?;
        debug!(entry = %entry, "removed from docset");
    }
    Ok(())
}

fn copy_icon(source: Option<&Path>, target: &Path) -> Result<()> {
    if let Some(source) = source {
        std::fs::copy(source, target).map_err(|e| DocsetError::io(target, e))?;
    }
    Ok(())
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use docsetter_shared::{IndexRecord, SilentDiagnostics};

    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// A small built site plus its navigation file, under `tmp/site`.
    fn make_site(tmp: &Path) -> AssembleConfig {
        let site = tmp.join("site");
        write(&site, "index.html", r#"<h1 id="home">Home</h1><a href="/guide/">guide</a>"#);
        write(
            &site,
            "guide/index.html",
            r#"<h2 id="setup">Set up</h2><img src="/img/logo.png">"#,
        );
        write(&site, "img/logo.png", "PNG");
        write(&site, "search_content.json", "{}");
        write(
            tmp,
            "mkdocs.yml",
            "nav:\n  - Home: index.md\n  - Guide: guide.md\n  - Draft **HIDDEN**: d.md\n",
        );

        let mut config = AssembleConfig::new("Demo", &site, tmp.join("out"));
        config.nav = Some(tmp.join("mkdocs.yml"));
        config
    }

    #[tokio::test]
    async fn assemble_creates_bundle_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let config = make_site(tmp.path());

        let result = assemble(&config, &SilentDiagnostics).await.expect("assemble");

        let docset = tmp.path().join("out/Demo.docset");
        assert_eq!(result.docset_path, docset);
        assert!(docset.join("Contents/Info.plist").is_file());
        assert!(docset.join("Contents/Resources/docSet.dsidx").is_file());
        assert!(docset.join("Contents/Resources/Documents/img/logo.png").is_file());
        assert!(!docset.join("Contents/Resources/Documents/search_content.json").exists());
        assert!(!docset.join("icon.png").exists());
    }

    #[tokio::test]
    async fn assemble_rewrites_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let config = make_site(tmp.path());

        let result = assemble(&config, &SilentDiagnostics).await.unwrap();

        assert_eq!(result.files_processed, 2);
        assert_eq!(result.links_rewritten, 2);
        assert_eq!(result.anchors_added, 2);

        let docs = result.docset_path.join("Contents/Resources/Documents");
        let guide = std::fs::read_to_string(docs.join("guide/index.html")).unwrap();
        assert!(guide.contains(
            "<a name=\"//apple_ref/cpp/Section/Set%20up\" class=\"dashAnchor\"></a>\n<h2 id=\"setup\">Set up</h2><img src=\"../img/logo.png\">"
        ));
        // The source site is never modified.
        let original = std::fs::read_to_string(tmp.path().join("site/guide/index.html")).unwrap();
        assert!(original.contains(r#"src="/img/logo.png""#));
    }

    #[tokio::test]
    async fn assemble_indexes_navigation() {
        let tmp = tempfile::tempdir().unwrap();
        let config = make_site(tmp.path());

        let result = assemble(&config, &SilentDiagnostics).await.unwrap();
        assert_eq!(result.index_records, 2);

        let store = IndexStore::open_readonly(
            &result.docset_path.join("Contents/Resources/docSet.dsidx"),
        )
        .await
        .unwrap();
        assert_eq!(
            store.records().await.unwrap(),
            vec![
                IndexRecord::guide("Home", "index.html"),
                IndexRecord::guide("Guide", "guide/index.html"),
            ]
        );
    }

    #[tokio::test]
    async fn assemble_without_nav_creates_empty_index() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = make_site(tmp.path());
        config.nav = None;

        let result = assemble(&config, &SilentDiagnostics).await.unwrap();

        assert_eq!(result.index_records, 0);
        assert_eq!(validate_docset(&result.docset_path).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn assemble_replaces_previous_bundle() {
        let tmp = tempfile::tempdir().unwrap();
        let config = make_site(tmp.path());
        let stale = config.docset_path().join("Contents/Resources/Documents/stale.html");
        write(stale.parent().unwrap(), "stale.html", "old");

        assemble(&config, &SilentDiagnostics).await.unwrap();
        let result = assemble(&config, &SilentDiagnostics).await.unwrap();

        assert!(!stale.exists());
        // Anchors are not duplicated across runs since each run starts from the site.
        let index = std::fs::read_to_string(
            result.docset_path.join("Contents/Resources/Documents/index.html"),
        )
        .unwrap();
        assert_eq!(index.matches("dashAnchor").count(), 1);
    }

    #[tokio::test]
    async fn assemble_copies_icons() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = make_site(tmp.path());
        write(tmp.path(), "assets/icon.png", "small");
        write(tmp.path(), "assets/icon@2x.png", "large");
        config.icon = Some(tmp.path().join("assets/icon.png"));
        config.icon_2x = Some(tmp.path().join("assets/icon@2x.png"));

        let result = assemble(&config, &SilentDiagnostics).await.unwrap();

        let read = |f: &str| std::fs::read_to_string(result.docset_path.join(f)).unwrap();
        assert_eq!(read("icon.png"), "small");
        assert_eq!(read("icon@2x.png"), "large");
    }

    #[tokio::test]
    async fn missing_inputs_fail_before_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = make_site(tmp.path());
        config.nav = Some(tmp.path().join("absent.yml"));

        let err = assemble(&config, &SilentDiagnostics).await.unwrap_err();
        assert!(matches!(err, DocsetError::NotFound { .. }));
        assert!(!config.docset_path().exists());

        let config = AssembleConfig::new("Demo", tmp.path().join("nosite"), tmp.path());
        let err = assemble(&config, &SilentDiagnostics).await.unwrap_err();
        assert!(matches!(err, DocsetError::NotFound { .. }));
    }

    #[tokio::test]
    async fn malformed_nav_aborts_before_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = make_site(tmp.path());
        write(tmp.path(), "mkdocs.yml", "nav:\n  - index.md\n");
        config.on_malformed_entry = ErrorPolicy::Abort;

        let err = assemble(&config, &SilentDiagnostics).await.unwrap_err();
        assert!(matches!(err, DocsetError::Navigation { .. }));
        assert!(!config.docset_path().exists());
    }

    #[tokio::test]
    async fn rejects_bad_names_and_nested_output() {
        let tmp = tempfile::tempdir().unwrap();
        let base = make_site(tmp.path());

        for name in ["", "a/b", "..", " padded"] {
            let config = AssembleConfig {
                name: name.into(),
                ..base.clone()
            };
            let err = assemble(&config, &SilentDiagnostics).await.unwrap_err();
            assert!(matches!(err, DocsetError::Validation { .. }), "{name:?}");
        }

        let config = AssembleConfig {
            output_dir: base.site_dir.join("build"),
            ..base.clone()
        };
        let err = assemble(&config, &SilentDiagnostics).await.unwrap_err();
        assert!(err.to_string().contains("inside the site"));

        let config = AssembleConfig {
            remove: vec!["../mkdocs.yml".into()],
            ..base
        };
        let err = assemble(&config, &SilentDiagnostics).await.unwrap_err();
        assert!(matches!(err, DocsetError::Validation { .. }));
        assert!(tmp.path().join("mkdocs.yml").exists());
    }

    #[test]
    fn info_plist_escapes_name() {
        let plist = info_plist("R&D <docs>");
        assert!(plist.contains("<string>R&amp;D &lt;docs&gt;</string>"));
        assert!(plist.contains("<key>DashDocSetFamily</key>\n\t<string>dashtoc</string>"));
        assert!(plist.contains("<key>isDashDocset</key>\n\t<true/>"));
        assert!(!plist.contains("R&D"));
    }

    #[tokio::test]
    async fn validate_docset_reports_missing_parts() {
        let tmp = tempfile::tempdir().unwrap();
        let config = make_site(tmp.path());
        let result = assemble(&config, &SilentDiagnostics).await.unwrap();

        assert_eq!(validate_docset(&result.docset_path).await.unwrap(), 2);

        std::fs::remove_file(result.docset_path.join("Contents/Info.plist")).unwrap();
        let err = validate_docset(&result.docset_path).await.unwrap_err();
        assert!(err.to_string().contains("Info.plist"));
    }
}
