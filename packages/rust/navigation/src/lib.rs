//! Navigation description handling.
//!
//! A navigation description is an ordered list of `title: page` mappings where
//! a page may itself be a nested list. It is parsed into a [`NavNode`] tree and
//! flattened depth-first into the `Guide` records of the search index.
//!
//! Two title conventions are honored during flattening:
//! - titles containing [`HIDDEN_MARKER`] are left out of the index;
//! - titles containing [`BREADCRUMB_MARKER`] are sub-items, renamed to
//!   `<previous title> - <rest>`.
//!
//! External entries (`https://…`, `mailto:`) keep their URL as the path.

mod parse;

use std::sync::LazyLock;

use regex::{NoExpand, Regex};

use docsetter_shared::{DiagnosticSink, IndexRecord};

pub use parse::{load_navigation, parse_navigation};

/// Titles containing this are excluded from the index.
pub const HIDDEN_MARKER: &str = "**HIDDEN**";

/// Titles containing this are breadcrumb sub-items.
pub const BREADCRUMB_MARKER: &str = "&blacksquare;";

/// Source file name treated as a directory index.
const INDEX_SOURCE: &str = "index.md";

/// One navigation entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavNode {
    /// A titled page.
    Leaf { title: String, path: String },
    /// A titled section of further entries.
    Group {
        title: String,
        children: Vec<NavNode>,
    },
}

impl NavNode {
    pub fn title(&self) -> &str {
        match self {
            Self::Leaf { title, .. } | Self::Group { title, .. } => title,
        }
    }
}

/// Flatten `nodes` depth-first into `Guide` records, in navigation order.
///
/// Duplicates are kept; uniqueness is the store's concern.
pub fn index_records(nodes: &[NavNode], sink: &dyn DiagnosticSink) -> Vec<IndexRecord> {
    let mut records = Vec::new();
    flatten(nodes, String::new(), &mut records, sink);
    records
}

/// Walk `nodes`, starting from breadcrumb context `previous`, and return the
/// context in effect after the last node.
fn flatten(
    nodes: &[NavNode],
    mut previous: String,
    out: &mut Vec<IndexRecord>,
    sink: &dyn DiagnosticSink,
) -> String {
    for node in nodes {
        let title = node.title();
        if title.contains(HIDDEN_MARKER) {
            sink.entry_skipped(title, "hidden");
            continue;
        }

        match node {
            NavNode::Group { children, .. } => {
                if !title.contains(BREADCRUMB_MARKER) {
                    previous = title.to_string();
                }
                previous = flatten(children, previous, out, sink);
            }
            NavNode::Leaf { path, .. } => {
                let target = if is_external(path) {
                    path.clone()
                } else {
                    html_path(path)
                };
                let name = match breadcrumb_title(title, &previous) {
                    Some(composed) => composed,
                    None => {
                        previous = title.to_string();
                        title.to_string()
                    }
                };
                out.push(IndexRecord::guide(name, target));
            }
        }
    }
    previous
}

/// Compose `<previous> - <rest>` for a breadcrumb title, `None` otherwise.
///
/// Everything up to and including the last marker, an optional `&nbsp;` and
/// any whitespace after it is replaced.
pub fn breadcrumb_title(title: &str, previous: &str) -> Option<String> {
    static BREADCRUMB_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)^.*&blacksquare;(?:&nbsp;)?\s*").expect("valid regex")
    });

    if !title.contains(BREADCRUMB_MARKER) {
        return None;
    }
    let replacement = format!("{previous} - ");
    Some(BREADCRUMB_RE.replace(title, NoExpand(&replacement)).into_owned())
}

/// Map a source page path to the built page inside the docset.
///
/// `index.md` becomes `index.html` in place; any other page becomes a
/// directory index (`guide/setup.md` → `guide/setup/index.html`). Pages
/// without an extension follow the directory rule too.
pub fn html_path(page: &str) -> String {
    let (dir, file) = match page.rfind('/') {
        Some(i) => page.split_at(i + 1),
        None => ("", page),
    };
    if file == INDEX_SOURCE {
        return format!("{dir}index.html");
    }
    let stem = match file.rfind('.') {
        Some(i) if i > 0 => &file[..i],
        _ => file,
    };
    format!("{dir}{stem}/index.html")
}

fn is_external(path: &str) -> bool {
    path.contains("://") || path.starts_with("mailto:")
}
