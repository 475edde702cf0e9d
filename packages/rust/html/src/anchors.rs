//! Dash table-of-contents anchors.
//!
//! Every `<h1>`/`<h2>` carrying an `id` gets a
//! `<a name="//apple_ref/cpp/Section/…" class="dashAnchor"></a>` marker placed
//! right before it. The marker format is what the documentation browser scans
//! for, so it must not change.

use std::path::Path;
use std::sync::LazyLock;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;
use scraper::{Html, Node, Selector};

use docsetter_shared::Result;

use crate::Document;

const ANCHOR_PREFIX: &str = "//apple_ref/cpp/Section/";

/// Escapes all but unreserved characters and `/`.
const NAME_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

static SECTION_HEADINGS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1[id], h2[id]").expect("valid selector"));

/// Derive the encoded anchor name from a heading's text content.
pub fn anchor_name(heading_text: &str) -> String {
    static DISALLOWED_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9.()?',:; ]").expect("valid regex"));

    let cleaned = DISALLOWED_RE.replace_all(heading_text, "-");
    utf8_percent_encode(&cleaned, NAME_ESCAPE).to_string()
}

/// The marker inserted before a heading.
pub fn anchor_marker(encoded_name: &str) -> String {
    format!(r#"<a name="{ANCHOR_PREFIX}{encoded_name}" class="dashAnchor"></a>"#)
}

/// Insert a marker before every `h1`/`h2` that has an `id`.
///
/// Returns the updated document and the number of markers added. Running this
/// twice on the same document duplicates the markers.
pub fn inject_anchors(mut doc: Document) -> (Document, usize) {
    let sections: Vec<_> = doc
        .html()
        .select(&SECTION_HEADINGS)
        .map(|heading| ((*heading).id(), anchor_name(&heading.text().collect::<String>())))
        .collect();

    let html = doc.html_mut();
    for (id, name) in &sections {
        let nodes = marker_nodes(name);
        let Some(mut heading) = html.tree.get_mut(*id) else {
            continue;
        };
        for node in nodes {
            heading.insert_before(node);
        }
    }
    let added = sections.len();
    (doc, added)
}

/// Add anchors to the file at `path`, writing it back. Returns the count.
pub fn add_dash_anchors(path: &Path) -> Result<usize> {
    let doc = Document::read(path)?;
    let (doc, added) = inject_anchors(doc);
    doc.write()?;
    Ok(added)
}

/// The marker element followed by a newline, as detached tree nodes.
fn marker_nodes(encoded_name: &str) -> Vec<Node> {
    let fragment = Html::parse_fragment(&format!("{}\n", anchor_marker(encoded_name)));
    fragment
        .root_element()
        .children()
        .map(|child| child.value().clone())
        .collect()
}
