//! Markup passes that turn a built documentation site into docset content.
//!
//! Each document is an explicit [`Document`] value flowing through pure stages:
//! [`Document::parse`] → [`rewrite_links`] → [`inject_anchors`] →
//! [`Document::serialize`]. [`process_tree`] and [`rewrite_tree`] apply the
//! stages to every matching file under a directory.
//!
//! Parsing goes through `scraper` (html5ever), so any text is accepted the way
//! a browser would accept it. Output is re-serialized from the parsed tree.

pub mod anchors;
pub mod links;
mod tree;

use std::path::{Path, PathBuf};

use scraper::Html;

use docsetter_shared::{DocsetError, Result};

pub use anchors::{add_dash_anchors, anchor_marker, anchor_name, inject_anchors};
pub use links::{LinkNormalizer, rewrite_links};
pub use tree::{RewriteReport, process_tree, rewrite_tree};

/// One markup file, identified by its path in the output tree.
#[derive(Debug)]
pub struct Document {
    path: PathBuf,
    html: Html,
}

impl Document {
    /// Parse `source` as the document at `path`.
    pub fn parse(path: impl Into<PathBuf>, source: &str) -> Self {
        Self {
            path: path.into(),
            html: Html::parse_document(source),
        }
    }

    /// Read and parse the file at `path`. Non-UTF-8 content is a parse error.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DocsetError::not_found(path));
        }
        let bytes = std::fs::read(path).map_err(|e| DocsetError::io(path, e))?;
        let source = String::from_utf8(bytes)
            .map_err(|e| DocsetError::parse(path, format!("not valid UTF-8: {e}")))?;
        Ok(Self::parse(path, &source))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn html_mut(&mut self) -> &mut Html {
        &mut self.html
    }

    pub fn serialize(&self) -> String {
        self.html.html()
    }

    /// Overwrite the file at [`Document::path`] with the serialized markup.
    pub fn write(&self) -> Result<()> {
        std::fs::write(&self.path, self.serialize()).map_err(|e| DocsetError::io(&self.path, e))
    }
}
