//! YAML navigation description → [`NavNode`] tree.

use std::path::Path;

use serde_yaml::Value;
use tracing::instrument;

use docsetter_shared::{DiagnosticSink, DocsetError, ErrorPolicy, Result};

use crate::NavNode;

/// Top-level keys holding the navigation, in lookup order.
const NAV_KEYS: &[&str] = &["pages", "nav"];

/// Read and parse the navigation description at `path`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_navigation(
    path: &Path,
    on_malformed: ErrorPolicy,
    sink: &dyn DiagnosticSink,
) -> Result<Vec<NavNode>> {
    if !path.is_file() {
        return Err(DocsetError::not_found(path));
    }
    let content = std::fs::read_to_string(path).map_err(|e| DocsetError::io(path, e))?;
    parse_navigation(&content, on_malformed, sink)
}

/// Parse a navigation description.
///
/// An empty document, or one with neither a `pages` nor a `nav` key, yields
/// no nodes.
pub fn parse_navigation(
    yaml: &str,
    on_malformed: ErrorPolicy,
    sink: &dyn DiagnosticSink,
) -> Result<Vec<NavNode>> {
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }
    let root: Value = serde_yaml::from_str(yaml)
        .map_err(|e| DocsetError::navigation(format!("invalid YAML: {e}")))?;

    let Some(entries) = NAV_KEYS
        .iter()
        .filter_map(|key| root.get(*key))
        .find(|v| !is_empty(v))
    else {
        return Ok(Vec::new());
    };

    let Value::Sequence(entries) = entries else {
        return Err(DocsetError::navigation(
            "navigation must be a sequence of title/page mappings",
        ));
    };

    parse_entries(entries, on_malformed, sink)
}

fn parse_entries(
    entries: &[Value],
    on_malformed: ErrorPolicy,
    sink: &dyn DiagnosticSink,
) -> Result<Vec<NavNode>> {
    let mut nodes = Vec::with_capacity(entries.len());
    for entry in entries {
        match parse_entry(entry, on_malformed, sink)? {
            Ok(node) => nodes.push(node),
            Err(detail) => match on_malformed {
                ErrorPolicy::Skip => sink.entry_malformed(&detail),
                ErrorPolicy::Abort => return Err(DocsetError::navigation(detail)),
            },
        }
    }
    Ok(nodes)
}

/// Outer `Result` carries aborts from nested levels, inner `Err` describes a
/// malformed entry at this level.
fn parse_entry(
    entry: &Value,
    on_malformed: ErrorPolicy,
    sink: &dyn DiagnosticSink,
) -> Result<std::result::Result<NavNode, String>> {
    let Value::Mapping(mapping) = entry else {
        return Ok(Err(format!(
            "expected a single-key mapping, found {}",
            describe(entry)
        )));
    };
    if mapping.len() != 1 {
        return Ok(Err(format!(
            "expected a single-key mapping, found {} keys",
            mapping.len()
        )));
    }
    let Some((key, value)) = mapping.iter().next() else {
        return Ok(Err("empty mapping".to_string()));
    };
    let Some(title) = key.as_str() else {
        return Ok(Err(format!("title must be a string, found {}", describe(key))));
    };

    let node = match value {
        Value::String(path) => NavNode::Leaf {
            title: title.to_string(),
            path: path.clone(),
        },
        Value::Sequence(children) => NavNode::Group {
            title: title.to_string(),
            children: parse_entries(children, on_malformed, sink)?,
        },
        other => {
            return Ok(Err(format!(
                "'{title}': page must be a path or a list, found {}",
                describe(other)
            )));
        }
    };
    Ok(Ok(node))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Sequence(seq) => seq.is_empty(),
        _ => false,
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a bare string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
