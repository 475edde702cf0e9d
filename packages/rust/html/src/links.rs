//! Absolute → relative link normalization.
//!
//! Protocol-relative links (`//host/x`) are upgraded to `https://host/x`;
//! site-absolute links (`/x`) are prefixed with the `../` chain leading from the
//! document back to the bundle root. Everything else is left alone.
//!
//! Links are found where a browser would load them from: link attributes,
//! `srcset` candidates, CSS `url(...)` and `@import` in `style` attributes and
//! `<style>` bodies, the target of a `<meta http-equiv="refresh">`, and the
//! markup inside `<noscript>`.

use std::borrow::Cow;
use std::path::{Component, Path};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::node::Element;
use scraper::{Html, Node};

use crate::Document;

/// Attributes whose whole value is a single URL.
const LINK_ATTRIBUTES: &[&str] = &[
    "action",
    "background",
    "cite",
    "classid",
    "codebase",
    "data",
    "dynsrc",
    "formaction",
    "href",
    "icon",
    "longdesc",
    "lowsrc",
    "manifest",
    "poster",
    "profile",
    "src",
    "usemap",
];

static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^\s'"()]*))\s*\)|@import\s+(?:"([^"]*)"|'([^']*)')"#,
    )
    .expect("valid regex")
});

static REFRESH_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\burl\s*=\s*['"]?([^'"\s;]+)"#).expect("valid regex"));

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("valid regex"));

/// Rewrites links for documents living in one directory of the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNormalizer {
    /// `../`-style path from the document directory to the bundle root,
    /// without a trailing slash. Empty at the root itself.
    prefix: String,
}

impl LinkNormalizer {
    /// Normalizer for a document located in `document_dir` of a bundle rooted
    /// at `bundle_root`. Purely lexical; nothing is read from disk.
    pub fn new(document_dir: &Path, bundle_root: &Path) -> Self {
        Self {
            prefix: relative_prefix(document_dir, bundle_root),
        }
    }

    /// Normalizer for a document `depth` directories below the root.
    pub fn at_depth(depth: usize) -> Self {
        Self {
            prefix: vec![".."; depth].join("/"),
        }
    }

    /// The prefix prepended to site-absolute links.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Normalize a single link.
    pub fn normalize<'a>(&self, link: &'a str) -> Cow<'a, str> {
        if link.starts_with("//") {
            Cow::Owned(format!("https:{link}"))
        } else if link.starts_with('/') {
            if !self.prefix.is_empty() {
                Cow::Owned(format!("{}{link}", self.prefix))
            } else if link.len() > 1 {
                Cow::Borrowed(&link[1..])
            } else {
                // "/" from the root document: the root directory itself.
                Cow::Borrowed("./")
            }
        } else {
            Cow::Borrowed(link)
        }
    }

    /// Normalize every candidate URL of a `srcset` value, keeping descriptors.
    pub fn normalize_srcset<'a>(&self, srcset: &'a str) -> Cow<'a, str> {
        if !srcset.split(',').any(|c| c.trim_start().starts_with('/')) {
            return Cow::Borrowed(srcset);
        }
        let candidates: Vec<String> = srcset
            .split(',')
            .map(|candidate| {
                let trimmed = candidate.trim_start();
                let lead = &candidate[..candidate.len() - trimmed.len()];
                let url_end = trimmed
                    .find(|c: char| c.is_ascii_whitespace())
                    .unwrap_or(trimmed.len());
                let (url, descriptor) = trimmed.split_at(url_end);
                format!("{lead}{}{descriptor}", self.normalize(url))
            })
            .collect();
        Cow::Owned(candidates.join(","))
    }

    /// Normalize `url(...)` references and `@import` strings in CSS text.
    pub fn normalize_css<'a>(&self, css: &'a str) -> Cow<'a, str> {
        let rewritten = CSS_URL_RE.replace_all(css, |caps: &Captures| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            match (1..=5).find_map(|i| caps.get(i)) {
                Some(url) => {
                    let offset = caps.get(0).map_or(0, |m| m.start());
                    let (start, end) = (url.start() - offset, url.end() - offset);
                    format!(
                        "{}{}{}",
                        &whole[..start],
                        self.normalize(url.as_str()),
                        &whole[end..]
                    )
                }
                None => whole.to_string(),
            }
        });
        unchanged_as_borrowed(css, rewritten)
    }

    /// Normalize the target of a refresh `content` value (`0; url=/moved/`).
    pub fn normalize_refresh<'a>(&self, content: &'a str) -> Cow<'a, str> {
        let rewritten = REFRESH_URL_RE.replacen(content, 1, |caps: &Captures| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            match caps.get(1) {
                Some(url) => {
                    let start = url.start() - caps.get(0).map_or(0, |m| m.start());
                    format!("{}{}", &whole[..start], self.normalize(url.as_str()))
                }
                None => whole.to_string(),
            }
        });
        unchanged_as_borrowed(content, rewritten)
    }

    /// Normalize each whitespace-separated URL of a list value (`archive`).
    pub fn normalize_list<'a>(&self, list: &'a str) -> Cow<'a, str> {
        let rewritten =
            TOKEN_RE.replace_all(list, |caps: &Captures| self.normalize(&caps[0]).into_owned());
        unchanged_as_borrowed(list, rewritten)
    }

    /// Rewrite the link attributes of one element. Returns the number of
    /// values changed.
    fn rewrite_element(&self, element: &mut Element) -> usize {
        let is_refresh = element.name() == "meta"
            && element
                .attr("http-equiv")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"));

        let mut changed = 0;
        for (name, value) in element.attrs.iter_mut() {
            let current: &str = value;
            let rewritten = match &*name.local {
                "srcset" => self.normalize_srcset(current),
                "style" => self.normalize_css(current),
                "archive" => self.normalize_list(current),
                "content" if is_refresh => self.normalize_refresh(current),
                attr if LINK_ATTRIBUTES.contains(&attr) => self.normalize(current),
                _ => continue,
            };
            let new = match rewritten {
                Cow::Owned(new) => new,
                Cow::Borrowed(new) if new != current => new.to_string(),
                Cow::Borrowed(_) => continue,
            };
            *value = new.into();
            changed += 1;
        }
        changed
    }

    /// Rewrite a markup fragment held as raw text (a `<noscript>` body).
    fn rewrite_fragment(&self, markup: &str) -> Option<(String, usize)> {
        let mut fragment = Html::parse_fragment(markup);
        let changed = rewrite_html(&mut fragment, self);
        (changed > 0).then(|| (fragment.root_element().inner_html(), changed))
    }
}

/// Rewrite every link of `doc`.
///
/// Returns the updated document and the number of values changed.
pub fn rewrite_links(mut doc: Document, normalizer: &LinkNormalizer) -> (Document, usize) {
    let changed = rewrite_html(doc.html_mut(), normalizer);
    (doc, changed)
}

/// What a node holds, as far as link rewriting is concerned.
enum Target {
    Element,
    StyleText,
    NoscriptText,
}

fn rewrite_html(html: &mut Html, normalizer: &LinkNormalizer) -> usize {
    let targets: Vec<_> = html
        .tree
        .nodes()
        .filter_map(|node| {
            let target = match node.value() {
                Node::Element(_) => Target::Element,
                Node::Text(_) => match node.parent()?.value() {
                    Node::Element(parent) if parent.name() == "style" => Target::StyleText,
                    Node::Element(parent) if parent.name() == "noscript" => Target::NoscriptText,
                    _ => return None,
                },
                _ => return None,
            };
            Some((node.id(), target))
        })
        .collect();

    let mut changed = 0;
    for (id, target) in targets {
        let Some(mut node) = html.tree.get_mut(id) else {
            continue;
        };
        match (node.value(), target) {
            (Node::Element(element), Target::Element) => {
                changed += normalizer.rewrite_element(element);
            }
            (Node::Text(text), Target::StyleText) => {
                let css = match normalizer.normalize_css(&text.text) {
                    Cow::Owned(css) => css,
                    Cow::Borrowed(_) => continue,
                };
                text.text = css.into();
                changed += 1;
            }
            (Node::Text(text), Target::NoscriptText) => {
                if let Some((markup, count)) = normalizer.rewrite_fragment(&text.text) {
                    text.text = markup.into();
                    changed += count;
                }
            }
            _ => {}
        }
    }
    changed
}

fn unchanged_as_borrowed<'a>(original: &'a str, rewritten: Cow<'a, str>) -> Cow<'a, str> {
    match rewritten {
        Cow::Owned(new) if new != original => Cow::Owned(new),
        _ => Cow::Borrowed(original),
    }
}

/// Lexical relative path from `from_dir` to `to_dir`, `/`-separated.
fn relative_prefix(from_dir: &Path, to_dir: &Path) -> String {
    let from: Vec<Component> = from_dir
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let to: Vec<Component> = to_dir
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(src: &str, depth: usize) -> (String, usize) {
        let doc = Document::parse("site/page.html", src);
        let (doc, changed) = rewrite_links(doc, &LinkNormalizer::at_depth(depth));
        (doc.serialize(), changed)
    }

    #[test]
    fn protocol_relative_links_get_https() {
        let n = LinkNormalizer::at_depth(3);
        assert_eq!(n.normalize("//cdn.example.com/x.js"), "https://cdn.example.com/x.js");
        assert_eq!(n.normalize("//"), "https://");
    }

    #[test]
    fn non_slash_links_pass_through() {
        let n = LinkNormalizer::at_depth(2);
        for link in [
            "mailto:me@example.com",
            "#section",
            "../sibling/",
            "img/a.png",
            "https://example.com/",
            "",
        ] {
            assert!(matches!(n.normalize(link), Cow::Borrowed(l) if l == link));
        }
    }

    #[test]
    fn absolute_links_at_root_lose_the_slash() {
        let n = LinkNormalizer::new(Path::new("site"), Path::new("site"));
        assert_eq!(n.prefix(), "");
        assert_eq!(n.normalize("/a/b"), "a/b");
        assert_eq!(n.normalize("/"), "./");
    }

    #[test]
    fn absolute_links_two_levels_down() {
        let n = LinkNormalizer::new(Path::new("site/guide/install"), Path::new("site"));
        assert_eq!(n.prefix(), "../..");
        assert_eq!(n.normalize("/a/b"), "../../a/b");
        assert_eq!(n.normalize("/css/theme.css?v=2#x"), "../../css/theme.css?v=2#x");
    }

    #[test]
    fn prefix_ignores_current_dir_components() {
        let n = LinkNormalizer::new(Path::new("./site/./api"), Path::new("site"));
        assert_eq!(n.prefix(), "..");
        assert_eq!(n, LinkNormalizer::at_depth(1));
    }

    #[test]
    fn srcset_candidates_are_rewritten_individually() {
        let n = LinkNormalizer::at_depth(1);
        assert_eq!(
            n.normalize_srcset("/img/a.png 1x, img/b.png 2x,//cdn/c.png 3x"),
            "../img/a.png 1x, img/b.png 2x,https://cdn/c.png 3x"
        );
        assert!(matches!(n.normalize_srcset("a.png 1x"), Cow::Borrowed(_)));
    }

    #[test]
    fn css_urls_and_imports_are_rewritten() {
        let n = LinkNormalizer::at_depth(1);
        assert_eq!(
            n.normalize_css(r#"a { background: url(/bg.png) } b { src: url( "/f.woff" ) }"#),
            r#"a { background: url(../bg.png) } b { src: url( "../f.woff" ) }"#
        );
        assert_eq!(
            n.normalize_css(r#"@import "/theme.css"; @import url('//cdn/x.css');"#),
            r#"@import "../theme.css"; @import url('https://cdn/x.css');"#
        );
        assert!(matches!(n.normalize_css("x { background: url(img/a.png) }"), Cow::Borrowed(_)));
    }

    #[test]
    fn refresh_target_is_rewritten() {
        let n = LinkNormalizer::at_depth(2);
        assert_eq!(n.normalize_refresh("0; url=/moved/"), "0; url=../../moved/");
        assert_eq!(n.normalize_refresh("5;URL='/x.html'"), "5;URL='../../x.html'");
        assert!(matches!(n.normalize_refresh("30"), Cow::Borrowed(_)));
    }

    #[test]
    fn archive_lists_are_rewritten_per_entry() {
        let n = LinkNormalizer::at_depth(1);
        assert_eq!(n.normalize_list("/a.jar  lib/b.jar /c.jar"), "../a.jar  lib/b.jar ../c.jar");
    }

    #[test]
    fn rewrite_links_touches_only_link_attributes() {
        let src = r##"<a href="/guide/" title="/not-a-link">G</a><img src="//cdn/x.png" srcset="/a.png 2x"><a href="#top">t</a>"##;
        let (html, changed) = rewrite(src, 1);
        assert_eq!(changed, 3);
        assert!(html.contains(r#"<a href="../guide/" title="/not-a-link">G</a>"#));
        assert!(html.contains(r#"<img src="https://cdn/x.png" srcset="../a.png 2x">"#));
        assert!(html.contains(r##"<a href="#top">t</a>"##));
    }

    #[test]
    fn legacy_link_attributes_are_rewritten() {
        let src = r#"<img lowsrc="/lo.png" dynsrc="/clip.avi"><object classid="/obj" archive="/a.jar /b.jar" data="/d.bin"></object>"#;
        let (html, changed) = rewrite(src, 1);
        assert_eq!(changed, 5);
        for expected in [
            r#"lowsrc="../lo.png""#,
            r#"dynsrc="../clip.avi""#,
            r#"classid="../obj""#,
            r#"archive="../a.jar ../b.jar""#,
            r#"data="../d.bin""#,
        ] {
            assert!(html.contains(expected), "{expected} in {html}");
        }
    }

    #[test]
    fn noscript_and_inline_styles_are_rewritten() {
        let src = r#"<noscript><img src="/img/a.png"></noscript><div style="background:url(/bg.png)">x</div>"#;
        let (html, changed) = rewrite(src, 1);
        assert_eq!(changed, 2);
        assert!(html.contains(r#"<img src="../img/a.png">"#), "{html}");
        assert!(html.contains(r#"style="background:url(../bg.png)""#), "{html}");
    }

    #[test]
    fn style_bodies_are_rewritten() {
        let src = "<html><head><style>body { background: url('/bg.png') }</style></head><body></body></html>";
        let (html, changed) = rewrite(src, 2);
        assert_eq!(changed, 1);
        assert!(html.contains("<style>body { background: url('../../bg.png') }</style>"));
    }

    #[test]
    fn meta_refresh_target_is_rewritten() {
        let src = r#"<head><meta http-equiv="refresh" content="0; url=/moved/"><meta name="description" content="/not-a-link"></head>"#;
        let (html, changed) = rewrite(src, 1);
        assert_eq!(changed, 1);
        assert!(html.contains(r#"content="0; url=../moved/""#));
        assert!(html.contains(r#"content="/not-a-link""#));
    }

    #[test]
    fn entities_in_values_survive_rewriting() {
        let (html, changed) = rewrite(r#"<a href="/search?q=a&amp;page=2">s</a>"#, 1);
        assert_eq!(changed, 1);
        assert!(html.contains(r#"href="../search?q=a&amp;page=2""#));
    }
}
