use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{node::Element, ElementRef, Node};

use super::tags::TagCategory;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Collapse every whitespace run to a single space.
pub fn collapse_whitespace(text: &str) -> Cow<'_, str> {
    WHITESPACE_RE.replace_all(text, " ")
}

/// Whitespace-normalized, trimmed text of a subtree. `<br>` counts as a space.
pub fn plain_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&subtree_text(el, " ")).trim().to_string()
}

/// Raw text of a subtree, `<br>` replaced by `line_break`. Skipped tags
/// (scripts, styles) contribute nothing.
pub fn subtree_text(el: ElementRef<'_>, line_break: &str) -> String {
    let mut out = String::new();
    let mut stack: Vec<_> = el.children().collect();
    stack.reverse();
    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => match TagCategory::of(element.name()) {
                TagCategory::Skip => {}
                TagCategory::LineBreak => out.push_str(line_break),
                _ => {
                    let mut children: Vec<_> = node.children().collect();
                    children.reverse();
                    stack.extend(children);
                }
            },
            _ => {}
        }
    }
    out
}

/// Image URL of an image element: lazy-loaded `data-src` wins over `src`.
/// Only absolute http(s) sources count.
pub fn image_source(element: &Element) -> Option<&str> {
    let src = element
        .attr("data-src")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| element.attr("src").map(str::trim))?;
    if src.starts_with("http://") || src.starts_with("https://") {
        Some(src)
    } else {
        None
    }
}

/// True when the subtree holds at least one image with a usable source.
pub fn contains_image(el: ElementRef<'_>) -> bool {
    el.descendants().skip(1).any(|node| match node.value() {
        Node::Element(element) => {
            TagCategory::of(element.name()) == TagCategory::Image && image_source(element).is_some()
        }
        _ => false,
    })
}

pub fn has_line_break(el: ElementRef<'_>) -> bool {
    el.descendants().any(|node| {
        matches!(node.value(), Node::Element(element) if TagCategory::of(element.name()) == TagCategory::LineBreak)
    })
}
