pub mod blocks;
pub mod code;
pub mod runs;
pub mod style;
pub mod tags;
pub mod text;

use std::collections::HashMap;
use std::mem;

use scraper::{ElementRef, Html, Node};
use tracing::{debug, warn};

use crate::error::MarkupError;
use crate::images::ImageResolver;
use blocks::{ContentBlock, InlineRun};
use style::StyleContext;
use tags::TagCategory;

pub use blocks::BlockKind;
pub use runs::DEFAULT_MERGE_THRESHOLD;

/// Nesting beyond this is treated as malformed markup. The walk recurses per
/// level, so this also bounds its stack use.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeOptions {
    pub merge_threshold: usize,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        TranscodeOptions {
            merge_threshold: DEFAULT_MERGE_THRESHOLD,
        }
    }
}

/// Transcribe an HTML fragment with a plain original → hosted URL map.
pub fn transcribe(html: &str, image_map: &HashMap<String, String>) -> Vec<ContentBlock> {
    Transcoder::new(image_map).transcribe(html)
}

/// Result of walking one subtree.
///
/// `leading` runs continue the caller's pending buffer, `blocks` are closed
/// off, `trailing` runs are still pending after the last block. `trailing`
/// is only non-empty when `blocks` is.
#[derive(Debug, Default)]
struct Walk {
    leading: Vec<InlineRun>,
    blocks: Vec<ContentBlock>,
    trailing: Vec<InlineRun>,
}

impl Walk {
    fn closed(blocks: Vec<ContentBlock>) -> Self {
        Walk {
            blocks,
            ..Walk::default()
        }
    }

    fn push_run(&mut self, run: InlineRun) {
        if self.blocks.is_empty() {
            self.leading.push(run);
        } else {
            self.trailing.push(run);
        }
    }

    /// Pending runs after the last block become their own block. Leading runs
    /// stay put: they belong to the caller's buffer.
    fn close_pending(&mut self) {
        if self.blocks.is_empty() {
            return;
        }
        if let Some(block) = runs::flush(mem::take(&mut self.trailing)) {
            self.blocks.push(block);
        }
    }

    fn push_block(&mut self, block: ContentBlock) {
        self.close_pending();
        self.blocks.push(block);
    }

    fn append(&mut self, child: Walk) {
        for run in child.leading {
            self.push_run(run);
        }
        if child.blocks.is_empty() {
            return;
        }
        self.close_pending();
        self.blocks.extend(child.blocks);
        self.trailing = child.trailing;
    }

    /// Flush everything: the end of a block container.
    fn finish(self) -> Vec<ContentBlock> {
        let mut out = Vec::with_capacity(self.blocks.len() + 2);
        out.extend(runs::flush(self.leading));
        out.extend(self.blocks);
        out.extend(runs::flush(self.trailing));
        out
    }
}

/// Walks a parsed DOM and emits content blocks in document order.
pub struct Transcoder<'r, R: ImageResolver + ?Sized> {
    resolver: &'r R,
    options: TranscodeOptions,
}

impl<'r, R: ImageResolver + ?Sized> Transcoder<'r, R> {
    pub fn new(resolver: &'r R) -> Self {
        Transcoder {
            resolver,
            options: TranscodeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TranscodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Never fails: malformed markup degrades to a single plain text block,
    /// or nothing when no text is recoverable.
    pub fn transcribe(&self, html: &str) -> Vec<ContentBlock> {
        if html.trim().is_empty() {
            return Vec::new();
        }
        let document = Html::parse_fragment(html);
        let root = document.root_element();
        match self.walk_element(root, StyleContext::default(), 0) {
            Ok(walk) => runs::merge_plain_text(walk.finish(), self.options.merge_threshold),
            Err(err) => {
                warn!("Markup walk failed ({}), falling back to plain text", err);
                recover_plain_text(root)
            }
        }
    }

    fn walk_element(
        &self,
        el: ElementRef<'_>,
        style: StyleContext,
        depth: usize,
    ) -> Result<Walk, MarkupError> {
        if depth > MAX_DEPTH {
            return Err(MarkupError::TooDeep { limit: MAX_DEPTH });
        }

        match TagCategory::of(el.value().name()) {
            TagCategory::Skip | TagCategory::LineBreak => Ok(Walk::default()),
            TagCategory::Divider => Ok(Walk::closed(vec![ContentBlock::Divider])),
            TagCategory::Image => Ok(Walk::closed(self.image_block(el).into_iter().collect())),

            // ── Headings: media inside a heading demotes it to rich text ──
            TagCategory::Heading(level) => {
                if text::contains_image(el) {
                    return Ok(Walk::closed(self.walk_children(el, style, depth)?.finish()));
                }
                let content = text::plain_text(el);
                if content.is_empty() {
                    return Ok(Walk::default());
                }
                Ok(Walk::closed(vec![ContentBlock::Heading { level, content }]))
            }

            TagCategory::Container => Ok(Walk::closed(self.walk_children(el, style, depth)?.finish())),
            TagCategory::Inline(inline) => self.walk_children(el, style.derive(inline), depth),
            TagCategory::List { ordered } => self.walk_list(el, ordered, depth),
            TagCategory::ListItem => Ok(Walk::closed(self.list_item(el, false, depth)?)),

            TagCategory::Preformatted => {
                let content = code::preformatted_text(el);
                if content.trim().is_empty() {
                    return Ok(Walk::default());
                }
                Ok(Walk::closed(vec![ContentBlock::Code { content }]))
            }

            TagCategory::Quote => {
                let (text, media) = self.split_text_and_media(el, false, depth)?;
                let mut blocks = Vec::new();
                if !text.is_empty() {
                    blocks.push(ContentBlock::Quote { content: text });
                }
                blocks.extend(self.walk_detached(media, depth)?);
                Ok(Walk::closed(blocks))
            }

            TagCategory::Unknown => self.walk_children(el, style, depth),
        }
    }

    fn walk_children(
        &self,
        el: ElementRef<'_>,
        style: StyleContext,
        depth: usize,
    ) -> Result<Walk, MarkupError> {
        let mut walk = Walk::default();
        for child in el.children() {
            match child.value() {
                Node::Text(text) => {
                    if let Some(run) = runs::text_run(text, style) {
                        walk.push_run(run);
                    }
                }
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        let child_walk = self.walk_element(child_el, style, depth + 1)?;
                        walk.append(child_walk);
                    }
                }
                _ => {}
            }
        }
        Ok(walk)
    }

    fn image_block(&self, el: ElementRef<'_>) -> Option<ContentBlock> {
        let Some(src) = text::image_source(el.value()) else {
            debug!("Skipping image without usable source");
            return None;
        };
        let image_url = self
            .resolver
            .resolve(src)
            .unwrap_or_else(|| src.to_string());
        Some(ContentBlock::Image { image_url })
    }

    /// Items become blocks of their own; loose text and stray inline tags
    /// between them flush as text blocks in order.
    fn walk_list(&self, el: ElementRef<'_>, ordered: bool, depth: usize) -> Result<Walk, MarkupError> {
        let mut walk = Walk::default();
        for child in el.children() {
            match child.value() {
                Node::Text(text) => {
                    if let Some(run) = runs::text_run(text, StyleContext::default()) {
                        walk.push_run(run);
                    }
                }
                Node::Element(element) => {
                    let Some(child_el) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if TagCategory::of(element.name()) == TagCategory::ListItem {
                        for block in self.list_item(child_el, ordered, depth + 1)? {
                            walk.push_block(block);
                        }
                    } else {
                        walk.append(self.walk_element(child_el, StyleContext::default(), depth + 1)?);
                    }
                }
                _ => {}
            }
        }
        Ok(Walk::closed(walk.finish()))
    }

    /// One item plus whatever it nests: sub-lists and images follow the item.
    fn list_item(
        &self,
        li: ElementRef<'_>,
        ordered: bool,
        depth: usize,
    ) -> Result<Vec<ContentBlock>, MarkupError> {
        let (content, nested) = self.split_text_and_media(li, true, depth)?;
        let mut blocks = Vec::new();
        if !content.is_empty() {
            blocks.push(ContentBlock::ListItem { content, ordered });
        }
        blocks.extend(self.walk_detached(nested, depth)?);
        Ok(blocks)
    }

    fn walk_detached<'a>(
        &self,
        elements: Vec<ElementRef<'a>>,
        depth: usize,
    ) -> Result<Vec<ContentBlock>, MarkupError> {
        let mut blocks = Vec::new();
        for el in elements {
            blocks.extend(
                self.walk_element(el, StyleContext::default(), depth + 1)?
                    .finish(),
            );
        }
        Ok(blocks)
    }

    /// Normalized text of a subtree, leaving out images (and nested lists when
    /// `detach_lists` is set), which are returned in document order instead.
    fn split_text_and_media<'a>(
        &self,
        el: ElementRef<'a>,
        detach_lists: bool,
        depth: usize,
    ) -> Result<(String, Vec<ElementRef<'a>>), MarkupError> {
        let mut raw = String::new();
        let mut detached = Vec::new();
        collect_text_and_media(el, detach_lists, depth, &mut raw, &mut detached)?;
        let text = text::collapse_whitespace(&raw).trim().to_string();
        Ok((text, detached))
    }
}

fn collect_text_and_media<'a>(
    el: ElementRef<'a>,
    detach_lists: bool,
    depth: usize,
    raw: &mut String,
    detached: &mut Vec<ElementRef<'a>>,
) -> Result<(), MarkupError> {
    if depth > MAX_DEPTH {
        return Err(MarkupError::TooDeep { limit: MAX_DEPTH });
    }
    for child in el.children() {
        match child.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(element) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                match TagCategory::of(element.name()) {
                    TagCategory::Skip => {}
                    TagCategory::LineBreak => raw.push(' '),
                    TagCategory::Image => detached.push(child_el),
                    TagCategory::List { .. } if detach_lists => detached.push(child_el),
                    _ => collect_text_and_media(child_el, detach_lists, depth + 1, raw, detached)?,
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Last-resort extraction: the fragment's text as one block. Skipped tags
/// stay skipped.
fn recover_plain_text(root: ElementRef<'_>) -> Vec<ContentBlock> {
    let content = text::plain_text(root);
    if content.is_empty() {
        Vec::new()
    } else {
        vec![ContentBlock::text(content)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(html: &str) -> Vec<ContentBlock> {
        transcribe(html, &HashMap::new())
    }

    fn run(text: &str, bold: bool, italic: bool) -> InlineRun {
        InlineRun {
            text: text.into(),
            bold,
            italic,
        }
    }

    fn visible_text(blocks: &[ContentBlock]) -> String {
        blocks
            .iter()
            .filter_map(ContentBlock::content)
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn paragraph_with_bold_run() {
        let out = blocks("<p>Hello <strong>world</strong></p>");
        assert_eq!(
            out,
            vec![ContentBlock::Text {
                content: "Hello world".into(),
                inline_runs: vec![run("Hello ", false, false), run("world", true, false)],
            }]
        );
    }

    #[test]
    fn heading_with_image_becomes_text_and_image() {
        let mut map = HashMap::new();
        map.insert("http://x/a.png".to_string(), "http://cdn/a.png".to_string());
        let out = transcribe(r#"<h2>Title <img src="http://x/a.png"></h2>"#, &map);
        assert_eq!(
            out,
            vec![
                ContentBlock::text("Title"),
                ContentBlock::Image {
                    image_url: "http://cdn/a.png".into()
                },
            ]
        );
    }

    #[test]
    fn image_without_source_yields_nothing() {
        assert!(blocks("<div><img></div>").is_empty());
    }

    #[test]
    fn plain_heading() {
        let out = blocks("<h3>  Getting   started </h3>");
        assert_eq!(
            out,
            vec![ContentBlock::Heading {
                level: 3,
                content: "Getting started".into()
            }]
        );
    }

    #[test]
    fn image_splits_text() {
        let out = blocks(
            r#"<p>Before the picture <img src="https://x/p.jpg"> after the picture</p>"#,
        );
        assert_eq!(
            out,
            vec![
                ContentBlock::text("Before the picture"),
                ContentBlock::Image {
                    image_url: "https://x/p.jpg".into()
                },
                ContentBlock::text("after the picture"),
            ]
        );
    }

    #[test]
    fn image_inside_inline_tag_keeps_surrounding_runs_together() {
        let out = blocks(r#"<p>Hello <b>bold <img src="https://x/p.jpg"> after</b> end</p>"#);
        assert_eq!(out.len(), 3);
        assert_eq!(
            out[0],
            ContentBlock::Text {
                content: "Hello bold".into(),
                inline_runs: vec![run("Hello ", false, false), run("bold", true, false)],
            }
        );
        assert!(matches!(&out[1], ContentBlock::Image { image_url } if image_url == "https://x/p.jpg"));
        assert_eq!(
            out[2],
            ContentBlock::Text {
                content: "after end".into(),
                inline_runs: vec![run("after", true, false), run(" end", false, false)],
            }
        );
    }

    #[test]
    fn nested_styles_combine() {
        let out = blocks("<p><b>both <i>styles</i></b></p>");
        assert_eq!(
            out,
            vec![ContentBlock::Text {
                content: "both styles".into(),
                inline_runs: vec![run("both ", true, false), run("styles", true, true)],
            }]
        );
    }

    #[test]
    fn style_does_not_leak_to_siblings() {
        let out = blocks("<p><b>bold</b> plain <i>it</i></p>");
        match &out[0] {
            ContentBlock::Text { inline_runs, .. } => {
                assert_eq!(
                    inline_runs,
                    &vec![
                        run("bold", true, false),
                        run(" plain ", false, false),
                        run("it", false, true),
                    ]
                );
            }
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn short_paragraphs_merge() {
        let out = blocks("<p>First.</p><p>Second.</p>");
        assert_eq!(out, vec![ContentBlock::text("First. Second.")]);
    }

    #[test]
    fn styled_paragraph_does_not_merge_with_plain() {
        let out = blocks("<p>Plain.</p><p><em>Styled.</em></p><p>Plain again.</p>");
        assert_eq!(out.len(), 3);
        assert!(out[0].is_plain_text());
        assert!(!out[1].is_plain_text());
        assert!(out[2].is_plain_text());
    }

    #[test]
    fn lists_emit_items() {
        let out = blocks("<ol><li>one</li><li>two</li></ol><ul><li>dot</li></ul>");
        assert_eq!(
            out,
            vec![
                ContentBlock::ListItem {
                    content: "one".into(),
                    ordered: true
                },
                ContentBlock::ListItem {
                    content: "two".into(),
                    ordered: true
                },
                ContentBlock::ListItem {
                    content: "dot".into(),
                    ordered: false
                },
            ]
        );
    }

    #[test]
    fn nested_list_follows_parent_item() {
        let out = blocks("<ul><li>parent<ol><li>child</li></ol></li><li>next</li></ul>");
        assert_eq!(
            out,
            vec![
                ContentBlock::ListItem {
                    content: "parent".into(),
                    ordered: false
                },
                ContentBlock::ListItem {
                    content: "child".into(),
                    ordered: true
                },
                ContentBlock::ListItem {
                    content: "next".into(),
                    ordered: false
                },
            ]
        );
    }

    #[test]
    fn list_items_do_not_merge_with_text() {
        let out = blocks("<p>Intro</p><ul><li>item</li></ul><p>Outro</p>");
        assert_eq!(out.len(), 3);
        assert_eq!(out[1].kind(), BlockKind::ListItem);
    }

    #[test]
    fn quote_divider_and_code() {
        let out = blocks("<blockquote>  Quoted\n text </blockquote><hr><pre>a<br>b</pre>");
        assert_eq!(
            out,
            vec![
                ContentBlock::Quote {
                    content: "Quoted text".into()
                },
                ContentBlock::Divider,
                ContentBlock::Code {
                    content: "a\nb".into()
                },
            ]
        );
    }

    #[test]
    fn image_inside_quote_follows_it() {
        let out = blocks(r#"<blockquote>Look <img src="https://x/q.png"></blockquote>"#);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind(), BlockKind::Quote);
        assert_eq!(out[1].kind(), BlockKind::Image);
    }

    #[test]
    fn lazy_loaded_image_and_unmapped_url() {
        let out = blocks(r#"<section><img data-src="https://mmbiz.qpic.cn/a/640?wx_fmt=png" src=""></section>"#);
        assert_eq!(
            out,
            vec![ContentBlock::Image {
                image_url: "https://mmbiz.qpic.cn/a/640?wx_fmt=png".into()
            }]
        );
    }

    #[test]
    fn scripts_and_unknown_tags() {
        let out = blocks("<article><script>alert(1)</script><mp-style>Kept text</mp-style></article>");
        assert_eq!(out, vec![ContentBlock::text("Kept text")]);
    }

    #[test]
    fn text_order_is_preserved() {
        let html = "<div><h1>Title</h1><p>Alpha <b>beta</b></p><ul><li>gamma</li></ul><p>delta</p></div>";
        let out = blocks(html);
        assert_eq!(visible_text(&out), "Title Alpha beta gamma delta");
    }

    #[test]
    fn deterministic() {
        let html = r#"<p>Hi <em>there</em> <img src="http://x/a.png"> tail</p><h2>H</h2>"#;
        assert_eq!(blocks(html), blocks(html));
    }

    #[test]
    fn empty_input() {
        assert!(blocks("").is_empty());
        assert!(blocks("   \n ").is_empty());
        assert!(blocks("<div> </div>").is_empty());
    }

    /// `levels` elements below the fragment root, the innermost being `<b>`.
    fn nested(levels: usize) -> String {
        let outer = levels - 1;
        format!(
            "{}<script>skip()</script>deep <b>text</b>{}",
            "<div>".repeat(outer),
            "</div>".repeat(outer)
        )
    }

    #[test]
    fn nesting_at_limit_is_walked() {
        let out = blocks(&nested(MAX_DEPTH));
        assert_eq!(
            out,
            vec![ContentBlock::Text {
                content: "deep text".into(),
                inline_runs: vec![run("deep ", false, false), run("text", true, false)],
            }]
        );
    }

    #[test]
    fn nesting_past_limit_degrades_to_plain_text() {
        let out = blocks(&nested(MAX_DEPTH + 1));
        assert_eq!(out, vec![ContentBlock::text("deep text")]);
    }

    #[test]
    fn very_deep_nesting_does_not_overflow() {
        let out = blocks(&nested(600));
        assert_eq!(out, vec![ContentBlock::text("deep text")]);
    }

    #[test]
    fn whitespace_between_inline_siblings_is_kept() {
        let out = blocks("<p><b>Hello</b> <i>world</i></p>");
        assert_eq!(
            out,
            vec![ContentBlock::Text {
                content: "Hello world".into(),
                inline_runs: vec![
                    run("Hello", true, false),
                    run(" ", false, false),
                    run("world", false, true),
                ],
            }]
        );

        let out = blocks(r#"<p><a href="/a">foo</a> <a href="/b">bar</a></p>"#);
        assert_eq!(out, vec![ContentBlock::text("foo bar")]);
    }

    #[test]
    fn loose_list_text_is_kept_in_order() {
        let out = blocks("<ul>Loose text<li>a</li>tail <b>bold</b></ul>");
        assert_eq!(
            out,
            vec![
                ContentBlock::text("Loose text"),
                ContentBlock::ListItem {
                    content: "a".into(),
                    ordered: false
                },
                ContentBlock::Text {
                    content: "tail bold".into(),
                    inline_runs: vec![run("tail ", false, false), run("bold", true, false)],
                },
            ]
        );
    }

    #[test]
    fn visible_text_matches_dom_text() {
        let fragments = [
            "<p><b>Hello</b> <i>world</i></p>",
            r#"<p><a href="/1">one</a> <a href="/2">two</a> <a href="/3">three</a></p>"#,
            "<div>Intro <p>middle <em>part</em></p> outro</div>",
            "<ul>Loose text <li>a</li> <li>b <b>c</b></li> </ul>",
            "<h2>Head</h2> <blockquote>said <b>so</b></blockquote> <p>x<span> </span>y</p>",
            "<section>  lead\n <strong>strong</strong>\t<em>em</em>  </section>",
        ];
        for html in fragments {
            let doc = Html::parse_fragment(html);
            let expected = text::plain_text(doc.root_element());
            let actual = text::collapse_whitespace(&visible_text(&blocks(html))).into_owned();
            assert_eq!(actual, expected, "fragment: {}", html);
        }
    }

    #[test]
    fn custom_merge_threshold() {
        let map: HashMap<String, String> = HashMap::new();
        let out = Transcoder::new(&map)
            .with_options(TranscodeOptions { merge_threshold: 3 })
            .transcribe("<p>one</p><p>two</p>");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn wechat_fixture() {
        let html = std::fs::read_to_string("tests/fixtures/wechat_article.html").unwrap();
        let out = blocks(&html);
        let images = out.iter().filter(|b| b.kind() == BlockKind::Image).count();
        assert_eq!(images, 3, "got: {:?}", out);
        assert!(out.iter().any(|b| matches!(b, ContentBlock::Heading { level: 2, .. })));
        assert!(out.iter().any(|b| b.kind() == BlockKind::Code));
        assert!(out.iter().any(|b| matches!(b, ContentBlock::ListItem { ordered: true, .. })));
        assert!(!visible_text(&out).contains("wx.config"));
    }
}
