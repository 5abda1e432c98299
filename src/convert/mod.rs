pub mod sanitize;
pub mod target;

use tracing::{debug, info, warn};

use crate::images::ImageUploader;
use crate::parser::blocks::{ContentBlock, InlineRun};
use crate::parser::tags::MAX_HEADING_LEVEL;
use sanitize::sanitize;
pub use target::{TargetBlock, TextElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Deepest heading the destination supports; deeper levels clamp to it.
    pub max_heading_level: u8,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            max_heading_level: MAX_HEADING_LEVEL,
        }
    }
}

/// Map content blocks onto destination blocks, one for one, in order.
///
/// Images are uploaded through `uploader`; a failed upload becomes a
/// placeholder showing the URL so the image never disappears silently.
pub fn convert<U: ImageUploader + ?Sized>(
    blocks: Vec<ContentBlock>,
    uploader: &U,
    options: &ConvertOptions,
) -> Vec<TargetBlock> {
    let mut out = Vec::with_capacity(blocks.len());
    let mut placeholders = 0usize;

    for block in blocks {
        let target = match block {
            ContentBlock::Text {
                content,
                inline_runs,
            } => {
                if inline_runs.is_empty() {
                    TargetBlock::Text(elements(vec![TextElement::plain(content)]))
                } else {
                    TargetBlock::Text(elements(inline_runs.into_iter().map(run_element).collect()))
                }
            }
            ContentBlock::Heading { level, content } => TargetBlock::Heading {
                level: level.clamp(1, options.max_heading_level.max(1)),
                elements: elements(vec![TextElement::plain(content)]),
            },
            ContentBlock::Image { image_url } => match uploader.fetch_and_store(&image_url) {
                Ok(handle) => {
                    debug!("Stored image {} as {}", image_url, handle.token);
                    TargetBlock::Image {
                        token: handle.token,
                    }
                }
                Err(e) => {
                    warn!("Image upload failed, keeping a placeholder: {}", e);
                    placeholders += 1;
                    TargetBlock::Placeholder {
                        url: non_empty(sanitize(&image_url)),
                    }
                }
            },
            ContentBlock::Divider => TargetBlock::Divider,
            ContentBlock::ListItem { content, ordered } => {
                let elements = elements(vec![TextElement::plain(content)]);
                if ordered {
                    TargetBlock::Ordered(elements)
                } else {
                    TargetBlock::Bullet(elements)
                }
            }
            ContentBlock::Code { content } => TargetBlock::Code(non_empty(sanitize(&content))),
            ContentBlock::Quote { content } => {
                TargetBlock::Quote(elements(vec![TextElement::plain(content)]))
            }
        };
        out.push(target);
    }

    if placeholders > 0 {
        info!(
            "Converted {} blocks ({} images kept as placeholders)",
            out.len(),
            placeholders
        );
    } else {
        info!("Converted {} blocks", out.len());
    }
    out
}

fn run_element(run: InlineRun) -> TextElement {
    TextElement {
        content: run.text,
        bold: run.bold,
        italic: run.italic,
    }
}

/// Sanitize each element, dropping the ones left empty. A block never ends up
/// without text: it keeps a single space instead.
fn elements(raw: Vec<TextElement>) -> Vec<TextElement> {
    let cleaned: Vec<TextElement> = raw
        .into_iter()
        .filter_map(|mut element| {
            element.content = sanitize(&element.content);
            (!element.content.is_empty()).then_some(element)
        })
        .collect();
    if cleaned.is_empty() {
        vec![TextElement::plain(" ")]
    } else {
        cleaned
    }
}

fn non_empty(text: String) -> String {
    if text.is_empty() {
        " ".to_string()
    } else {
        text
    }
}
