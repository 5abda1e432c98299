use serde_json::{json, Value};

use crate::convert::{TargetBlock, TextElement};

// ── docx block types ──

pub const TEXT: u8 = 2;
/// heading1 is 3, heading9 is 11.
pub const HEADING_BASE: u8 = 2;
pub const BULLET: u8 = 12;
pub const ORDERED: u8 = 13;
pub const CODE: u8 = 14;
pub const QUOTE: u8 = 15;
pub const DIVIDER: u8 = 22;
pub const IMAGE: u8 = 27;

/// Serialize one block the way the docx children endpoint expects it.
pub fn to_wire(block: &TargetBlock) -> Value {
    match block {
        TargetBlock::Text(elements) => text_block(TEXT, "text", elements),
        TargetBlock::Heading { level, elements } => {
            let level = (*level).clamp(1, 9);
            text_block(HEADING_BASE + level, &format!("heading{}", level), elements)
        }
        TargetBlock::Bullet(elements) => text_block(BULLET, "bullet", elements),
        TargetBlock::Ordered(elements) => text_block(ORDERED, "ordered", elements),
        TargetBlock::Quote(elements) => text_block(QUOTE, "quote", elements),
        TargetBlock::Code(content) => {
            text_block(CODE, "code", &[TextElement::plain(content.as_str())])
        }
        TargetBlock::Divider => json!({ "block_type": DIVIDER, "divider": {} }),
        TargetBlock::Image { token } => json!({
            "block_type": IMAGE,
            "image": { "token": token },
        }),
        TargetBlock::Placeholder { url } => {
            text_block(TEXT, "text", &[TextElement::plain(url.as_str())])
        }
    }
}

pub fn to_wire_all(blocks: &[TargetBlock]) -> Vec<Value> {
    blocks.iter().map(to_wire).collect()
}

fn text_block(block_type: u8, key: &str, elements: &[TextElement]) -> Value {
    let runs: Vec<Value> = elements.iter().map(text_run).collect();
    let mut block = json!({ "block_type": block_type });
    block[key] = json!({ "elements": runs });
    block
}

fn text_run(element: &TextElement) -> Value {
    json!({
        "text_run": {
            "content": element.content,
            "text_element_style": {
                "bold": element.bold,
                "italic": element.italic,
            },
        }
    })
}
