/// A styled piece of text inside a destination block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextElement {
    pub content: String,
    pub bold: bool,
    pub italic: bool,
}

impl TextElement {
    pub fn plain(content: impl Into<String>) -> Self {
        TextElement {
            content: content.into(),
            bold: false,
            italic: false,
        }
    }
}

/// Destination-ready block. Built by the converter and handed to the
/// publisher by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetBlock {
    Text(Vec<TextElement>),
    Heading { level: u8, elements: Vec<TextElement> },
    Image { token: String },
    Divider,
    Bullet(Vec<TextElement>),
    Ordered(Vec<TextElement>),
    Code(String),
    Quote(Vec<TextElement>),
    /// An image that could not be stored, shown as its URL.
    Placeholder { url: String },
}

impl TargetBlock {
    /// Concatenated visible text.
    pub fn visible_text(&self) -> String {
        let join = |elements: &[TextElement]| -> String {
            elements.iter().map(|e| e.content.as_str()).collect()
        };
        match self {
            TargetBlock::Text(elements)
            | TargetBlock::Bullet(elements)
            | TargetBlock::Ordered(elements)
            | TargetBlock::Quote(elements)
            | TargetBlock::Heading { elements, .. } => join(elements),
            TargetBlock::Code(content) => content.clone(),
            TargetBlock::Placeholder { url } => url.clone(),
            TargetBlock::Image { .. } | TargetBlock::Divider => String::new(),
        }
    }
}
