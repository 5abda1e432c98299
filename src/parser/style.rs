use super::tags::InlineStyle;

/// Inline style inherited down the tree walk. Each recursion frame derives its
/// own copy; nothing is shared between sibling subtrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleContext {
    pub bold: bool,
    pub italic: bool,
}

impl StyleContext {
    pub fn derive(self, style: InlineStyle) -> Self {
        match style {
            InlineStyle::Bold => StyleContext { bold: true, ..self },
            InlineStyle::Italic => StyleContext {
                italic: true,
                ..self
            },
            InlineStyle::PassThrough => self,
        }
    }
}
