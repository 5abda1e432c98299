use serde::Serialize;

/// A contiguous span of text sharing one style combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

impl InlineRun {
    pub fn plain(text: impl Into<String>) -> Self {
        InlineRun {
            text: text.into(),
            bold: false,
            italic: false,
        }
    }

    pub fn is_styled(&self) -> bool {
        self.bold || self.italic
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    Heading,
    Image,
    Divider,
    ListItem,
    Code,
    Quote,
}

/// Destination-agnostic unit of parsed content, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentBlock {
    /// `content` is the concatenation of `inline_runs` when runs are present.
    Text {
        content: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        inline_runs: Vec<InlineRun>,
    },
    Heading { level: u8, content: String },
    Image { image_url: String },
    Divider,
    ListItem { content: String, ordered: bool },
    Code { content: String },
    Quote { content: String },
}

impl ContentBlock {
    pub fn text(content: impl Into<String>) -> Self {
        ContentBlock::Text {
            content: content.into(),
            inline_runs: Vec::new(),
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            ContentBlock::Text { .. } => BlockKind::Text,
            ContentBlock::Heading { .. } => BlockKind::Heading,
            ContentBlock::Image { .. } => BlockKind::Image,
            ContentBlock::Divider => BlockKind::Divider,
            ContentBlock::ListItem { .. } => BlockKind::ListItem,
            ContentBlock::Code { .. } => BlockKind::Code,
            ContentBlock::Quote { .. } => BlockKind::Quote,
        }
    }

    /// Visible text of the block, if the kind carries any.
    pub fn content(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { content, .. }
            | ContentBlock::Heading { content, .. }
            | ContentBlock::ListItem { content, .. }
            | ContentBlock::Code { content }
            | ContentBlock::Quote { content } => Some(content),
            ContentBlock::Image { .. } | ContentBlock::Divider => None,
        }
    }

    /// Unstyled text block, the only kind that takes part in short-block merging.
    pub fn is_plain_text(&self) -> bool {
        matches!(self, ContentBlock::Text { inline_runs, .. } if inline_runs.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_content() {
        let heading = ContentBlock::Heading {
            level: 2,
            content: "Title".into(),
        };
        assert_eq!(heading.kind(), BlockKind::Heading);
        assert_eq!(heading.content(), Some("Title"));
        assert_eq!(ContentBlock::Divider.content(), None);
    }

    #[test]
    fn plain_text_excludes_rich() {
        assert!(ContentBlock::text("hi").is_plain_text());
        let rich = ContentBlock::Text {
            content: "hi".into(),
            inline_runs: vec![InlineRun {
                text: "hi".into(),
                bold: true,
                italic: false,
            }],
        };
        assert!(!rich.is_plain_text());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(ContentBlock::Image {
            image_url: "http://cdn/a.png".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "image");
        assert_eq!(json["image_url"], "http://cdn/a.png");

        let json = serde_json::to_value(ContentBlock::text("x")).unwrap();
        assert!(json.get("inline_runs").is_none());
    }
}
