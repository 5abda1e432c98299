use crate::parser::blocks::{ContentBlock, InlineRun};

/// Title and byline placed above an article's body: the title as a top-level
/// heading, then any metadata lines between two dividers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleHeader {
    pub title: String,
    pub author: Option<String>,
    pub published: Option<String>,
    pub source_url: Option<String>,
}

impl ArticleHeader {
    pub fn new(title: impl Into<String>) -> Self {
        ArticleHeader {
            title: title.into(),
            ..ArticleHeader::default()
        }
    }

    pub fn blocks(&self) -> Vec<ContentBlock> {
        let mut out = Vec::new();
        let title = self.title.trim();
        if !title.is_empty() {
            out.push(ContentBlock::Heading {
                level: 1,
                content: title.to_string(),
            });
        }

        let fields = [
            ("Author", &self.author),
            ("Published", &self.published),
            ("Source", &self.source_url),
        ];
        let lines: Vec<ContentBlock> = fields
            .into_iter()
            .filter_map(|(label, value)| {
                let value = value.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
                Some(meta_line(label, value))
            })
            .collect();
        if !lines.is_empty() {
            out.push(ContentBlock::Divider);
            out.extend(lines);
            out.push(ContentBlock::Divider);
        }
        out
    }
}

/// `Label: value` with the label in bold.
fn meta_line(label: &str, value: &str) -> ContentBlock {
    let label = InlineRun {
        text: format!("{}: ", label),
        bold: true,
        italic: false,
    };
    ContentBlock::Text {
        content: format!("{}{}", label.text, value),
        inline_runs: vec![label, InlineRun::plain(value)],
    }
}
