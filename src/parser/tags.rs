/// How an inline tag affects the inherited style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineStyle {
    Bold,
    Italic,
    PassThrough,
}

/// Closed classification of element names, resolved once per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagCategory {
    Heading(u8),
    Image,
    Container,
    Inline(InlineStyle),
    List { ordered: bool },
    ListItem,
    Preformatted,
    Quote,
    Divider,
    LineBreak,
    /// Dropped together with its subtree.
    Skip,
    Unknown,
}

pub const MAX_HEADING_LEVEL: u8 = 9;

impl TagCategory {
    pub fn of(name: &str) -> Self {
        match name {
            "img" | "graphic" => TagCategory::Image,
            "p" | "div" | "section" | "article" | "main" | "header" | "footer" | "nav"
            | "aside" | "figure" | "figcaption" | "html" | "body" | "table" | "thead"
            | "tbody" | "tfoot" | "tr" | "td" | "th" | "dl" | "dt" | "dd" | "details"
            | "summary" | "center" | "address" => TagCategory::Container,
            "strong" | "b" => TagCategory::Inline(InlineStyle::Bold),
            "em" | "i" => TagCategory::Inline(InlineStyle::Italic),
            "span" | "a" | "u" | "s" | "del" | "ins" | "mark" | "sub" | "sup" | "code"
            | "small" | "big" | "font" | "abbr" | "cite" | "q" | "label" | "time" => {
                TagCategory::Inline(InlineStyle::PassThrough)
            }
            "ul" => TagCategory::List { ordered: false },
            "ol" => TagCategory::List { ordered: true },
            "li" => TagCategory::ListItem,
            "pre" => TagCategory::Preformatted,
            "blockquote" => TagCategory::Quote,
            "hr" => TagCategory::Divider,
            "br" => TagCategory::LineBreak,
            "script" | "style" | "noscript" | "template" | "head" | "iframe" | "svg"
            | "video" | "audio" | "canvas" | "object" => TagCategory::Skip,
            other => heading_level(other)
                .map(TagCategory::Heading)
                .unwrap_or(TagCategory::Unknown),
        }
    }
}

/// `h1`..`h9`, clamped to the supported depth. `h0` is not a heading.
fn heading_level(name: &str) -> Option<u8> {
    let digits = name.strip_prefix('h')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let level: u32 = digits.parse().ok()?;
    if level == 0 {
        return None;
    }
    Some(level.min(MAX_HEADING_LEVEL as u32) as u8)
}
