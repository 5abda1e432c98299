use scraper::ElementRef;

use super::text::{has_line_break, subtree_text};

/// Text of a `<pre>` block, kept verbatim.
///
/// Some editors export code as `<pre><code>line</code><code><br></code>...`,
/// one `<code>` per line with a lone `<br>` marking a blank line. Those are
/// joined with newlines. Anything else takes the raw text with `<br>` turned
/// into `\n`.
pub fn preformatted_text(pre: ElementRef<'_>) -> String {
    let lines: Vec<ElementRef<'_>> = pre
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "code")
        .collect();

    if lines.len() > 1 {
        return lines
            .into_iter()
            .map(|line| {
                let text = subtree_text(line, "");
                if has_line_break(line) && text.trim().is_empty() {
                    String::new()
                } else {
                    text
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
    }

    subtree_text(pre, "\n")
}
