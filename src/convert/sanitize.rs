/// Zero-width characters that editors sprinkle into scraped text.
const ZERO_WIDTH: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

/// Strip zero-width and control characters, keeping newlines and tabs.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !ZERO_WIDTH.contains(c))
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}
