use super::blocks::{ContentBlock, InlineRun};
use super::style::StyleContext;
use super::text::collapse_whitespace;

pub const DEFAULT_MERGE_THRESHOLD: usize = 100;

/// Turn a leaf text node into a run. A pure-whitespace node becomes a single
/// space, which `flush` drops again at block edges.
pub fn text_run(text: &str, style: StyleContext) -> Option<InlineRun> {
    if text.is_empty() {
        return None;
    }
    Some(InlineRun {
        text: collapse_whitespace(text).into_owned(),
        bold: style.bold,
        italic: style.italic,
    })
}

/// Close a run buffer into a text block.
///
/// The block is trimmed at both ends and doubled spaces across run
/// boundaries are dropped, so a rich block's `content` is always the exact
/// concatenation of its runs. All-plain buffers collapse into a plain block.
pub fn flush(runs: Vec<InlineRun>) -> Option<ContentBlock> {
    let mut kept: Vec<InlineRun> = Vec::with_capacity(runs.len());
    for mut run in runs {
        let after_space = kept.last().map_or(true, |prev| prev.text.ends_with(' '));
        if after_space {
            run.text = run.text.trim_start().to_string();
        }
        if !run.text.is_empty() {
            kept.push(run);
        }
    }
    while let Some(last) = kept.last_mut() {
        let trimmed_len = last.text.trim_end().len();
        last.text.truncate(trimmed_len);
        if last.text.is_empty() {
            kept.pop();
        } else {
            break;
        }
    }
    if kept.is_empty() {
        return None;
    }

    let content: String = kept.iter().map(|run| run.text.as_str()).collect();
    if kept.iter().any(InlineRun::is_styled) {
        Some(ContentBlock::Text {
            content,
            inline_runs: kept,
        })
    } else {
        Some(ContentBlock::text(content))
    }
}

/// Merge consecutive short plain text blocks, joined by a single space.
///
/// Both sides must be under `threshold` characters; the check runs against
/// the accumulated block, so a merged block stops absorbing once it grows
/// past the threshold. Styled blocks never merge.
pub fn merge_plain_text(blocks: Vec<ContentBlock>, threshold: usize) -> Vec<ContentBlock> {
    let mut out: Vec<ContentBlock> = Vec::with_capacity(blocks.len());
    for block in blocks {
        if let (
            Some(ContentBlock::Text {
                content: prev,
                inline_runs: prev_runs,
            }),
            ContentBlock::Text {
                content,
                inline_runs,
            },
        ) = (out.last_mut(), &block)
        {
            if prev_runs.is_empty()
                && inline_runs.is_empty()
                && prev.chars().count() < threshold
                && content.chars().count() < threshold
            {
                prev.push(' ');
                prev.push_str(content);
                continue;
            }
        }
        out.push(block);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, bold: bool) -> InlineRun {
        InlineRun {
            text: text.into(),
            bold,
            italic: false,
        }
    }

    #[test]
    fn whitespace_only_node_is_one_space() {
        assert!(text_run("", StyleContext::default()).is_none());
        assert_eq!(text_run(" \n\t ", StyleContext::default()).unwrap().text, " ");
        let r = text_run("Hello\n   world ", StyleContext::default()).unwrap();
        assert_eq!(r.text, "Hello world ");
    }

    #[test]
    fn flush_plain_collapses() {
        let block = flush(vec![run("  Hello ", false), run("world  ", false)]).unwrap();
        assert_eq!(block, ContentBlock::text("Hello world"));
    }

    #[test]
    fn flush_rich_keeps_runs_and_concatenation() {
        let block = flush(vec![run(" Hello ", false), run(" world", true)]).unwrap();
        match block {
            ContentBlock::Text {
                content,
                inline_runs,
            } => {
                assert_eq!(content, "Hello world");
                assert_eq!(inline_runs, vec![run("Hello ", false), run("world", true)]);
                let joined: String = inline_runs.iter().map(|r| r.text.as_str()).collect();
                assert_eq!(joined, content);
            }
            other => panic!("expected text block, got {:?}", other),
        }
    }

    #[test]
    fn separator_run_survives_between_words_only() {
        let block = flush(vec![run(" ", false), run("Hello", true), run(" ", false), run("world", false), run(" ", false)]).unwrap();
        assert_eq!(block.content(), Some("Hello world"));
        let block = flush(vec![run("a ", false), run(" ", false), run("b", false)]).unwrap();
        assert_eq!(block, ContentBlock::text("a b"));
    }

    #[test]
    fn flush_empty_buffer() {
        assert!(flush(Vec::new()).is_none());
        assert!(flush(vec![run(" ", true)]).is_none());
    }

    #[test]
    fn merges_short_plain_blocks() {
        let merged = merge_plain_text(
            vec![ContentBlock::text("one"), ContentBlock::text("two")],
            DEFAULT_MERGE_THRESHOLD,
        );
        assert_eq!(merged, vec![ContentBlock::text("one two")]);
    }

    #[test]
    fn long_blocks_stay_apart() {
        let long = "x".repeat(DEFAULT_MERGE_THRESHOLD);
        let merged = merge_plain_text(
            vec![ContentBlock::text(long.clone()), ContentBlock::text("tail")],
            DEFAULT_MERGE_THRESHOLD,
        );
        assert_eq!(merged.len(), 2);

        let merged = merge_plain_text(
            vec![ContentBlock::text("head"), ContentBlock::text(long)],
            DEFAULT_MERGE_THRESHOLD,
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn styled_never_merges() {
        let rich = flush(vec![run("bold", true)]).unwrap();
        let merged = merge_plain_text(
            vec![ContentBlock::text("plain"), rich.clone(), ContentBlock::text("after")],
            DEFAULT_MERGE_THRESHOLD,
        );
        assert_eq!(
            merged,
            vec![ContentBlock::text("plain"), rich, ContentBlock::text("after")]
        );
    }

    #[test]
    fn accumulated_block_stops_absorbing() {
        let chunk = "y".repeat(60);
        let merged = merge_plain_text(
            vec![
                ContentBlock::text(chunk.clone()),
                ContentBlock::text(chunk.clone()),
                ContentBlock::text(chunk),
            ],
            DEFAULT_MERGE_THRESHOLD,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].content().map(|c| c.chars().count()), Some(121));
    }
}
