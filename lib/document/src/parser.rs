//! Block scanner for the front-matter document format.
//!
//! A header is a `---` marker line followed by one or more `key: value`
//! lines and a closing marker. Everything after the closing marker up to
//! the next header belongs to the block's content. A marker that does not
//! open such a header, like a markdown rule, is ordinary text. Lines before
//! the first header are ignored.

use crate::error::DocumentError;
use crate::record::Metadata;
use serde_json::Value as JsonValue;

/// The line that opens and closes a block header.
pub const MARKER: &str = "---";

const BYTE_ORDER_MARK: char = '\u{feff}';

/// A block as it appears in the source, before id resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBlock {
    /// 1-indexed line of the opening marker.
    pub line: usize,
    /// Parsed header fields.
    pub metadata: Metadata,
    /// Content following the header, trimmed.
    pub content: String,
}

struct OpenBlock<'a> {
    line: usize,
    metadata: Metadata,
    content: Vec<&'a str>,
}

impl OpenBlock<'_> {
    fn finish(self) -> RawBlock {
        RawBlock {
            line: self.line,
            metadata: self.metadata,
            content: self.content.join("\n").trim().to_string(),
        }
    }
}

fn is_marker(line: &str) -> bool {
    line.trim_end() == MARKER
}

fn is_field(line: &str) -> bool {
    line.contains(':')
}

/// Returns the index of the closing marker if `lines[open]` starts a header.
fn header_close(lines: &[&str], open: usize) -> Option<usize> {
    if !is_marker(lines[open]) {
        return None;
    }
    let fields = lines[open + 1..]
        .iter()
        .take_while(|line| !is_marker(line) && is_field(line))
        .count();
    let close = open + 1 + fields;
    (fields > 0 && close < lines.len() && is_marker(lines[close])).then_some(close)
}

/// Splits document text into blocks in file order.
///
/// # Errors
///
/// Returns `MalformedHeader` when a header is not a YAML mapping.
pub fn parse_blocks(text: &str) -> Result<Vec<RawBlock>, DocumentError> {
    let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut open: Option<OpenBlock<'_>> = None;
    let mut index = 0;

    while index < lines.len() {
        if let Some(close) = header_close(&lines, index) {
            if let Some(block) = open.take() {
                blocks.push(block.finish());
            }
            let line = index + 1;
            open = Some(OpenBlock {
                line,
                metadata: parse_header(line, &lines[index + 1..close])?,
                content: Vec::new(),
            });
            index = close + 1;
            continue;
        }

        if let Some(block) = open.as_mut() {
            block.content.push(lines[index]);
        }
        index += 1;
    }

    if let Some(block) = open {
        blocks.push(block.finish());
    }
    Ok(blocks)
}

fn parse_header(line: usize, lines: &[&str]) -> Result<Metadata, DocumentError> {
    let header = lines.join("\n");
    let value: JsonValue =
        serde_yaml::from_str(&header).map_err(|e| DocumentError::MalformedHeader {
            line,
            reason: e.to_string(),
        })?;

    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(DocumentError::MalformedHeader {
            line,
            reason: format!("expected key: value pairs, found {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_blocks_in_file_order() {
        let text = "---\nid: a\n---\nfirst\n---\nid: b\n---\nsecond\n";
        let blocks = parse_blocks(text).expect("parse");

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].metadata["id"], "a");
        assert_eq!(blocks[0].content, "first");
        assert_eq!(blocks[1].metadata["id"], "b");
        assert_eq!(blocks[1].content, "second");
        assert_eq!(blocks[1].line, 5);
    }

    #[test]
    fn content_is_trimmed_but_inner_lines_kept() {
        let text = "---\nid: a\n---\n\n  line one\n\nline two  \n\n";
        let blocks = parse_blocks(text).expect("parse");
        assert_eq!(blocks[0].content, "line one\n\nline two");
    }

    #[test]
    fn preamble_is_ignored() {
        let text = "notes for humans\n---\nid: a\n---\nbody";
        let blocks = parse_blocks(text).expect("parse");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, "body");
    }

    #[test]
    fn typed_scalars() {
        let text = "---\nid: m1\norder: 2\ndisabled: true\ntemperature: 0.5\n---\n";
        let blocks = parse_blocks(text).expect("parse");
        let metadata = &blocks[0].metadata;

        assert_eq!(metadata["order"], 2);
        assert_eq!(metadata["disabled"], true);
        assert_eq!(metadata["temperature"], 0.5);
        assert_eq!(blocks[0].content, "");
    }

    #[test]
    fn crlf_line_endings() {
        let text = "---\r\nid: a\r\n---\r\nhello\r\n";
        let blocks = parse_blocks(text).expect("parse");
        assert_eq!(blocks[0].metadata["id"], "a");
        assert_eq!(blocks[0].content, "hello");
    }

    #[test]
    fn malformed_header_is_an_error() {
        let text = "---\nid: a\nlist: [unclosed\n---\nbody";
        let err = parse_blocks(text).unwrap_err();
        assert!(matches!(err, DocumentError::MalformedHeader { line: 1, .. }));
    }

    #[test]
    fn non_mapping_header_is_an_error() {
        let err = parse_blocks("---\n- a: b\n---\nbody").unwrap_err();
        assert!(matches!(err, DocumentError::MalformedHeader { .. }));
    }

    #[test]
    fn leading_byte_order_mark_is_skipped() {
        let text = "\u{feff}---\nid: t1\ntype: thread\n---\nSystem text.\n---\nid: m1\n---\nHello.\n";
        let blocks = parse_blocks(text).expect("parse");

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].metadata["id"], "t1");
        assert_eq!(blocks[0].content, "System text.");
        assert_eq!(blocks[1].content, "Hello.");
    }

    #[test]
    fn horizontal_rule_stays_in_content() {
        let text = "---\nid: m1\n---\nPart one\n---\nPart two\n---\nid: m2\n---\nNext";
        let blocks = parse_blocks(text).expect("parse");

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].content, "Part one\n---\nPart two");
        assert_eq!(blocks[1].metadata["id"], "m2");
        assert_eq!(blocks[1].line, 7);
        assert_eq!(blocks[1].content, "Next");
    }

    #[test]
    fn trailing_rule_stays_in_content() {
        let blocks = parse_blocks("---\nid: a\n---\nbody\n---\n").expect("parse");
        assert_eq!(blocks[0].content, "body\n---");
    }

    #[test]
    fn unclosed_fields_stay_in_content() {
        let text = "---\nid: a\n---\nbody\n---\nNote: not a header\n";
        let blocks = parse_blocks(text).expect("parse");

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, "body\n---\nNote: not a header");
    }

    #[test]
    fn empty_header_is_not_a_header() {
        let blocks = parse_blocks("---\n---\ncontent").expect("parse");
        assert!(blocks.is_empty());
    }

    #[test]
    fn no_markers_yields_no_blocks() {
        let blocks = parse_blocks("plain text only").expect("parse");
        assert!(blocks.is_empty());
    }
}
