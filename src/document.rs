//! Rich-text document model and the pure splice operation.
//!
//! The model mirrors the editor's schema: a document is a list of top-level
//! blocks, text-bearing blocks (paragraphs, headings) hold inline runs with
//! marks, and lists nest blocks inside items. [`compute_splice`] is
//! deliberately a pure function over this model so insertion behavior can be
//! tested without a live editor.

use serde::{Deserialize, Serialize};

// ── Nodes ──────────────────────────────────────────────────────────────────

/// Character-level formatting on a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Marks {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub strike: bool,
}

impl Marks {
    pub const NONE: Marks = Marks {
        bold: false,
        italic: false,
        code: false,
        strike: false,
    };
}

/// Inline content of a text block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Inline {
    Text { text: String, marks: Marks },
    HardBreak,
}

impl Inline {
    pub fn plain(text: impl Into<String>) -> Self {
        Inline::Text {
            text: text.into(),
            marks: Marks::NONE,
        }
    }

    pub fn marked(text: impl Into<String>, marks: Marks) -> Self {
        Inline::Text {
            text: text.into(),
            marks,
        }
    }

    /// Caret width of this inline: character count for text, 1 for a break.
    fn char_len(&self) -> usize {
        match self {
            Inline::Text { text, .. } => text.chars().count(),
            Inline::HardBreak => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    Paragraph { inlines: Vec<Inline> },
    Heading { level: u8, inlines: Vec<Inline> },
    BulletList { items: Vec<ListItem> },
    OrderedList { start: u64, items: Vec<ListItem> },
    CodeBlock { language: Option<String>, text: String },
    Blockquote { blocks: Vec<Block> },
    Rule,
}

impl Block {
    /// Paragraph holding a single unmarked text run.
    pub fn paragraph(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            Block::Paragraph { inlines: vec![] }
        } else {
            Block::Paragraph {
                inlines: vec![Inline::plain(text)],
            }
        }
    }

    /// Whether this block holds inline content directly (caret splices into
    /// it rather than after it).
    pub fn is_textblock(&self) -> bool {
        matches!(self, Block::Paragraph { .. } | Block::Heading { .. })
    }

    /// A text block with no visible content. Non-text blocks are never
    /// considered empty here.
    pub fn is_empty_textblock(&self) -> bool {
        match self {
            Block::Paragraph { inlines } | Block::Heading { inlines, .. } => {
                inlines.iter().all(|inline| match inline {
                    Inline::Text { text, .. } => text.is_empty(),
                    Inline::HardBreak => false,
                })
            }
            _ => false,
        }
    }

    /// Caret positions inside this block (0 for non-text blocks).
    pub fn text_len(&self) -> usize {
        match self {
            Block::Paragraph { inlines } | Block::Heading { inlines, .. } => {
                inlines.iter().map(Inline::char_len).sum()
            }
            _ => 0,
        }
    }
}

/// A parsed run of blocks ready to be spliced into a document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Fragment {
    pub blocks: Vec<Block>,
}

impl Fragment {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

// ── Document ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// The editor's default empty-document state: one empty paragraph.
    pub fn empty() -> Self {
        Self {
            blocks: vec![Block::Paragraph { inlines: vec![] }],
        }
    }

    /// Serialize to the markup string stored in `Note.content`.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            write_block(&mut out, block);
        }
        out
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

// ── Caret & splice ─────────────────────────────────────────────────────────

/// Caret position: a top-level block index plus a character offset inside it.
/// The offset is ignored for blocks without inline content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caret {
    pub block: usize,
    pub offset: usize,
}

impl Caret {
    pub fn new(block: usize, offset: usize) -> Self {
        Self { block, offset }
    }

    pub fn start() -> Self {
        Self::new(0, 0)
    }
}

/// Result of [`compute_splice`]: the new document and the caret at the end of
/// the inserted fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub document: Document,
    pub caret: Caret,
}

/// Splice `fragment` into `document` at `caret`.
///
/// Inside a text block the block is split at the caret and the fragment's
/// blocks go between the halves; a half the split left empty is dropped. For
/// any other block the fragment is inserted after it on a block boundary, so
/// it never merges into the preceding inline run. Afterwards, an empty text
/// block immediately preceding the fragment start is deleted — that is the
/// stray paragraph the editor's empty-document state would otherwise leave.
pub fn compute_splice(document: &Document, caret: Caret, fragment: &Fragment) -> Splice {
    if fragment.is_empty() {
        return Splice {
            document: document.clone(),
            caret,
        };
    }

    let mut out: Vec<Block> = Vec::with_capacity(document.blocks.len() + fragment.blocks.len());
    let mut insert_at;

    if caret.block >= document.blocks.len() {
        // Caret past the last block: append.
        out.extend(document.blocks.iter().cloned());
        insert_at = out.len();
        out.extend(fragment.blocks.iter().cloned());
    } else {
        out.extend(document.blocks[..caret.block].iter().cloned());
        let target = &document.blocks[caret.block];

        if target.is_textblock() {
            let (before, after) = split_textblock(target, caret.offset);
            if !before.is_empty_textblock() {
                out.push(before);
            }
            insert_at = out.len();
            out.extend(fragment.blocks.iter().cloned());
            if !after.is_empty_textblock() {
                out.push(after);
            }
        } else {
            out.push(target.clone());
            insert_at = out.len();
            out.extend(fragment.blocks.iter().cloned());
        }

        out.extend(document.blocks[caret.block + 1..].iter().cloned());
    }

    if insert_at > 0 && out[insert_at - 1].is_empty_textblock() {
        out.remove(insert_at - 1);
        insert_at -= 1;
    }

    let caret_block = insert_at + fragment.blocks.len() - 1;
    let caret_offset = out[caret_block].text_len();
    Splice {
        document: Document::new(out),
        caret: Caret::new(caret_block, caret_offset),
    }
}

/// Split a paragraph/heading at a character offset, preserving marks. The
/// offset is clamped to the block's text length.
fn split_textblock(block: &Block, offset: usize) -> (Block, Block) {
    match block {
        Block::Paragraph { inlines } => {
            let (before, after) = split_inlines(inlines, offset);
            (
                Block::Paragraph { inlines: before },
                Block::Paragraph { inlines: after },
            )
        }
        Block::Heading { level, inlines } => {
            let (before, after) = split_inlines(inlines, offset);
            (
                Block::Heading {
                    level: *level,
                    inlines: before,
                },
                Block::Heading {
                    level: *level,
                    inlines: after,
                },
            )
        }
        other => (other.clone(), Block::Paragraph { inlines: vec![] }),
    }
}

fn split_inlines(inlines: &[Inline], offset: usize) -> (Vec<Inline>, Vec<Inline>) {
    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut consumed = 0usize;

    for inline in inlines {
        let len = inline.char_len();
        if consumed + len <= offset {
            before.push(inline.clone());
        } else if consumed >= offset {
            after.push(inline.clone());
        } else if let Inline::Text { text, marks } = inline {
            // The split lands inside this run.
            let split = offset - consumed;
            let head: String = text.chars().take(split).collect();
            let tail: String = text.chars().skip(split).collect();
            if !head.is_empty() {
                before.push(Inline::Text { text: head, marks: *marks });
            }
            if !tail.is_empty() {
                after.push(Inline::Text { text: tail, marks: *marks });
            }
        }
        consumed += len;
    }

    (before, after)
}

// ── HTML serialization ─────────────────────────────────────────────────────

fn write_block(out: &mut String, block: &Block) {
    match block {
        Block::Paragraph { inlines } => {
            out.push_str("<p>");
            write_inlines(out, inlines);
            out.push_str("</p>");
        }
        Block::Heading { level, inlines } => {
            let level = (*level).clamp(1, 6);
            out.push_str(&format!("<h{}>", level));
            write_inlines(out, inlines);
            out.push_str(&format!("</h{}>", level));
        }
        Block::BulletList { items } => {
            out.push_str("<ul>");
            for item in items {
                out.push_str("<li>");
                for block in &item.blocks {
                    write_block(out, block);
                }
                out.push_str("</li>");
            }
            out.push_str("</ul>");
        }
        Block::OrderedList { start, items } => {
            if *start == 1 {
                out.push_str("<ol>");
            } else {
                out.push_str(&format!("<ol start=\"{}\">", start));
            }
            for item in items {
                out.push_str("<li>");
                for block in &item.blocks {
                    write_block(out, block);
                }
                out.push_str("</li>");
            }
            out.push_str("</ol>");
        }
        Block::CodeBlock { language, text } => {
            match language {
                Some(language) => {
                    out.push_str(&format!("<pre><code class=\"language-{}\">", language))
                }
                None => out.push_str("<pre><code>"),
            }
            out.push_str(&escape_html(text));
            out.push_str("</code></pre>");
        }
        Block::Blockquote { blocks } => {
            out.push_str("<blockquote>");
            for block in blocks {
                write_block(out, block);
            }
            out.push_str("</blockquote>");
        }
        Block::Rule => out.push_str("<hr>"),
    }
}

fn write_inlines(out: &mut String, inlines: &[Inline]) {
    for inline in inlines {
        match inline {
            Inline::HardBreak => out.push_str("<br>"),
            Inline::Text { text, marks } => {
                if marks.bold {
                    out.push_str("<strong>");
                }
                if marks.italic {
                    out.push_str("<em>");
                }
                if marks.strike {
                    out.push_str("<s>");
                }
                if marks.code {
                    out.push_str("<code>");
                }
                out.push_str(&escape_html(text));
                if marks.code {
                    out.push_str("</code>");
                }
                if marks.strike {
                    out.push_str("</s>");
                }
                if marks.italic {
                    out.push_str("</em>");
                }
                if marks.bold {
                    out.push_str("</strong>");
                }
            }
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(blocks: Vec<Block>) -> Fragment {
        Fragment::new(blocks)
    }

    #[test]
    fn test_splice_replaces_empty_paragraph_at_start() {
        let doc = Document::empty();
        let frag = fragment(vec![
            Block::Heading {
                level: 2,
                inlines: vec![Inline::plain("Title")],
            },
            Block::paragraph("body"),
        ]);

        let splice = compute_splice(&doc, Caret::start(), &frag);

        // The empty default paragraph is gone; only the fragment remains.
        assert_eq!(splice.document.blocks, frag.blocks);
        assert_eq!(splice.caret, Caret::new(1, 4));
    }

    #[test]
    fn test_splice_splits_paragraph_mid_text() {
        let doc = Document::new(vec![Block::paragraph("hello world")]);
        let frag = fragment(vec![Block::paragraph("inserted")]);

        let splice = compute_splice(&doc, Caret::new(0, 5), &frag);

        assert_eq!(
            splice.document.blocks,
            vec![
                Block::paragraph("hello"),
                Block::paragraph("inserted"),
                Block::paragraph(" world"),
            ]
        );
    }

    #[test]
    fn test_splice_at_paragraph_end_leaves_no_empty_trailer() {
        let doc = Document::new(vec![Block::paragraph("abc")]);
        let frag = fragment(vec![Block::paragraph("next")]);

        let splice = compute_splice(&doc, Caret::new(0, 3), &frag);

        assert_eq!(
            splice.document.blocks,
            vec![Block::paragraph("abc"), Block::paragraph("next")]
        );
    }

    #[test]
    fn test_splice_after_non_text_block() {
        let code = Block::CodeBlock {
            language: None,
            text: "x".to_string(),
        };
        let doc = Document::new(vec![code.clone(), Block::paragraph("tail")]);
        let frag = fragment(vec![Block::paragraph("new")]);

        let splice = compute_splice(&doc, Caret::new(0, 0), &frag);

        assert_eq!(
            splice.document.blocks,
            vec![code, Block::paragraph("new"), Block::paragraph("tail")]
        );
    }

    #[test]
    fn test_splice_removes_preceding_empty_paragraph() {
        let doc = Document::new(vec![
            Block::Paragraph { inlines: vec![] },
            Block::Paragraph { inlines: vec![] },
        ]);
        let frag = fragment(vec![Block::paragraph("only")]);

        let splice = compute_splice(&doc, Caret::new(1, 0), &frag);

        assert_eq!(splice.document.blocks, vec![Block::paragraph("only")]);
    }

    #[test]
    fn test_splice_caret_past_end_appends() {
        let doc = Document::new(vec![Block::paragraph("a")]);
        let frag = fragment(vec![Block::paragraph("b")]);

        let splice = compute_splice(&doc, Caret::new(9, 0), &frag);

        assert_eq!(
            splice.document.blocks,
            vec![Block::paragraph("a"), Block::paragraph("b")]
        );
        assert_eq!(splice.caret, Caret::new(1, 1));
    }

    #[test]
    fn test_splice_empty_fragment_is_identity() {
        let doc = Document::new(vec![Block::paragraph("a")]);
        let caret = Caret::new(0, 1);
        let splice = compute_splice(&doc, caret, &Fragment::default());
        assert_eq!(splice.document, doc);
        assert_eq!(splice.caret, caret);
    }

    #[test]
    fn test_split_preserves_marks() {
        let bold = Marks {
            bold: true,
            ..Marks::NONE
        };
        let doc = Document::new(vec![Block::Paragraph {
            inlines: vec![Inline::marked("bold run", bold)],
        }]);
        let frag = fragment(vec![Block::paragraph("mid")]);

        let splice = compute_splice(&doc, Caret::new(0, 4), &frag);

        assert_eq!(
            splice.document.blocks,
            vec![
                Block::Paragraph {
                    inlines: vec![Inline::marked("bold", bold)]
                },
                Block::paragraph("mid"),
                Block::Paragraph {
                    inlines: vec![Inline::marked(" run", bold)]
                },
            ]
        );
    }

    #[test]
    fn test_to_html_paragraph_with_marks() {
        let doc = Document::new(vec![Block::Paragraph {
            inlines: vec![
                Inline::plain("a "),
                Inline::marked(
                    "b",
                    Marks {
                        bold: true,
                        ..Marks::NONE
                    },
                ),
            ],
        }]);
        assert_eq!(doc.to_html(), "<p>a <strong>b</strong></p>");
    }

    #[test]
    fn test_to_html_code_block_escapes_and_tags_language() {
        let doc = Document::new(vec![Block::CodeBlock {
            language: Some("rust".to_string()),
            text: "if a < b {}".to_string(),
        }]);
        assert_eq!(
            doc.to_html(),
            "<pre><code class=\"language-rust\">if a &lt; b {}</code></pre>"
        );
    }

    #[test]
    fn test_to_html_nested_list() {
        let doc = Document::new(vec![Block::BulletList {
            items: vec![ListItem {
                blocks: vec![Block::paragraph("one")],
            }],
        }]);
        assert_eq!(doc.to_html(), "<ul><li><p>one</p></li></ul>");
    }

    #[test]
    fn test_empty_document_is_single_empty_paragraph() {
        let doc = Document::empty();
        assert_eq!(doc.blocks.len(), 1);
        assert!(doc.blocks[0].is_empty_textblock());
    }
}
