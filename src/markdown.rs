//! Generated-text → document-fragment conversion.
//!
//! The generation service returns markdown-equivalent text. This module walks
//! pulldown-cmark events (the same parser as rustdoc) into the block/inline
//! tree from [`crate::document`], tracking mark depth counters for nesting
//! and a container stack for lists and blockquotes.
//!
//! [`clean_code_blocks`] applies the trailing-line workaround: the service
//! consistently emits one artifact line at the end of fenced code blocks, so
//! every multi-line code block drops its last line.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::document::{Block, Fragment, Inline, ListItem, Marks};

/// Parse markdown text into a document fragment.
pub fn parse_fragment(text: &str) -> Fragment {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(text, options);

    let mut builder = FragmentBuilder::default();
    for event in parser {
        builder.handle(event);
    }
    builder.finish()
}

/// Drop the trailing line of every code block that has more than one line.
/// Single-line blocks are left untouched.
pub fn clean_code_blocks(fragment: &mut Fragment) {
    for block in &mut fragment.blocks {
        clean_block(block);
    }
}

fn clean_block(block: &mut Block) {
    match block {
        Block::CodeBlock { text, .. } => *text = strip_trailing_line(text),
        Block::BulletList { items } | Block::OrderedList { items, .. } => {
            for item in items {
                for block in &mut item.blocks {
                    clean_block(block);
                }
            }
        }
        Block::Blockquote { blocks } => {
            for block in blocks {
                clean_block(block);
            }
        }
        _ => {}
    }
}

fn strip_trailing_line(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() > 1 {
        lines[..lines.len() - 1].join("\n")
    } else {
        text.to_string()
    }
}

// ── Event walk ─────────────────────────────────────────────────────────────

/// Open list/blockquote/item nesting.
enum Container {
    Blockquote { blocks: Vec<Block> },
    BulletList { items: Vec<ListItem> },
    OrderedList { start: u64, items: Vec<ListItem> },
    Item { blocks: Vec<Block> },
}

/// Open text block kind, if any.
enum TextBlock {
    Paragraph,
    Heading(u8),
}

#[derive(Default)]
struct FragmentBuilder {
    blocks: Vec<Block>,
    containers: Vec<Container>,
    textblock: Option<TextBlock>,
    inlines: Vec<Inline>,
    code: Option<(Option<String>, String)>,
    bold_depth: u32,
    italic_depth: u32,
    strike_depth: u32,
}

impl FragmentBuilder {
    fn handle(&mut self, event: Event<'_>) {
        match event {
            // ── Block-level tags ──
            Event::Start(Tag::Paragraph) => self.open_textblock(TextBlock::Paragraph),
            Event::End(TagEnd::Paragraph) => self.flush_textblock(),

            Event::Start(Tag::Heading { level, .. }) => {
                self.open_textblock(TextBlock::Heading(heading_level_to_u8(level)))
            }
            Event::End(TagEnd::Heading(_)) => self.flush_textblock(),

            Event::Start(Tag::CodeBlock(kind)) => {
                self.flush_textblock();
                let language = match kind {
                    CodeBlockKind::Fenced(info) => {
                        let lang = info.split_whitespace().next().unwrap_or("").to_string();
                        (!lang.is_empty()).then_some(lang)
                    }
                    CodeBlockKind::Indented => None,
                };
                self.code = Some((language, String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((language, mut text)) = self.code.take() {
                    // The parser leaves the closing-fence newline on the text.
                    if text.ends_with('\n') {
                        text.pop();
                    }
                    self.push_block(Block::CodeBlock { language, text });
                }
            }

            Event::Start(Tag::List(first_item)) => {
                self.flush_textblock();
                self.containers.push(match first_item {
                    Some(start) => Container::OrderedList {
                        start,
                        items: Vec::new(),
                    },
                    None => Container::BulletList { items: Vec::new() },
                });
            }
            Event::End(TagEnd::List(_)) => {
                self.flush_textblock();
                match self.containers.pop() {
                    Some(Container::BulletList { items }) => {
                        self.push_block(Block::BulletList { items })
                    }
                    Some(Container::OrderedList { start, items }) => {
                        self.push_block(Block::OrderedList { start, items })
                    }
                    _ => {}
                }
            }

            Event::Start(Tag::Item) => {
                self.containers.push(Container::Item { blocks: Vec::new() })
            }
            Event::End(TagEnd::Item) => {
                // Tight list items carry bare text with no paragraph events.
                self.flush_textblock();
                if let Some(Container::Item { blocks }) = self.containers.pop() {
                    match self.containers.last_mut() {
                        Some(Container::BulletList { items })
                        | Some(Container::OrderedList { items, .. }) => {
                            items.push(ListItem { blocks })
                        }
                        _ => self.blocks.extend(blocks),
                    }
                }
            }

            Event::Start(Tag::BlockQuote(_)) => {
                self.flush_textblock();
                self.containers
                    .push(Container::Blockquote { blocks: Vec::new() });
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                self.flush_textblock();
                if let Some(Container::Blockquote { blocks }) = self.containers.pop() {
                    self.push_block(Block::Blockquote { blocks });
                }
            }

            Event::Rule => {
                self.flush_textblock();
                self.push_block(Block::Rule);
            }

            // ── Inline tags ──
            Event::Start(Tag::Strong) => self.bold_depth += 1,
            Event::End(TagEnd::Strong) => self.bold_depth = self.bold_depth.saturating_sub(1),

            Event::Start(Tag::Emphasis) => self.italic_depth += 1,
            Event::End(TagEnd::Emphasis) => {
                self.italic_depth = self.italic_depth.saturating_sub(1)
            }

            Event::Start(Tag::Strikethrough) => self.strike_depth += 1,
            Event::End(TagEnd::Strikethrough) => {
                self.strike_depth = self.strike_depth.saturating_sub(1)
            }

            // Render link/image text, skip the URL.
            Event::Start(Tag::Link { .. }) | Event::Start(Tag::Image { .. }) => {}
            Event::End(TagEnd::Link) | Event::End(TagEnd::Image) => {}

            // ── Text content ──
            Event::Text(cow) => {
                if let Some((_, code)) = self.code.as_mut() {
                    code.push_str(cow.as_ref());
                } else {
                    let marks = self.current_marks();
                    self.push_inline(Inline::marked(cow.as_ref(), marks));
                }
            }

            Event::Code(cow) => {
                let marks = Marks {
                    code: true,
                    ..self.current_marks()
                };
                self.push_inline(Inline::marked(cow.as_ref(), marks));
            }

            Event::SoftBreak => self.push_inline(Inline::plain(" ")),
            Event::HardBreak => self.push_inline(Inline::HardBreak),

            // HTML passthrough, footnotes, etc. — keep the text.
            Event::Html(cow) | Event::InlineHtml(cow) => {
                let marks = self.current_marks();
                self.push_inline(Inline::marked(cow.as_ref(), marks));
            }

            _ => {}
        }
    }

    fn finish(mut self) -> Fragment {
        self.flush_textblock();
        Fragment::new(self.blocks)
    }

    fn current_marks(&self) -> Marks {
        Marks {
            bold: self.bold_depth > 0,
            italic: self.italic_depth > 0,
            code: false,
            strike: self.strike_depth > 0,
        }
    }

    fn open_textblock(&mut self, kind: TextBlock) {
        self.flush_textblock();
        self.textblock = Some(kind);
    }

    /// Close the open text block, if any, and attach it to the innermost
    /// container (or the top level).
    fn flush_textblock(&mut self) {
        let Some(kind) = self.textblock.take() else {
            if !self.inlines.is_empty() {
                // Bare inline run (tight list item): wrap in a paragraph.
                let inlines = std::mem::take(&mut self.inlines);
                self.push_block(Block::Paragraph { inlines });
            }
            return;
        };
        let inlines = std::mem::take(&mut self.inlines);
        let block = match kind {
            TextBlock::Paragraph => Block::Paragraph { inlines },
            TextBlock::Heading(level) => Block::Heading { level, inlines },
        };
        self.push_block(block);
    }

    fn push_inline(&mut self, inline: Inline) {
        self.inlines.push(inline);
    }

    fn push_block(&mut self, block: Block) {
        match self.containers.last_mut() {
            Some(Container::Item { blocks }) | Some(Container::Blockquote { blocks }) => {
                blocks.push(block)
            }
            // A list container only receives finished items; anything else
            // that shows up here falls through to the top level.
            Some(Container::BulletList { .. }) | Some(Container::OrderedList { .. }) | None => {
                self.blocks.push(block)
            }
        }
    }
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
