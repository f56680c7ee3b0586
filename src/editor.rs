//! Minimal host for the active rich-text document: current document, caret,
//! and an undo history of whole-document transactions.
//!
//! The real editor widget lives in the UI layer; the pipeline only needs a
//! place to read the caret from and commit a spliced document to. The shared
//! slot is an `Option` because the editor comes up after the rest of the
//! application — a generation request that settles before then fails with
//! `EditorUninitialized` instead of touching anything.

use std::sync::{Arc, Mutex};

use crate::document::{compute_splice, Caret, Document, Fragment};

pub struct Editor {
    document: Document,
    caret: Caret,
    history: Vec<(Document, Caret)>,
}

impl Editor {
    pub fn new() -> Self {
        Self::with_document(Document::empty(), Caret::start())
    }

    pub fn with_document(document: Document, caret: Caret) -> Self {
        Self {
            document,
            caret,
            history: Vec::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn caret(&self) -> Caret {
        self.caret
    }

    pub fn set_caret(&mut self, caret: Caret) {
        self.caret = caret;
    }

    /// Replace the document as a single transaction: exactly one undo step,
    /// however much changed.
    pub fn commit(&mut self, document: Document, caret: Caret) {
        let previous = std::mem::replace(&mut self.document, document);
        self.history.push((previous, self.caret));
        self.caret = caret;
    }

    /// Splice a fragment at the caret (insertion plus empty-paragraph
    /// cleanup) and commit the result as one transaction.
    pub fn insert_fragment(&mut self, fragment: &Fragment) {
        let splice = compute_splice(&self.document, self.caret, fragment);
        self.commit(splice.document, splice.caret);
    }

    /// Pop the last transaction. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some((document, caret)) => {
                self.document = document;
                self.caret = caret;
                true
            }
            None => false,
        }
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

/// Late-initialized editor slot shared between the UI and the pipeline.
pub type EditorHandle = Arc<Mutex<Option<Editor>>>;

/// Empty slot: the editor is not up yet.
pub fn empty_handle() -> EditorHandle {
    Arc::new(Mutex::new(None))
}

/// Slot holding a fresh editor on an empty document.
pub fn handle_with_editor() -> EditorHandle {
    Arc::new(Mutex::new(Some(Editor::new())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Block;

    #[test]
    fn test_insert_fragment_is_one_undo_step() {
        let mut editor = Editor::new();
        let original = editor.document().clone();

        let fragment = Fragment::new(vec![
            Block::paragraph("first"),
            Block::paragraph("second"),
        ]);
        editor.insert_fragment(&fragment);
        assert_eq!(editor.document().blocks.len(), 2);

        // Splice plus cleanup undo together.
        assert!(editor.undo());
        assert_eq!(editor.document(), &original);
        assert!(!editor.undo());
    }

    #[test]
    fn test_caret_moves_to_fragment_end() {
        let mut editor = Editor::new();
        editor.insert_fragment(&Fragment::new(vec![Block::paragraph("abc")]));
        assert_eq!(editor.caret(), Caret::new(0, 3));
    }

    #[test]
    fn test_undo_restores_caret() {
        let mut editor = Editor::with_document(
            Document::new(vec![Block::paragraph("seed")]),
            Caret::new(0, 4),
        );
        editor.insert_fragment(&Fragment::new(vec![Block::paragraph("x")]));
        editor.undo();
        assert_eq!(editor.caret(), Caret::new(0, 4));
    }
}
