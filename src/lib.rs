//! Headless core of the Memorious notes app: the note-synchronization store
//! (optimistic mutations with rollback against the remote CRUD API) and the
//! AI generation-splice pipeline (prompt → generated markdown → document
//! fragment → splice at the caret).
//!
//! The UI layer is external; it reads state through [`store::NoteStore`]
//! accessors, subscribes to its change events, and requests mutations through
//! the declared operations. Nothing here is fatal: every failed network call
//! rolls local state back to the last-known-good snapshot and surfaces a
//! transient error.

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub mod api;
pub mod document;
pub mod editor;
pub mod generate;
pub mod markdown;
pub mod store;

pub use api::{ApiClient, ApiError};
pub use generate::{GenerateError, GenerateRequest, Generator, Preferences};
pub use store::{NoteStore, StoreError, StoreEvent};

/// Prefix marking a client-generated id for a note that has not been
/// persisted remotely yet.
pub const TEMP_ID_PREFIX: &str = "temp-";

// A single note, as held in the store and exchanged with the remote API.
// `content` is the serialized rich-text document (see `document::Document`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
}

impl Note {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
        }
    }

    /// Fresh unsaved draft under a client-generated temporary id. The draft
    /// is promoted to a server-assigned stable id on its first successful
    /// save.
    pub fn draft() -> Self {
        Self::new(temp_id(), "", "")
    }

    /// Whether this note only exists locally (never persisted remotely).
    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}

/// Generate a temporary note id from the wall clock, e.g. `temp-1700000000000`.
pub fn temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_is_temporary() {
        let note = Note::draft();
        assert!(note.is_temporary());
        assert!(note.title.is_empty());
        assert!(note.content.is_empty());
    }

    #[test]
    fn test_server_id_is_not_temporary() {
        let note = Note::new("n1", "Draft", "");
        assert!(!note.is_temporary());
    }

    #[test]
    fn test_temp_id_prefix() {
        assert!(temp_id().starts_with(TEMP_ID_PREFIX));
    }
}
