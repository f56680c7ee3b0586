//! The note store: single source of truth for the note collection and
//! selection, synchronized against the remote CRUD API with optimistic local
//! updates and rollback on failure.
//!
//! The store is an explicitly constructed container — the composing
//! application owns its lifecycle and hands it to whoever needs it. Every
//! mutation moves the in-memory state between consistent snapshots
//! synchronously; network effects land in one follow-up mutation when the
//! request settles. Locks are never held across awaits.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::{temp_id, Note};

/// Errors surfaced by store operations. All non-fatal: after any of them the
/// state is the last-known-good snapshot and the application stays usable.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to fetch notes: {0}")]
    FetchFailed(#[source] ApiError),
    #[error("failed to save note: {0}")]
    SaveFailed(#[source] ApiError),
    #[error("failed to delete note: {0}")]
    DeleteFailed(#[source] ApiError),
    #[error("an operation is already in flight for note {0}")]
    OperationInFlight(String),
}

/// Change notifications for store observers (the UI re-render trigger).
/// `Error` events carry the user-facing message of a transient notification.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    NotesReplaced,
    NoteUpserted(String),
    NoteRemoved(String),
    SelectionChanged,
    Error(String),
}

/// A scored search match over the local collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub score: f32,
}

// Durable subset of the state, persisted across reloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    notes: Vec<Note>,
    is_sidebar_open: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            notes: Vec::new(),
            is_sidebar_open: true,
        }
    }
}

#[derive(Debug, Clone)]
struct StoreState {
    notes: Vec<Note>,
    selected: Option<Note>,
    has_unsaved_changes: bool,
    search_query: String,
    can_edit: bool,
    is_sidebar_open: bool,
}

pub struct NoteStore {
    api: ApiClient,
    state: RwLock<StoreState>,
    in_flight: Mutex<HashSet<String>>,
    snapshot_path: Option<PathBuf>,
    events: broadcast::Sender<StoreEvent>,
}

impl NoteStore {
    /// Build a store backed by the given API client. With `snapshot_path`
    /// set, the persisted snapshot seeds the initial state before any
    /// network fetch, and every notes/sidebar mutation rewrites it.
    pub fn new(api: ApiClient, snapshot_path: Option<PathBuf>) -> Self {
        let snapshot = snapshot_path
            .as_deref()
            .map(load_snapshot)
            .unwrap_or_default();
        let (events, _) = broadcast::channel(64);
        Self {
            api,
            state: RwLock::new(StoreState {
                notes: snapshot.notes,
                selected: None,
                has_unsaved_changes: false,
                search_query: String::new(),
                can_edit: true,
                is_sidebar_open: snapshot.is_sidebar_open,
            }),
            in_flight: Mutex::new(HashSet::new()),
            snapshot_path,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // ── Read accessors ─────────────────────────────────────────────────────

    pub fn notes(&self) -> Vec<Note> {
        self.state.read().expect("store state lock").notes.clone()
    }

    pub fn selected_note(&self) -> Option<Note> {
        self.state.read().expect("store state lock").selected.clone()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.state.read().expect("store state lock").has_unsaved_changes
    }

    pub fn search_query(&self) -> String {
        self.state
            .read()
            .expect("store state lock")
            .search_query
            .clone()
    }

    pub fn can_edit(&self) -> bool {
        self.state.read().expect("store state lock").can_edit
    }

    pub fn is_sidebar_open(&self) -> bool {
        self.state.read().expect("store state lock").is_sidebar_open
    }

    // ── Local mutators ─────────────────────────────────────────────────────

    /// Append a note to the collection (used when constructing a new unsaved
    /// draft).
    pub fn add_note(&self, note: Note) {
        let id = note.id.clone();
        {
            let mut state = self.state.write().expect("store state lock");
            state.notes.push(note);
            self.persist(&state);
        }
        self.emit(StoreEvent::NoteUpserted(id));
    }

    /// Replace the note with a matching id, in the collection and in the
    /// selection. Pure local mutation: no network, and the unsaved flag is
    /// the caller's to set.
    pub fn update_note(&self, updated: Note) {
        {
            let mut state = self.state.write().expect("store state lock");
            for note in &mut state.notes {
                if note.id == updated.id {
                    *note = updated.clone();
                }
            }
            if state
                .selected
                .as_ref()
                .is_some_and(|selected| selected.id == updated.id)
            {
                state.selected = Some(updated.clone());
            }
            self.persist(&state);
        }
        self.emit(StoreEvent::NoteUpserted(updated.id));
    }

    /// Remove a note from the local collection, clearing the selection if it
    /// pointed at it.
    pub fn delete_note(&self, id: &str) {
        {
            let mut state = self.state.write().expect("store state lock");
            state.notes.retain(|note| note.id != id);
            if state
                .selected
                .as_ref()
                .is_some_and(|selected| selected.id == id)
            {
                state.selected = None;
            }
            self.persist(&state);
        }
        self.emit(StoreEvent::NoteRemoved(id.to_string()));
    }

    /// Set the selection. Checking the unsaved flag before switching away is
    /// the caller's policy; the store does not block selection.
    pub fn select_note(&self, note: Option<Note>) {
        {
            let mut state = self.state.write().expect("store state lock");
            state.selected = note;
        }
        self.emit(StoreEvent::SelectionChanged);
    }

    pub fn set_has_unsaved_changes(&self, value: bool) {
        let mut state = self.state.write().expect("store state lock");
        state.has_unsaved_changes = value;
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        let mut state = self.state.write().expect("store state lock");
        state.search_query = query.into();
    }

    pub fn toggle_can_edit(&self) {
        let mut state = self.state.write().expect("store state lock");
        state.can_edit = !state.can_edit;
    }

    pub fn toggle_sidebar(&self) {
        let mut state = self.state.write().expect("store state lock");
        state.is_sidebar_open = !state.is_sidebar_open;
        self.persist(&state);
    }

    // ── Search ─────────────────────────────────────────────────────────────

    /// Score notes against a query: title hits weigh 50, content hits 10.
    /// Top 20, best first. Empty query matches nothing.
    pub fn search_notes(&self, query: &str) -> Vec<SearchHit> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let query_lower = query.to_lowercase();

        let state = self.state.read().expect("store state lock");
        let mut hits: Vec<SearchHit> = state
            .notes
            .iter()
            .filter_map(|note| {
                let mut score = 0.0f32;
                if note.title.to_lowercase().contains(&query_lower) {
                    score += 50.0;
                }
                if note.content.to_lowercase().contains(&query_lower) {
                    score += 10.0;
                }
                (score > 0.0).then(|| SearchHit {
                    id: note.id.clone(),
                    title: note.title.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(20);
        hits
    }

    // ── Synchronized operations ────────────────────────────────────────────

    /// Replace the collection wholesale from the remote API. On failure the
    /// prior state is untouched; nothing is retried.
    pub async fn fetch_notes(&self, user_id: &str) -> Result<(), StoreError> {
        match self.api.fetch_notes(user_id).await {
            Ok(notes) => {
                let count = notes.len();
                {
                    let mut state = self.state.write().expect("store state lock");
                    state.notes = notes;
                    self.persist(&state);
                }
                info!(count, "fetched notes");
                self.emit(StoreEvent::NotesReplaced);
                Ok(())
            }
            Err(e) => {
                warn!("failed to fetch notes: {}", e);
                let error = StoreError::FetchFailed(e);
                self.emit(StoreEvent::Error(error.to_string()));
                Err(error)
            }
        }
    }

    /// Save the selected note: update in place when it carries a stable id,
    /// create (and promote the temporary id) otherwise. No selection is a
    /// no-op. Returns the server's representation of the saved note.
    pub async fn save_note(&self, user_id: &str) -> Result<Option<Note>, StoreError> {
        let Some(selected) = self.selected_note() else {
            return Ok(None);
        };
        let _guard = self.begin_operation(&selected.id)?;

        if selected.is_temporary() {
            self.create_selected(user_id, selected).await.map(Some)
        } else {
            self.update_selected(selected).await.map(Some)
        }
    }

    /// Delete the selected note remotely and locally. No selection, or a
    /// temporary-id selection, is a no-op — drafts are discarded by
    /// deselection, not deletion.
    pub async fn remove_note(&self) -> Result<(), StoreError> {
        let Some(selected) = self.selected_note() else {
            return Ok(());
        };
        if selected.is_temporary() {
            return Ok(());
        }
        let _guard = self.begin_operation(&selected.id)?;

        // Optimistically drop it before the network round trip.
        {
            let mut state = self.state.write().expect("store state lock");
            state.notes.retain(|note| note.id != selected.id);
            state.selected = None;
            state.has_unsaved_changes = false;
            self.persist(&state);
        }
        self.emit(StoreEvent::NoteRemoved(selected.id.clone()));

        match self.api.delete_note(&selected.id).await {
            Ok(()) => {
                info!(id = %selected.id, "note deleted");
                Ok(())
            }
            Err(e) => {
                // Reinsert at the front; the original position is not kept.
                {
                    let mut state = self.state.write().expect("store state lock");
                    state.notes.insert(0, selected.clone());
                    state.selected = Some(selected.clone());
                    self.persist(&state);
                }
                warn!(id = %selected.id, "delete failed, note restored: {}", e);
                let error = StoreError::DeleteFailed(e);
                self.emit(StoreEvent::NoteUpserted(selected.id.clone()));
                self.emit(StoreEvent::Error(error.to_string()));
                Err(error)
            }
        }
    }

    // ── Save state machine halves ──────────────────────────────────────────

    async fn update_selected(&self, selected: Note) -> Result<Note, StoreError> {
        // Snapshot the stored copy for rollback, then replace optimistically.
        let original = {
            let mut state = self.state.write().expect("store state lock");
            let original = state
                .notes
                .iter()
                .find(|note| note.id == selected.id)
                .cloned();
            for note in &mut state.notes {
                if note.id == selected.id {
                    *note = selected.clone();
                }
            }
            state.has_unsaved_changes = false;
            self.persist(&state);
            original
        };
        self.emit(StoreEvent::NoteUpserted(selected.id.clone()));

        match self
            .api
            .update_note(&selected.id, &selected.title, &selected.content)
            .await
        {
            Ok(server_note) => {
                // The server is authoritative for any server-side fields.
                {
                    let mut state = self.state.write().expect("store state lock");
                    for note in &mut state.notes {
                        if note.id == server_note.id {
                            *note = server_note.clone();
                        }
                    }
                    state.selected = Some(server_note.clone());
                    self.persist(&state);
                }
                info!(id = %server_note.id, "note updated");
                self.emit(StoreEvent::NoteUpserted(server_note.id.clone()));
                Ok(server_note)
            }
            Err(e) => {
                // Roll back to the pre-optimistic snapshot. The edit is
                // unsaved again, so the flag comes back with it.
                {
                    let mut state = self.state.write().expect("store state lock");
                    if let Some(original) = &original {
                        for note in &mut state.notes {
                            if note.id == original.id {
                                *note = original.clone();
                            }
                        }
                        state.selected = Some(original.clone());
                    }
                    state.has_unsaved_changes = true;
                    self.persist(&state);
                }
                warn!(id = %selected.id, "update failed, rolled back: {}", e);
                let error = StoreError::SaveFailed(e);
                self.emit(StoreEvent::NoteUpserted(selected.id.clone()));
                self.emit(StoreEvent::Error(error.to_string()));
                Err(error)
            }
        }
    }

    async fn create_selected(&self, user_id: &str, draft: Note) -> Result<Note, StoreError> {
        // Materialize the optimistic entry under a fresh temporary id, and
        // guard that id too so a second save of the same draft can't
        // double-create. Same-millisecond mint can reproduce the draft's own
        // id, which the caller already holds.
        let temp = Note::new(temp_id(), draft.title.clone(), draft.content.clone());
        let _temp_guard = if temp.id != draft.id {
            Some(self.begin_operation(&temp.id)?)
        } else {
            None
        };
        {
            let mut state = self.state.write().expect("store state lock");
            state.notes.push(temp.clone());
            state.selected = Some(temp.clone());
            state.has_unsaved_changes = false;
            self.persist(&state);
        }
        self.emit(StoreEvent::NoteUpserted(temp.id.clone()));

        match self
            .api
            .create_note(user_id, &temp.title, &temp.content)
            .await
        {
            Ok(server_note) => {
                // Promote: the temporary entry becomes the server's note.
                {
                    let mut state = self.state.write().expect("store state lock");
                    for note in &mut state.notes {
                        if note.id == temp.id {
                            *note = server_note.clone();
                        }
                    }
                    state.selected = Some(server_note.clone());
                    self.persist(&state);
                }
                info!(id = %server_note.id, "note created");
                self.emit(StoreEvent::NoteUpserted(server_note.id.clone()));
                Ok(server_note)
            }
            Err(e) => {
                // The draft never existed remotely: remove it and clear the
                // selection.
                {
                    let mut state = self.state.write().expect("store state lock");
                    state.notes.retain(|note| note.id != temp.id);
                    state.selected = None;
                    self.persist(&state);
                }
                warn!("create failed, temporary entry removed: {}", e);
                let error = StoreError::SaveFailed(e);
                self.emit(StoreEvent::NoteRemoved(temp.id.clone()));
                self.emit(StoreEvent::Error(error.to_string()));
                Err(error)
            }
        }
    }

    // ── Internals ──────────────────────────────────────────────────────────

    fn begin_operation(&self, id: &str) -> Result<OperationGuard<'_>, StoreError> {
        let mut in_flight = self.in_flight.lock().expect("in-flight set lock");
        if !in_flight.insert(id.to_string()) {
            return Err(StoreError::OperationInFlight(id.to_string()));
        }
        Ok(OperationGuard {
            store: self,
            id: id.to_string(),
        })
    }

    fn persist(&self, state: &StoreState) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        let snapshot = Snapshot {
            notes: state.notes.clone(),
            is_sidebar_open: state.is_sidebar_open,
        };
        match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    warn!("failed to write store snapshot: {}", e);
                }
            }
            Err(e) => warn!("failed to encode store snapshot: {}", e),
        }
    }

    fn emit(&self, event: StoreEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

/// Releases the per-note in-flight reservation when the operation settles.
struct OperationGuard<'a> {
    store: &'a NoteStore,
    id: String,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.store
            .in_flight
            .lock()
            .expect("in-flight set lock")
            .remove(&self.id);
    }
}

fn load_snapshot(path: &Path) -> Snapshot {
    if path.exists() {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    } else {
        Snapshot::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> NoteStore {
        let api = ApiClient::new("http://127.0.0.1:9/").expect("client");
        NoteStore::new(api, None)
    }

    #[test]
    fn test_update_note_replaces_collection_and_selection() {
        let store = store();
        store.add_note(Note::new("n1", "Old", ""));
        store.select_note(Some(Note::new("n1", "Old", "")));

        store.update_note(Note::new("n1", "New", "<p>x</p>"));

        assert_eq!(store.notes()[0].title, "New");
        assert_eq!(store.selected_note().expect("selected").title, "New");
        // Pure local mutation: the caller owns the unsaved flag.
        assert!(!store.has_unsaved_changes());
    }

    #[test]
    fn test_delete_note_clears_matching_selection() {
        let store = store();
        store.add_note(Note::new("n1", "A", ""));
        store.select_note(Some(Note::new("n1", "A", "")));

        store.delete_note("n1");

        assert!(store.notes().is_empty());
        assert!(store.selected_note().is_none());
    }

    #[test]
    fn test_toggles() {
        let store = store();
        assert!(store.can_edit());
        assert!(store.is_sidebar_open());
        store.toggle_can_edit();
        store.toggle_sidebar();
        assert!(!store.can_edit());
        assert!(!store.is_sidebar_open());
    }

    #[test]
    fn test_search_scores_title_over_content() {
        let store = store();
        store.add_note(Note::new("n1", "Rust notes", "<p>other</p>"));
        store.add_note(Note::new("n2", "Misc", "<p>rust snippet</p>"));
        store.add_note(Note::new("n3", "Unrelated", "<p>nothing</p>"));

        let hits = store.search_notes("rust");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "n1");
        assert_eq!(hits[0].score, 50.0);
        assert_eq!(hits[1].id, "n2");
        assert_eq!(hits[1].score, 10.0);
    }

    #[test]
    fn test_search_empty_query_matches_nothing() {
        let store = store();
        store.add_note(Note::new("n1", "A", ""));
        assert!(store.search_notes("  ").is_empty());
    }

    #[test]
    fn test_snapshot_seeds_next_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("note-storage.json");
        let api = ApiClient::new("http://127.0.0.1:9/").expect("client");

        let first = NoteStore::new(api.clone(), Some(path.clone()));
        first.add_note(Note::new("n1", "Persisted", "<p>a</p>"));
        first.toggle_sidebar();

        let second = NoteStore::new(api, Some(path));
        assert_eq!(second.notes(), vec![Note::new("n1", "Persisted", "<p>a</p>")]);
        assert!(!second.is_sidebar_open());
    }

    #[test]
    fn test_snapshot_default_when_file_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let api = ApiClient::new("http://127.0.0.1:9/").expect("client");
        let store = NoteStore::new(api, Some(dir.path().join("missing.json")));
        assert!(store.notes().is_empty());
        assert!(store.is_sidebar_open());
    }

    #[tokio::test]
    async fn test_remove_note_is_noop_for_temporary_selection() {
        let store = store();
        let draft = Note::draft();
        store.select_note(Some(draft.clone()));

        // Never touches the network, so the unroutable client is fine.
        store.remove_note().await.expect("no-op");

        assert_eq!(store.selected_note(), Some(draft));
    }

    #[tokio::test]
    async fn test_save_note_is_noop_without_selection() {
        let store = store();
        let saved = store.save_note("u1").await.expect("no-op");
        assert!(saved.is_none());
        assert!(store.notes().is_empty());
    }
}
