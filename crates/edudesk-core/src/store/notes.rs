//! Note catalog store with optimistic mutations.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::{Error, RejectionCode, Result};
use crate::models::{NoteDraft, NoteId, NoteRecord};
use crate::store::{CollectionState, Keyed, PendingKind};

impl Keyed for NoteRecord {
    type Key = NoteId;

    fn key(&self) -> &NoteId {
        &self.id
    }
}

/// Server-side listing filters for a full load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub subject: Option<String>,
    pub department: Option<String>,
    /// Restrict to the signed-in principal's own uploads
    pub mine: bool,
}

/// The backend operations the note store needs; implemented by the real
/// `ApiClient` and by fakes in tests.
///
/// Implementations are single-attempt primitives. `delete_note` must obtain
/// a force-refreshed credential before issuing the call.
#[async_trait]
pub trait NoteBackend: Send + Sync {
    async fn list_notes(&self, filter: &NoteFilter) -> Result<Vec<NoteRecord>>;

    async fn create_note(&self, draft: &NoteDraft) -> Result<NoteRecord>;

    async fn delete_note(&self, id: &NoteId) -> Result<()>;

    async fn list_favorites(&self) -> Result<Vec<NoteRecord>>;

    async fn add_favorite(&self, id: &NoteId) -> Result<()>;

    async fn remove_favorite(&self, id: &NoteId) -> Result<()>;
}

/// Outcome of a [`NoteStore::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The response was applied wholesale
    Applied { count: usize },
    /// A newer load started while this one was in flight; its response
    /// (or failure) was discarded
    Superseded,
}

/// In-memory note collection with optimistic add/remove/favorite-toggle.
///
/// Single logical writer; internal locks are never held across an await, so
/// the store is safe on a current-thread runtime and under out-of-order
/// network completions.
pub struct NoteStore<B> {
    backend: Arc<B>,
    state: Mutex<CollectionState<NoteRecord>>,
    favorites: Mutex<HashSet<NoteId>>,
    load_seq: AtomicU64,
    favorites_seq: AtomicU64,
    revision: AtomicU64,
}

impl<B: NoteBackend> NoteStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            state: Mutex::new(CollectionState::new()),
            favorites: Mutex::new(HashSet::new()),
            load_seq: AtomicU64::new(0),
            favorites_seq: AtomicU64::new(0),
            revision: AtomicU64::new(0),
        }
    }

    /// Full refresh. Concurrent loads serialize logically: the last-started
    /// load wins, and an earlier in-flight response arriving later is
    /// detected by sequence comparison and discarded.
    pub async fn load(&self, filter: &NoteFilter) -> Result<LoadOutcome> {
        let sequence = self.load_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.backend.list_notes(filter).await;

        if self.load_seq.load(Ordering::SeqCst) != sequence {
            tracing::debug!(sequence, "discarding superseded load response");
            return Ok(LoadOutcome::Superseded);
        }

        let items = result?;
        let count = items.len();
        {
            let mut state = lock_recovering(&self.state);
            state.replace_all(items);
        }
        self.touch();
        Ok(LoadOutcome::Applied { count })
    }

    /// Refresh the derived favorites set (and return the full records for
    /// display). Same last-started-wins fencing as [`Self::load`].
    pub async fn load_favorites(&self) -> Result<Vec<NoteRecord>> {
        let sequence = self.favorites_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.backend.list_favorites().await;

        if self.favorites_seq.load(Ordering::SeqCst) != sequence {
            tracing::debug!(sequence, "discarding superseded favorites response");
            return Ok(Vec::new());
        }

        let records = result?;
        {
            let mut favorites = lock_recovering(&self.favorites);
            *favorites = records.iter().map(|record| record.id.clone()).collect();
        }
        self.touch();
        Ok(records)
    }

    /// Optimistically create a note: a placeholder entry appears at the front
    /// immediately and is replaced in place by the server-confirmed record.
    ///
    /// Draft validation happens first; an invalid draft fails with the same
    /// rejection codes the server would use and issues no network call.
    pub async fn optimistic_add(
        &self,
        draft: NoteDraft,
        uploader_email: Option<String>,
    ) -> Result<NoteRecord> {
        draft.validate()?;

        let placeholder = draft.placeholder(uploader_email);
        let temp_id = placeholder.id.clone();
        {
            let mut state = lock_recovering(&self.state);
            state.mark_pending(&temp_id, PendingKind::Create)?;
            if let Err(error) = state.insert_front(placeholder) {
                state.clear_pending(&temp_id);
                return Err(error);
            }
        }
        self.touch();

        match self.backend.create_note(&draft).await {
            Ok(confirmed) => {
                {
                    let mut state = lock_recovering(&self.state);
                    if state.pending_kind(&temp_id) == Some(PendingKind::Create) {
                        state.clear_pending(&temp_id);
                        state.confirm_replace(&temp_id, confirmed.clone());
                    } else {
                        tracing::warn!(%temp_id, "create confirmation without matching pending entry");
                    }
                }
                self.touch();
                Ok(confirmed)
            }
            Err(error) => {
                {
                    let mut state = lock_recovering(&self.state);
                    if state.pending_kind(&temp_id) == Some(PendingKind::Create) {
                        state.clear_pending(&temp_id);
                        state.remove(&temp_id);
                    }
                }
                self.touch();
                tracing::warn!(%temp_id, %error, "rolled back optimistic create");
                Err(error)
            }
        }
    }

    /// Optimistically delete a note: the entry disappears immediately and is
    /// reinserted at its original position if the server rejects the delete.
    pub async fn optimistic_remove(&self, id: &NoteId) -> Result<()> {
        let (index, retained) = {
            let mut state = lock_recovering(&self.state);
            state.mark_pending(id, PendingKind::Delete)?;
            match state.remove(id) {
                Some(removed) => removed,
                None => {
                    state.clear_pending(id);
                    return Err(Error::remote(RejectionCode::NoteNotFound, "Note not found"));
                }
            }
        };
        self.touch();

        match self.backend.delete_note(id).await {
            Ok(()) => {
                {
                    let mut state = lock_recovering(&self.state);
                    state.clear_pending(id);
                }
                self.touch();
                Ok(())
            }
            Err(error) => {
                {
                    let mut state = lock_recovering(&self.state);
                    if state.pending_kind(id) == Some(PendingKind::Delete) {
                        state.clear_pending(id);
                        state.insert_at(index, retained);
                    }
                }
                self.touch();
                tracing::warn!(%id, %error, "rolled back optimistic delete");
                Err(error)
            }
        }
    }

    /// Optimistically flip favorite membership, issuing the matching
    /// add-or-remove call and flipping back on failure. Returns the new
    /// membership on success.
    pub async fn optimistic_toggle_favorite(&self, id: &NoteId) -> Result<bool> {
        let now_favorite = {
            let mut state = lock_recovering(&self.state);
            state.mark_pending(id, PendingKind::Toggle)?;
            drop(state);

            let mut favorites = lock_recovering(&self.favorites);
            if favorites.remove(id) {
                false
            } else {
                favorites.insert(id.clone());
                true
            }
        };
        self.touch();

        let result = if now_favorite {
            self.backend.add_favorite(id).await
        } else {
            self.backend.remove_favorite(id).await
        };

        match result {
            Ok(()) => {
                lock_recovering(&self.state).clear_pending(id);
                self.touch();
                Ok(now_favorite)
            }
            Err(error) => {
                {
                    let mut favorites = lock_recovering(&self.favorites);
                    if now_favorite {
                        favorites.remove(id);
                    } else {
                        favorites.insert(id.clone());
                    }
                }
                lock_recovering(&self.state).clear_pending(id);
                self.touch();
                tracing::warn!(%id, %error, "rolled back favorite toggle");
                Err(error)
            }
        }
    }

    // ------------------------------------------------------------------
    // Snapshot read model
    // ------------------------------------------------------------------

    pub fn notes(&self) -> Vec<NoteRecord> {
        lock_recovering(&self.state).entries().to_vec()
    }

    pub fn get(&self, id: &NoteId) -> Option<NoteRecord> {
        lock_recovering(&self.state).get(id).cloned()
    }

    /// Client-side filtering for the view layer: case-insensitive substring
    /// search plus exact subject/department matches.
    pub fn filtered(
        &self,
        query: Option<&str>,
        subject: Option<&str>,
        department: Option<&str>,
    ) -> Vec<NoteRecord> {
        lock_recovering(&self.state)
            .entries()
            .iter()
            .filter(|note| query.is_none_or(|q| note.matches_query(q)))
            .filter(|note| subject.is_none_or(|s| note.subject.eq_ignore_ascii_case(s)))
            .filter(|note| department.is_none_or(|d| note.department.eq_ignore_ascii_case(d)))
            .cloned()
            .collect()
    }

    pub fn is_pending(&self, id: &NoteId) -> bool {
        lock_recovering(&self.state).is_pending(id)
    }

    pub fn is_favorite(&self, id: &NoteId) -> bool {
        lock_recovering(&self.favorites).contains(id)
    }

    pub fn favorite_ids(&self) -> Vec<NoteId> {
        lock_recovering(&self.favorites).iter().cloned().collect()
    }

    /// Monotonic change counter; bumps on every visible state change so a
    /// view can cheaply detect staleness.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
