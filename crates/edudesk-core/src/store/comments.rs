//! Per-note comment thread store.
//!
//! Same optimistic discipline as the note catalog: mutations apply locally
//! first, roll back on failure, and each comment id carries at most one
//! in-flight operation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::{Error, RejectionCode, Result};
use crate::models::{validate_comment_text, Comment, CommentId, NoteId};
use crate::store::{CollectionState, Keyed, PendingKind};
use crate::util::unix_timestamp_now;

impl Keyed for Comment {
    type Key = CommentId;

    fn key(&self) -> &CommentId {
        &self.id
    }
}

/// Backend operations for a note's comment thread.
#[async_trait]
pub trait CommentBackend: Send + Sync {
    async fn list_comments(&self, note_id: &NoteId) -> Result<Vec<Comment>>;

    async fn add_comment(&self, note_id: &NoteId, text: &str) -> Result<Comment>;

    async fn delete_comment(&self, comment_id: &CommentId) -> Result<()>;

    /// Returns the server's new like count.
    async fn like_comment(&self, comment_id: &CommentId) -> Result<u64>;
}

/// Comment thread for one note, newest first.
pub struct CommentStore<B> {
    backend: Arc<B>,
    note_id: NoteId,
    state: Mutex<CollectionState<Comment>>,
    load_seq: AtomicU64,
    revision: AtomicU64,
}

impl<B: CommentBackend> CommentStore<B> {
    pub fn new(backend: Arc<B>, note_id: NoteId) -> Self {
        Self {
            backend,
            note_id,
            state: Mutex::new(CollectionState::new()),
            load_seq: AtomicU64::new(0),
            revision: AtomicU64::new(0),
        }
    }

    pub fn note_id(&self) -> &NoteId {
        &self.note_id
    }

    /// Full refresh with last-started-wins fencing.
    pub async fn load(&self) -> Result<usize> {
        let sequence = self.load_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.backend.list_comments(&self.note_id).await;

        if self.load_seq.load(Ordering::SeqCst) != sequence {
            tracing::debug!(sequence, "discarding superseded comment load");
            return Ok(0);
        }

        let comments = result?;
        let count = comments.len();
        {
            let mut state = lock_recovering(&self.state);
            state.replace_all(comments);
        }
        self.touch();
        Ok(count)
    }

    /// Optimistically post a comment. Text is validated locally with the same
    /// rules the backend applies, so invalid input never reaches the network.
    pub async fn optimistic_add(
        &self,
        text: &str,
        author: String,
        author_email: Option<String>,
    ) -> Result<Comment> {
        let text = validate_comment_text(text)?;

        let placeholder = Comment {
            id: CommentId::temporary(),
            note_id: self.note_id.clone(),
            author,
            author_email,
            text: text.clone(),
            likes: 0,
            created_at: Some(unix_timestamp_now()),
        };
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

        match self.backend.add_comment(&self.note_id, &text).await {
            Ok(confirmed) => {
                {
                    let mut state = lock_recovering(&self.state);
                    if state.pending_kind(&temp_id) == Some(PendingKind::Create) {
                        state.clear_pending(&temp_id);
                        state.confirm_replace(&temp_id, confirmed.clone());
                    } else {
                        tracing::warn!(%temp_id, "comment confirmation without matching pending entry");
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
                tracing::warn!(%temp_id, %error, "rolled back optimistic comment");
                Err(error)
            }
        }
    }

    /// Optimistically delete a comment, reinserting it at its original
    /// position if the server rejects the delete.
    pub async fn optimistic_delete(&self, id: &CommentId) -> Result<()> {
        let (index, retained) = {
            let mut state = lock_recovering(&self.state);
            state.mark_pending(id, PendingKind::Delete)?;
            match state.remove(id) {
                Some(removed) => removed,
                None => {
                    state.clear_pending(id);
                    return Err(Error::remote(
                        RejectionCode::CommentNotFound,
                        "Comment not found",
                    ));
                }
            }
        };
        self.touch();

        match self.backend.delete_comment(id).await {
            Ok(()) => {
                lock_recovering(&self.state).clear_pending(id);
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
                tracing::warn!(%id, %error, "rolled back comment delete");
                Err(error)
            }
        }
    }

    /// Optimistically bump a comment's like count, reconciling to the
    /// server's count on success and decrementing on failure.
    pub async fn optimistic_like(&self, id: &CommentId) -> Result<u64> {
        {
            let mut state = lock_recovering(&self.state);
            state.mark_pending(id, PendingKind::Toggle)?;
            if !state.modify(id, |comment| comment.likes += 1) {
                state.clear_pending(id);
                return Err(Error::remote(
                    RejectionCode::CommentNotFound,
                    "Comment not found",
                ));
            }
        }
        self.touch();

        match self.backend.like_comment(id).await {
            Ok(server_likes) => {
                {
                    let mut state = lock_recovering(&self.state);
                    state.clear_pending(id);
                    state.modify(id, |comment| comment.likes = server_likes);
                }
                self.touch();
                Ok(server_likes)
            }
            Err(error) => {
                {
                    let mut state = lock_recovering(&self.state);
                    state.clear_pending(id);
                    state.modify(id, |comment| {
                        comment.likes = comment.likes.saturating_sub(1);
                    });
                }
                self.touch();
                tracing::warn!(%id, %error, "rolled back comment like");
                Err(error)
            }
        }
    }

    pub fn comments(&self) -> Vec<Comment> {
        lock_recovering(&self.state).entries().to_vec()
    }

    pub fn is_pending(&self, id: &CommentId) -> bool {
        lock_recovering(&self.state).is_pending(id)
    }

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

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    use pretty_assertions::assert_eq;

    use super::*;

    fn comment(id: &str, text: &str) -> Comment {
        Comment {
            id: id.to_string().into(),
            note_id: "n1".to_string().into(),
            author: "Asha".to_string(),
            author_email: Some("asha@college.edu".to_string()),
            text: text.to_string(),
            likes: 0,
            created_at: Some(1_700_000_000),
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        comments: Mutex<Vec<Comment>>,
        add_results: Mutex<VecDeque<Result<Comment>>>,
        delete_results: Mutex<VecDeque<Result<()>>>,
        like_results: Mutex<VecDeque<Result<u64>>>,
        add_calls: AtomicUsize,
    }

    #[async_trait]
    impl CommentBackend for FakeBackend {
        async fn list_comments(&self, _note_id: &NoteId) -> Result<Vec<Comment>> {
            Ok(self.comments.lock().unwrap().clone())
        }

        async fn add_comment(&self, _note_id: &NoteId, _text: &str) -> Result<Comment> {
            self.add_calls.fetch_add(1, Ordering::SeqCst);
            self.add_results.lock().unwrap().pop_front().unwrap()
        }

        async fn delete_comment(&self, _comment_id: &CommentId) -> Result<()> {
            self.delete_results.lock().unwrap().pop_front().unwrap()
        }

        async fn like_comment(&self, _comment_id: &CommentId) -> Result<u64> {
            self.like_results.lock().unwrap().pop_front().unwrap()
        }
    }

    fn store_with(backend: FakeBackend) -> CommentStore<FakeBackend> {
        CommentStore::new(Arc::new(backend), "n1".to_string().into())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn add_confirms_placeholder_in_place() {
        let backend = FakeBackend::default();
        *backend.comments.lock().unwrap() = vec![comment("c1", "First!")];
        backend
            .add_results
            .lock()
            .unwrap()
            .push_back(Ok(comment("c2", "Great notes")));
        let store = store_with(backend);
        store.load().await.unwrap();

        let confirmed = store
            .optimistic_add("Great notes", "Asha".to_string(), None)
            .await
            .unwrap();

        assert_eq!(confirmed.id.as_str(), "c2");
        let texts: Vec<_> = store.comments().into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["Great notes", "First!"]);
        assert!(store.comments().iter().all(|c| !c.id.is_temporary()));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_text_is_rejected_without_network_call() {
        let store = store_with(FakeBackend::default());

        let error = store
            .optimistic_add("   ", "Asha".to_string(), None)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            Error::Remote {
                code: RejectionCode::InvalidComment,
                ..
            }
        ));
        assert_eq!(store.backend.add_calls.load(Ordering::SeqCst), 0);
        assert!(store.comments().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_delete_restores_comment() {
        let backend = FakeBackend::default();
        *backend.comments.lock().unwrap() = vec![comment("c1", "One"), comment("c2", "Two")];
        backend
            .delete_results
            .lock()
            .unwrap()
            .push_back(Err(Error::Network { timeout: false }));
        let store = store_with(backend);
        store.load().await.unwrap();
        let before = store.comments();

        let error = store
            .optimistic_delete(&"c1".to_string().into())
            .await
            .unwrap_err();

        assert_eq!(error, Error::Network { timeout: false });
        assert_eq!(store.comments(), before);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn like_reconciles_to_server_count() {
        let backend = FakeBackend::default();
        *backend.comments.lock().unwrap() = vec![comment("c1", "One")];
        backend.like_results.lock().unwrap().push_back(Ok(7));
        let store = store_with(backend);
        store.load().await.unwrap();

        let likes = store.optimistic_like(&"c1".to_string().into()).await.unwrap();

        assert_eq!(likes, 7);
        assert_eq!(store.comments()[0].likes, 7);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_like_rolls_back_count() {
        let backend = FakeBackend::default();
        let mut liked = comment("c1", "One");
        liked.likes = 3;
        *backend.comments.lock().unwrap() = vec![liked];
        backend
            .like_results
            .lock()
            .unwrap()
            .push_back(Err(Error::Network { timeout: true }));
        let store = store_with(backend);
        store.load().await.unwrap();

        store
            .optimistic_like(&"c1".to_string().into())
            .await
            .unwrap_err();

        assert_eq!(store.comments()[0].likes, 3);
        assert!(!store.is_pending(&"c1".to_string().into()));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn liking_unknown_comment_fails_fast() {
        let store = store_with(FakeBackend::default());

        let error = store
            .optimistic_like(&"ghost".to_string().into())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            Error::Remote {
                code: RejectionCode::CommentNotFound,
                ..
            }
        ));
    }
}
