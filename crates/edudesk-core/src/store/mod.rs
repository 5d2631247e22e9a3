//! Optimistic collection state.
//!
//! [`CollectionState`] is the shared substrate for the note catalog and
//! comment threads: an ordered sequence (insertion order is display order),
//! keyed by id, plus a pending map tracking unconfirmed mutations. The stores
//! in [`notes`] and [`comments`] drive it; views only ever see snapshots.

pub mod comments;
pub mod notes;

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::error::{Error, Result};

/// Anything storable in a [`CollectionState`].
pub trait Keyed {
    type Key: Clone + Eq + Hash + fmt::Display;

    fn key(&self) -> &Self::Key;
}

/// The unconfirmed-mutation state of an entry.
///
/// Stable entries carry no mark; at most one mark exists per id, which is
/// what makes rapid double-clicks on the same control safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Create,
    Delete,
    Toggle,
}

/// Ordered, keyed collection with per-entry pending bookkeeping.
///
/// Invariants:
/// - no two entries share a key;
/// - at most one pending mark per key;
/// - mutating one entry never moves any other entry.
#[derive(Debug, Clone)]
pub struct CollectionState<T: Keyed> {
    entries: Vec<T>,
    pending: HashMap<T::Key, PendingKind>,
}

impl<T: Keyed> Default for CollectionState<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            pending: HashMap::new(),
        }
    }
}

impl<T: Keyed + Clone> CollectionState<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.entries.iter().find(|entry| entry.key() == key)
    }

    pub fn position(&self, key: &T::Key) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key() == key)
    }

    /// Mutate the entry with `key` in place. Returns false when absent.
    /// The closure must not change the entry's key.
    pub fn modify(&mut self, key: &T::Key, apply: impl FnOnce(&mut T)) -> bool {
        match self.entries.iter_mut().find(|entry| entry.key() == key) {
            Some(entry) => {
                apply(entry);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.position(key).is_some()
    }

    /// Replace the whole sequence (a completed `load`). Duplicate keys in the
    /// input are dropped after their first occurrence; pending marks survive a
    /// reload so in-flight mutations still reconcile against their own state.
    pub fn replace_all(&mut self, items: Vec<T>) {
        let mut seen: HashMap<T::Key, ()> = HashMap::with_capacity(items.len());
        self.entries = items
            .into_iter()
            .filter(|item| seen.insert(item.key().clone(), ()).is_none())
            .collect();
    }

    /// Insert at the front ("most recent first"). Fails on a duplicate key.
    pub fn insert_front(&mut self, entry: T) -> Result<()> {
        if self.contains(entry.key()) {
            return Err(Error::InvalidInput(format!(
                "duplicate entry '{}'",
                entry.key()
            )));
        }
        self.entries.insert(0, entry);
        Ok(())
    }

    /// Reinsert a retained entry at its original position (rollback path).
    /// The index is clamped so a shrunken sequence still accepts it.
    pub fn insert_at(&mut self, index: usize, entry: T) {
        if self.contains(entry.key()) {
            return;
        }
        let index = index.min(self.entries.len());
        self.entries.insert(index, entry);
    }

    /// Remove an entry, returning its position and the removed value so a
    /// failed mutation can restore it exactly.
    pub fn remove(&mut self, key: &T::Key) -> Option<(usize, T)> {
        let index = self.position(key)?;
        Some((index, self.entries.remove(index)))
    }

    /// Replace the entry at `old_key`'s position with `entry`, preserving the
    /// position (the optimistic-create confirmation path, where a placeholder
    /// id becomes the server-assigned one).
    ///
    /// If the new key already exists elsewhere (a concurrent reload already
    /// delivered the confirmed entry) the stale placeholder is dropped
    /// instead, keeping keys unique.
    pub fn confirm_replace(&mut self, old_key: &T::Key, entry: T) -> bool {
        let Some(index) = self.position(old_key) else {
            return false;
        };
        let duplicate = self
            .position(entry.key())
            .is_some_and(|existing| existing != index);
        if duplicate {
            self.entries.remove(index);
        } else {
            self.entries[index] = entry;
        }
        true
    }

    /// Mark a key pending; the at-most-one-in-flight invariant lives here.
    pub fn mark_pending(&mut self, key: &T::Key, kind: PendingKind) -> Result<()> {
        if self.pending.contains_key(key) {
            return Err(Error::AlreadyPending(key.to_string()));
        }
        self.pending.insert(key.clone(), kind);
        Ok(())
    }

    pub fn clear_pending(&mut self, key: &T::Key) {
        self.pending.remove(key);
    }

    pub fn pending_kind(&self, key: &T::Key) -> Option<PendingKind> {
        self.pending.get(key).copied()
    }

    pub fn is_pending(&self, key: &T::Key) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_keys(&self) -> Vec<T::Key> {
        self.pending.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item {
        id: String,
        value: u32,
    }

    impl Item {
        fn new(id: &str, value: u32) -> Self {
            Self {
                id: id.to_string(),
                value,
            }
        }
    }

    impl Keyed for Item {
        type Key = String;

        fn key(&self) -> &String {
            &self.id
        }
    }

    fn populated() -> CollectionState<Item> {
        let mut state = CollectionState::new();
        state.replace_all(vec![
            Item::new("a", 1),
            Item::new("b", 2),
            Item::new("c", 3),
        ]);
        state
    }

    #[test]
    fn replace_all_drops_duplicate_keys() {
        let mut state = CollectionState::new();
        state.replace_all(vec![Item::new("a", 1), Item::new("a", 9), Item::new("b", 2)]);
        assert_eq!(state.len(), 2);
        assert_eq!(state.get(&"a".to_string()).unwrap().value, 1);
    }

    #[test]
    fn insert_front_rejects_duplicates() {
        let mut state = populated();
        assert!(state.insert_front(Item::new("b", 9)).is_err());
        assert!(state.insert_front(Item::new("d", 4)).is_ok());
        assert_eq!(state.entries()[0].id, "d");
    }

    #[test]
    fn remove_and_reinsert_restores_original_order() {
        let mut state = populated();
        let (index, retained) = state.remove(&"b".to_string()).unwrap();
        assert_eq!(index, 1);
        assert_eq!(state.len(), 2);

        state.insert_at(index, retained);
        let order: Vec<&str> = state.entries().iter().map(|item| item.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn insert_at_clamps_out_of_range_index() {
        let mut state = populated();
        state.insert_at(99, Item::new("z", 26));
        assert_eq!(state.entries().last().unwrap().id, "z");
    }

    #[test]
    fn confirm_replace_preserves_position() {
        let mut state = populated();
        assert!(state.confirm_replace(&"b".to_string(), Item::new("b-real", 20)));
        let order: Vec<&str> = state.entries().iter().map(|item| item.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b-real", "c"]);
    }

    #[test]
    fn confirm_replace_drops_placeholder_when_confirmed_id_already_present() {
        let mut state = populated();
        // "c" already exists; replacing "a" with another "c" must not duplicate.
        assert!(state.confirm_replace(&"a".to_string(), Item::new("c", 30)));
        assert_eq!(state.len(), 2);
        assert_eq!(state.get(&"c".to_string()).unwrap().value, 3);
    }

    #[test]
    fn second_pending_mark_is_rejected() {
        let mut state = populated();
        state
            .mark_pending(&"a".to_string(), PendingKind::Delete)
            .unwrap();
        let error = state
            .mark_pending(&"a".to_string(), PendingKind::Toggle)
            .unwrap_err();
        assert_eq!(error, Error::AlreadyPending("a".to_string()));

        state.clear_pending(&"a".to_string());
        assert!(state
            .mark_pending(&"a".to_string(), PendingKind::Toggle)
            .is_ok());
    }

    #[test]
    fn pending_marks_survive_replace_all() {
        let mut state = populated();
        state
            .mark_pending(&"b".to_string(), PendingKind::Delete)
            .unwrap();
        state.replace_all(vec![Item::new("x", 9)]);
        assert_eq!(
            state.pending_kind(&"b".to_string()),
            Some(PendingKind::Delete)
        );
    }

    #[test]
    fn mutating_one_entry_leaves_others_in_place() {
        let mut state = populated();
        state.remove(&"a".to_string());
        assert_eq!(state.position(&"b".to_string()), Some(0));
        assert_eq!(state.position(&"c".to_string()), Some(1));

        let mut state = populated();
        state.confirm_replace(&"c".to_string(), Item::new("c2", 4));
        assert_eq!(state.position(&"a".to_string()), Some(0));
        assert_eq!(state.position(&"b".to_string()), Some(1));
    }
}
