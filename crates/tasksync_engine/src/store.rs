//! Local item storage seen by the engine.

use crate::error::SyncResult;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tasksync_protocol::{ItemId, Revision, TodoItem};

/// Callback interface to the local item cache.
///
/// The engine only needs to read every local item and to write the result of
/// a sync back; how items are persisted is up to the implementation.
pub trait ItemStore: Send + Sync {
    /// Returns every local item.
    fn load_items(&self) -> SyncResult<Vec<TodoItem>>;

    /// Replaces the local items with the server's view.
    fn replace_all(&self, items: Vec<TodoItem>, revision: Revision) -> SyncResult<()>;

    /// Returns true if local edits have not reached the server yet.
    fn has_unsynced_changes(&self) -> SyncResult<bool>;
}

/// An in-memory item store.
pub struct MemoryItemStore {
    items: RwLock<Vec<TodoItem>>,
    revision: RwLock<Revision>,
    unsynced: AtomicBool,
}

impl MemoryItemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            revision: RwLock::new(Revision::INITIAL),
            unsynced: AtomicBool::new(false),
        }
    }

    /// Inserts or replaces an item and marks the store as unsynced.
    pub fn upsert(&self, item: TodoItem) {
        let mut items = self.items.write();
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
        self.unsynced.store(true, Ordering::SeqCst);
    }

    /// Removes an item and marks the store as unsynced.
    pub fn remove(&self, id: &ItemId) -> Option<TodoItem> {
        let mut items = self.items.write();
        let index = items.iter().position(|item| &item.id == id)?;
        self.unsynced.store(true, Ordering::SeqCst);
        Some(items.remove(index))
    }

    /// Returns a copy of every item.
    pub fn items(&self) -> Vec<TodoItem> {
        self.items.read().clone()
    }

    /// Returns the revision the items were last synced at.
    pub fn revision(&self) -> Revision {
        *self.revision.read()
    }
}

impl Default for MemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemStore for MemoryItemStore {
    fn load_items(&self) -> SyncResult<Vec<TodoItem>> {
        Ok(self.items())
    }

    fn replace_all(&self, items: Vec<TodoItem>, revision: Revision) -> SyncResult<()> {
        *self.items.write() = items;
        *self.revision.write() = revision;
        self.unsynced.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn has_unsynced_changes(&self) -> SyncResult<bool> {
        Ok(self.unsynced.load(Ordering::SeqCst))
    }
}
