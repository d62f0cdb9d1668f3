//! Server-side list state.

use crate::error::{ServerError, ServerResult};
use parking_lot::RwLock;
use tasksync_protocol::{ItemId, Revision, TodoItem};

/// The authoritative list and its revision.
///
/// Every mutation takes the revision the client last saw and is rejected
/// unless it equals the current one. Accepted mutations increment the
/// revision by one.
pub struct ListState {
    inner: RwLock<Inner>,
}

struct Inner {
    items: Vec<TodoItem>,
    revision: Revision,
}

impl Inner {
    fn check(&self, known: Option<Revision>) -> ServerResult<()> {
        if known != Some(self.revision) {
            return Err(ServerError::RevisionConflict {
                expected: self.revision,
                actual: known,
            });
        }
        Ok(())
    }

    fn position(&self, id: &ItemId) -> ServerResult<usize> {
        self.items
            .iter()
            .position(|item| &item.id == id)
            .ok_or_else(|| ServerError::NotFound(id.to_string()))
    }

    /// Revision the next accepted mutation will publish.
    fn next_revision(&self) -> ServerResult<Revision> {
        self.revision
            .checked_next()
            .ok_or_else(|| ServerError::Internal("revision space exhausted".into()))
    }
}

impl ListState {
    /// Creates an empty list at the given revision.
    pub fn new(revision: Revision) -> Self {
        Self {
            inner: RwLock::new(Inner {
                items: Vec::new(),
                revision,
            }),
        }
    }

    /// Returns the current revision.
    pub fn revision(&self) -> Revision {
        self.inner.read().revision
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    /// Returns true if the list holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every item with the current revision.
    pub fn snapshot(&self) -> (Vec<TodoItem>, Revision) {
        let inner = self.inner.read();
        (inner.items.clone(), inner.revision)
    }

    /// Returns one item with the current revision.
    pub fn get(&self, id: &ItemId) -> ServerResult<(TodoItem, Revision)> {
        let inner = self.inner.read();
        let index = inner.position(id)?;
        Ok((inner.items[index].clone(), inner.revision))
    }

    /// Replaces the whole list.
    pub fn replace_all(
        &self,
        items: Vec<TodoItem>,
        known: Option<Revision>,
    ) -> ServerResult<(Vec<TodoItem>, Revision)> {
        let mut inner = self.inner.write();
        inner.check(known)?;
        let revision = inner.next_revision()?;
        inner.items = items;
        inner.revision = revision;
        Ok((inner.items.clone(), revision))
    }

    /// Adds a new item.
    pub fn insert(&self, item: TodoItem, known: Option<Revision>) -> ServerResult<(TodoItem, Revision)> {
        let mut inner = self.inner.write();
        inner.check(known)?;
        if inner.position(&item.id).is_ok() {
            return Err(ServerError::InvalidRequest(format!(
                "item {} already exists",
                item.id
            )));
        }
        let revision = inner.next_revision()?;
        inner.items.push(item.clone());
        inner.revision = revision;
        Ok((item, revision))
    }

    /// Replaces an existing item.
    pub fn update(
        &self,
        id: &ItemId,
        item: TodoItem,
        known: Option<Revision>,
    ) -> ServerResult<(TodoItem, Revision)> {
        if &item.id != id {
            return Err(ServerError::InvalidRequest(format!(
                "body id {} does not match path id {}",
                item.id, id
            )));
        }
        let mut inner = self.inner.write();
        inner.check(known)?;
        let index = inner.position(id)?;
        let revision = inner.next_revision()?;
        inner.items[index] = item.clone();
        inner.revision = revision;
        Ok((item, revision))
    }

    /// Removes an item and returns it.
    pub fn remove(&self, id: &ItemId, known: Option<Revision>) -> ServerResult<(TodoItem, Revision)> {
        let mut inner = self.inner.write();
        inner.check(known)?;
        let index = inner.position(id)?;
        let revision = inner.next_revision()?;
        let item = inner.items.remove(index);
        inner.revision = revision;
        Ok((item, revision))
    }
}

impl Default for ListState {
    fn default() -> Self {
        Self::new(Revision::INITIAL)
    }
}
