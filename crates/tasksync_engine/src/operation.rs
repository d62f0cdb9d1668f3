//! Logical sync operations.

use std::fmt;
use tasksync_protocol::{ItemId, TodoItem};

/// Kind of a sync operation, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Download the whole list.
    FetchList,
    /// Replace the server list with the local one.
    PushList,
    /// Add one item.
    CreateItem,
    /// Download one item.
    ReadItem,
    /// Replace one item.
    UpdateItem,
    /// Remove one item.
    DeleteItem,
}

impl OperationKind {
    /// Returns true if requests of this kind carry the known revision.
    pub fn sends_revision(&self) -> bool {
        !matches!(self, OperationKind::FetchList | OperationKind::ReadItem)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::FetchList => "fetch_list",
            OperationKind::PushList => "push_list",
            OperationKind::CreateItem => "create_item",
            OperationKind::ReadItem => "read_item",
            OperationKind::UpdateItem => "update_item",
            OperationKind::DeleteItem => "delete_item",
        };
        f.write_str(name)
    }
}

/// A sync operation with everything needed to rebuild its request.
///
/// The revision is not stored here: it is read from the engine state each
/// time the request is rebuilt, so a retry picks up a revision advanced by
/// another operation in the meantime.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Download the whole list.
    FetchList,
    /// Replace the server list with these items.
    PushList {
        /// Items to send.
        items: Vec<TodoItem>,
    },
    /// Add an item.
    CreateItem {
        /// Item to create.
        item: TodoItem,
    },
    /// Download an item.
    ReadItem {
        /// Item to read.
        id: ItemId,
    },
    /// Replace an item.
    UpdateItem {
        /// New version of the item.
        item: TodoItem,
    },
    /// Remove an item.
    DeleteItem {
        /// Item to delete.
        id: ItemId,
    },
}

impl Operation {
    /// Returns the kind of this operation.
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::FetchList => OperationKind::FetchList,
            Operation::PushList { .. } => OperationKind::PushList,
            Operation::CreateItem { .. } => OperationKind::CreateItem,
            Operation::ReadItem { .. } => OperationKind::ReadItem,
            Operation::UpdateItem { .. } => OperationKind::UpdateItem,
            Operation::DeleteItem { .. } => OperationKind::DeleteItem,
        }
    }

    /// Returns the item this operation targets, if it targets one.
    pub fn item_id(&self) -> Option<&ItemId> {
        match self {
            Operation::CreateItem { item } | Operation::UpdateItem { item } => Some(&item.id),
            Operation::ReadItem { id } | Operation::DeleteItem { id } => Some(id),
            Operation::FetchList | Operation::PushList { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_is_sent_only_by_mutations() {
        assert!(!OperationKind::FetchList.sends_revision());
        assert!(!OperationKind::ReadItem.sends_revision());
        assert!(OperationKind::PushList.sends_revision());
        assert!(OperationKind::CreateItem.sends_revision());
        assert!(OperationKind::UpdateItem.sends_revision());
        assert!(OperationKind::DeleteItem.sends_revision());
    }

    #[test]
    fn item_targets() {
        let item = TodoItem::new("x", "d");
        let id = item.id.clone();
        assert_eq!(Operation::UpdateItem { item }.item_id(), Some(&id));
        assert_eq!(Operation::FetchList.item_id(), None);
        assert_eq!(Operation::DeleteItem { id: id.clone() }.kind(), OperationKind::DeleteItem);
        assert_eq!(OperationKind::DeleteItem.to_string(), "delete_item");
    }
}
