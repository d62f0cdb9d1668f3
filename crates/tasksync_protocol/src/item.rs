//! List element model.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of a list element.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the id can be used verbatim as one path segment.
    ///
    /// Empty ids and ids containing `/`, `?`, `#`, `%`, whitespace or control
    /// characters would address a different route.
    pub fn is_path_safe(&self) -> bool {
        let reserved = |c: char| {
            matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace() || c.is_control()
        };
        !self.0.is_empty() && !self.0.chars().any(reserved)
    }

    /// Returns the id as a path segment, or an error if it is not path safe.
    pub fn path_segment(&self) -> ProtocolResult<&str> {
        if self.is_path_safe() {
            Ok(&self.0)
        } else {
            Err(ProtocolError::InvalidItemId(self.0.clone()))
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// How important an item is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    /// Can wait.
    Low,
    /// Regular item.
    #[default]
    Basic,
    /// Needs attention first.
    Important,
}

/// A single task in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    /// Unique identifier.
    pub id: ItemId,
    /// Task text.
    pub text: String,
    /// Importance level.
    pub importance: Importance,
    /// Optional deadline (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<i64>,
    /// Whether the task is done.
    pub done: bool,
    /// Optional display color (`#RRGGBB`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Creation time (unix seconds).
    pub created_at: i64,
    /// Last modification time (unix seconds).
    pub changed_at: i64,
    /// Device that made the last modification.
    pub last_updated_by: String,
}

impl TodoItem {
    /// Creates a new, not-yet-done item with a generated ID.
    pub fn new(text: impl Into<String>, device_id: impl Into<String>) -> Self {
        let now = unix_now();
        Self {
            id: ItemId::generate(),
            text: text.into(),
            importance: Importance::Basic,
            deadline: None,
            done: false,
            color: None,
            created_at: now,
            changed_at: now,
            last_updated_by: device_id.into(),
        }
    }

    /// Sets the importance.
    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    /// Sets the deadline.
    pub fn with_deadline(mut self, deadline: i64) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the display color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Marks the item done or not done, stamping the modification.
    pub fn set_done(&mut self, done: bool, device_id: impl Into<String>) {
        self.done = done;
        self.touch(device_id);
    }

    /// Replaces the text, stamping the modification.
    pub fn set_text(&mut self, text: impl Into<String>, device_id: impl Into<String>) {
        self.text = text.into();
        self.touch(device_id);
    }

    fn touch(&mut self, device_id: impl Into<String>) {
        self.changed_at = unix_now().max(self.changed_at);
        self.last_updated_by = device_id.into();
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
