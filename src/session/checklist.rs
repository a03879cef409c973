use serde::{Deserialize, Serialize};

use crate::store::TodoItem;

/// Ordered, mutable checklist attached to an in-progress session.
///
/// Item ids come from a monotonic counter so no two items ever share an
/// id within one checklist's lifetime, even after removals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checklist {
    items: Vec<TodoItem>,
    next_id: u64,
}

impl Default for Checklist {
    fn default() -> Self {
        Checklist {
            items: Vec::new(),
            next_id: 1,
        }
    }
}

impl Checklist {
    pub fn new() -> Self {
        Checklist::default()
    }

    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a new empty item in editing state. Returns its id.
    pub fn add(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(TodoItem {
            id,
            text: String::new(),
            completed: false,
            editing: true,
        });
        id
    }

    pub fn edit(&mut self, id: u64, text: &str) {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.text = text.to_string();
        }
    }

    pub fn commit_edit(&mut self, id: u64) {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.editing = false;
        }
    }

    /// Flip an item's editing flag. Items in editing mode are excluded
    /// from reordering.
    pub fn toggle_edit(&mut self, id: u64) {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.editing = !item.editing;
        }
    }

    /// Flip an item's completion state. Returns true if the item existed;
    /// the caller re-checks the todo end condition after any flip.
    pub fn toggle_completed(&mut self, id: u64) -> bool {
        match self.items.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                item.completed = !item.completed;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: u64) {
        self.items.retain(|i| i.id != id);
    }

    /// Move `moved_id` to sit immediately before `before_id`, keeping the
    /// relative order of everything else. No-op when the ids are equal,
    /// either id is unknown, or the moved item is mid-edit.
    pub fn reorder(&mut self, moved_id: u64, before_id: u64) {
        if moved_id == before_id {
            return;
        }
        let Some(moved_pos) = self.items.iter().position(|i| i.id == moved_id) else {
            return;
        };
        if self.items[moved_pos].editing {
            return;
        }
        if self.items.iter().all(|i| i.id != before_id) {
            return;
        }
        let moved = self.items.remove(moved_pos);
        let target = self
            .items
            .iter()
            .position(|i| i.id == before_id)
            .unwrap_or(self.items.len());
        self.items.insert(target, moved);
    }

    /// The todo end rule fires when the checklist is non-empty and every
    /// item is completed.
    pub fn all_complete(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| i.completed)
    }

    /// Snapshot the items for persistence in a session record.
    pub fn to_items(&self) -> Vec<TodoItem> {
        self.items.clone()
    }
}
