//! Optimistic reordering of the displayed list.

use std::collections::HashSet;

use crate::models::Task;
use crate::store::TaskStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderOutcome {
    /// Same position or an index out of range; nothing was attempted.
    Skipped,
    Committed,
    /// Persistence rejected the new order and the snapshot was restored.
    RolledBack,
}

/// Moves the item at `from` to `to`.
///
/// Returns `None` when the positions are equal or either is out of range.
pub fn move_item<T: Clone>(items: &[T], from: usize, to: usize) -> Option<Vec<T>> {
    if from == to || from >= items.len() || to >= items.len() {
        return None;
    }
    let mut moved = items.to_vec();
    let item = moved.remove(from);
    moved.insert(to, item);
    Some(moved)
}

/// Full-collection order: `visible` first, then every task of `all` not in
/// `visible`, keeping their relative order.
pub fn merge_hidden(all: &[Task], visible: Vec<Task>) -> Vec<Task> {
    let visible_ids: HashSet<&str> = visible.iter().map(|t| t.id.as_str()).collect();
    let hidden: Vec<Task> = all
        .iter()
        .filter(|t| !visible_ids.contains(t.id.as_str()))
        .cloned()
        .collect();
    let mut order = visible;
    order.extend(hidden);
    order
}

/// Moves the task at displayed position `from` to displayed position `to`.
///
/// The new order is applied to the store before persistence confirms it. If
/// the persisted reorder fails, the collection captured beforehand is set
/// again.
pub async fn move_task(store: &TaskStore, from: usize, to: usize) -> ReorderOutcome {
    let displayed = store.displayed();
    let reordered = match move_item(&displayed, from, to) {
        Some(r) => r,
        None => return ReorderOutcome::Skipped,
    };

    let snapshot = store.tasks();
    let candidate = merge_hidden(&snapshot, reordered);

    store.replace_tasks(candidate.clone());
    match store.reorder(candidate).await {
        Ok(()) => ReorderOutcome::Committed,
        Err(e) => {
            tracing::debug!(error = %e, "Reorder rejected, restoring snapshot");
            store.replace_tasks(snapshot);
            ReorderOutcome::RolledBack
        }
    }
}
