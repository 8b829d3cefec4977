use chrono::Local;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::models::{Filter, SortOrder, Task};
use crate::reorder::{move_task, ReorderOutcome};
use crate::store::{StoreError, TaskStore};

/// Resolves a full id or a unique id prefix against the loaded collection.
pub fn resolve_id(tasks: &[Task], needle: &str) -> Result<String, String> {
    if let Some(t) = tasks.iter().find(|t| t.id == needle) {
        return Ok(t.id.clone());
    }
    let matches: Vec<&Task> = tasks.iter().filter(|t| t.id.starts_with(needle)).collect();
    match matches.as_slice() {
        [one] => Ok(one.id.clone()),
        [] => Err(format!("Task {} not found.", needle)),
        _ => Err(format!("Task id '{}' is ambiguous ({} matches).", needle, matches.len())),
    }
}

/// Loads the collection, returning `false` when that failed.
///
/// The failure itself has already been reported through the notifier.
async fn load(store: &TaskStore) -> bool {
    store.load().await.is_ok()
}

async fn with_task(store: &TaskStore, needle: &str) -> Option<String> {
    if !load(store).await {
        return None;
    }
    match resolve_id(&store.tasks(), needle) {
        Ok(id) => Some(id),
        Err(msg) => {
            eprintln!("{}", msg);
            None
        }
    }
}

/// Adds a new task.
pub async fn cmd_add(store: &TaskStore, title: String) {
    // Success and service failures are reported by the store's notifier.
    if let Err(StoreError::BlankTitle) = store.add(&title).await {
        eprintln!("Task title cannot be empty.");
    }
}

/// Flips a task between active and completed.
pub async fn cmd_toggle(store: &TaskStore, id: String) {
    if let Some(id) = with_task(store, &id).await {
        if store.toggle(&id).await.is_ok() {
            if let Some(t) = store.find(&id) {
                let state = if t.completed { "complete" } else { "active" };
                println!("Task {} marked as {}.", short_id(&id), state);
            }
        }
    }
}

/// Renames a task.
pub async fn cmd_edit(store: &TaskStore, id: String, title: String) {
    if let Some(id) = with_task(store, &id).await {
        if let Err(StoreError::BlankTitle) = store.edit(&id, &title).await {
            eprintln!("Task title cannot be empty.");
        }
    }
}

/// Removes a task.
pub async fn cmd_remove(store: &TaskStore, id: String) {
    if let Some(id) = with_task(store, &id).await {
        let _ = store.remove(&id).await;
    }
}

/// Removes every completed task.
pub async fn cmd_clear_completed(store: &TaskStore) {
    if !load(store).await {
        return;
    }
    let total = store.tasks().iter().filter(|t| t.completed).count();
    if total == 0 {
        println!("No completed tasks.");
        return;
    }
    let removed = store.clear_completed().await;
    println!("Removed {} of {} completed tasks.", removed, total);
}

/// Moves a task within the displayed list, positions as shown by `list`.
pub async fn cmd_move(store: &TaskStore, from: usize, to: usize, filter: Filter, sort: SortOrder, search: Option<String>) {
    if !load(store).await {
        return;
    }
    apply_view(store, filter, sort, search);
    match move_task(store, from, to).await {
        ReorderOutcome::Committed => println!("Task moved from #{} to #{}.", from, to),
        ReorderOutcome::Skipped => eprintln!("Nothing to move: positions must differ and be within 0..{}.", store.displayed().len()),
        ReorderOutcome::RolledBack => eprintln!("Order restored."),
    }
}

fn apply_view(store: &TaskStore, filter: Filter, sort: SortOrder, search: Option<String>) {
    store.set_filter(filter);
    store.set_sort(sort);
    store.set_search(search.unwrap_or_default());
}

/// Lists tasks in a formatted table, filtered, searched and sorted.
pub async fn cmd_list(store: &TaskStore, filter: Filter, sort: SortOrder, search: Option<String>) {
    if !load(store).await {
        return;
    }
    apply_view(store, filter, sort, search);
    let total = store.tasks().len();
    let tasks = store.displayed();
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Created").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    for (i, t) in tasks.iter().enumerate() {
        let status = if t.completed { "Done" } else { "Active" };
        let status_color = if t.completed { Color::Green } else { Color::Yellow };
        let title = if t.completed { Cell::new(&t.title).fg(Color::Grey) } else { Cell::new(&t.title) };

        table.add_row(vec![
            Cell::new(i),
            Cell::new(short_id(&t.id)),
            title,
            Cell::new(t.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")),
            Cell::new(status).fg(status_color),
        ]);
    }

    println!("{table}");
    println!("{}", showing_line(tasks.len(), total));
}

/// "Showing N tasks", with the total appended when some are hidden.
pub fn showing_line(shown: usize, total: usize) -> String {
    if shown == total {
        format!("Showing {} tasks", shown)
    } else {
        format!("Showing {} tasks (Total: {})", shown, total)
    }
}

pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
