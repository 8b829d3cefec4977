use crate::models::{SortOrder, Task, ViewParams};

/// Derives the displayed sequence from the raw collection.
///
/// Filters by completion status, then by case-insensitive title substring,
/// then stable-sorts by creation time in the requested direction.
pub fn project(tasks: &[Task], view: &ViewParams) -> Vec<Task> {
    let query = view.search_query.to_lowercase();
    let mut result: Vec<Task> = tasks
        .iter()
        .filter(|t| view.filter.matches(t))
        .filter(|t| query.is_empty() || t.title.to_lowercase().contains(&query))
        .cloned()
        .collect();

    match view.sort {
        SortOrder::Ascending => result.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortOrder::Descending => result.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
    result
}
