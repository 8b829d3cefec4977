use chrono::DateTime;
use taskmaster::models::{Filter, SortOrder, Task, ViewParams};
use taskmaster::projection::project;

fn task_at(id: &str, title: &str, secs: i64, completed: bool) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
        completed,
        created_at: DateTime::from_timestamp(secs, 0).unwrap(),
    }
}

fn sample() -> Vec<Task> {
    vec![
        task_at("1", "Buy Milk", 30, false),
        task_at("2", "Write report", 10, true),
        task_at("3", "Milk the cow", 20, true),
        task_at("4", "Call plumber", 40, false),
    ]
}

fn view(filter: Filter, sort: SortOrder, query: &str) -> ViewParams {
    ViewParams { filter, sort, search_query: query.to_string() }
}

fn ids(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.id.as_str()).collect()
}

#[test]
fn test_filters_by_completion() {
    let tasks = sample();

    let active = project(&tasks, &view(Filter::Active, SortOrder::Ascending, ""));
    assert!(active.iter().all(|t| !t.completed));
    assert_eq!(ids(&active), vec!["1", "4"]);

    let completed = project(&tasks, &view(Filter::Completed, SortOrder::Ascending, ""));
    assert!(completed.iter().all(|t| t.completed));
    assert_eq!(ids(&completed), vec!["2", "3"]);

    let all = project(&tasks, &view(Filter::All, SortOrder::Ascending, ""));
    assert_eq!(all.len(), tasks.len());
}

#[test]
fn test_filter_is_idempotent() {
    let tasks = sample();
    let v = view(Filter::Active, SortOrder::Descending, "");
    let once = project(&tasks, &v);
    let twice = project(&once, &v);
    assert_eq!(once, twice);
}

#[test]
fn test_search_is_case_insensitive_substring() {
    let tasks = sample();

    let milk = project(&tasks, &view(Filter::All, SortOrder::Ascending, "milk"));
    assert_eq!(ids(&milk), vec!["3", "1"]);

    let buy = project(&tasks, &view(Filter::All, SortOrder::Ascending, "BUY"));
    assert_eq!(ids(&buy), vec!["1"]);

    let none = project(&tasks, &view(Filter::All, SortOrder::Ascending, "zebra"));
    assert!(none.is_empty());
}

#[test]
fn test_search_combines_with_filter() {
    let tasks = sample();
    let result = project(&tasks, &view(Filter::Active, SortOrder::Ascending, "milk"));
    assert_eq!(ids(&result), vec!["1"]);
}

#[test]
fn test_sort_directions_are_reverses() {
    let tasks = sample();
    for filter in [Filter::All, Filter::Active, Filter::Completed] {
        let asc = project(&tasks, &view(filter, SortOrder::Ascending, ""));
        let mut desc = project(&tasks, &view(filter, SortOrder::Descending, ""));
        desc.reverse();
        assert_eq!(asc, desc);
    }
    let asc = project(&tasks, &view(Filter::All, SortOrder::Ascending, ""));
    assert_eq!(ids(&asc), vec!["2", "3", "1", "4"]);
}

#[test]
fn test_ties_keep_collection_order() {
    let tasks = vec![task_at("x", "X", 5, false), task_at("y", "Y", 5, false), task_at("z", "Z", 1, false)];

    let asc = project(&tasks, &view(Filter::All, SortOrder::Ascending, ""));
    assert_eq!(ids(&asc), vec!["z", "x", "y"]);

    let desc = project(&tasks, &view(Filter::All, SortOrder::Descending, ""));
    assert_eq!(ids(&desc), vec!["x", "y", "z"]);
}

#[test]
fn test_empty_collection() {
    assert!(project(&[], &ViewParams::default()).is_empty());
}
