use std::path::Path;
use std::sync::Arc;

use taskmaster::commands::*;
use taskmaster::config::Config;
use taskmaster::models::{Filter, SortOrder, Task};
use taskmaster::notify::{ConsoleNotifier, Notification, NotificationLog};
use taskmaster::open_store;
use taskmaster::service::FaultConfig;
use taskmaster::storage::{load_tasks, FileStorage};
use taskmaster::store::TaskStore;
use tempfile::tempdir;

fn open(dir: &Path) -> (Arc<TaskStore>, Arc<FileStorage>) {
    let config = Config {
        dir: dir.to_path_buf(),
        faults: FaultConfig::none(),
        log_filter: "off".into(),
    };
    open_store(&config, Arc::new(ConsoleNotifier { silent: true })).unwrap()
}

fn stored(storage: &FileStorage) -> Vec<Task> {
    load_tasks(storage).unwrap()
}

#[tokio::test]
async fn test_add_and_list() {
    let temp = tempdir().unwrap();
    let (store, storage) = open(temp.path());

    cmd_add(&store, "Test Task".into()).await;
    cmd_add(&store, "   ".into()).await;

    let tasks = stored(&storage);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Test Task");
    assert!(temp.path().join("tasks.json").exists());

    cmd_list(&store, Filter::All, SortOrder::Descending, Some("test".into())).await;
    assert_eq!(store.displayed().len(), 1);
}

#[tokio::test]
async fn test_add_reports_success_once() {
    let temp = tempdir().unwrap();
    let config = Config {
        dir: temp.path().to_path_buf(),
        faults: FaultConfig::none(),
        log_filter: "off".into(),
    };
    let log = Arc::new(NotificationLog::new());
    let (store, _storage) = open_store(&config, log.clone()).unwrap();

    cmd_add(&store, "Water plants".into()).await;
    cmd_add(&store, "  ".into()).await;

    assert_eq!(log.entries(), vec![Notification::success("Task added!")]);
}

#[tokio::test]
async fn test_toggle_by_prefix() {
    let temp = tempdir().unwrap();
    let (store, storage) = open(temp.path());
    cmd_add(&store, "Task to complete".into()).await;
    let id = stored(&storage)[0].id.clone();

    cmd_toggle(&store, id[..6].to_string()).await;
    assert!(stored(&storage)[0].completed);

    cmd_toggle(&store, id).await;
    assert!(!stored(&storage)[0].completed);
}

#[tokio::test]
async fn test_edit_and_remove() {
    let temp = tempdir().unwrap();
    let (store, storage) = open(temp.path());
    cmd_add(&store, "Draft".into()).await;
    cmd_add(&store, "Other".into()).await;
    let id = stored(&storage)[0].id.clone();

    cmd_edit(&store, id.clone(), "  Final  ".into()).await;
    assert_eq!(stored(&storage)[0].title, "Final");

    cmd_edit(&store, id.clone(), " ".into()).await;
    assert_eq!(stored(&storage)[0].title, "Final");

    cmd_remove(&store, id).await;
    let tasks = stored(&storage);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Other");
}

#[tokio::test]
async fn test_unknown_id_changes_nothing() {
    let temp = tempdir().unwrap();
    let (store, storage) = open(temp.path());
    cmd_add(&store, "Only".into()).await;
    let before = stored(&storage);

    cmd_toggle(&store, "zzzz".into()).await;
    cmd_remove(&store, "zzzz".into()).await;

    assert_eq!(stored(&storage), before);
}

#[tokio::test]
async fn test_clear_completed() {
    let temp = tempdir().unwrap();
    let (store, storage) = open(temp.path());
    cmd_add(&store, "Done one".into()).await;
    cmd_add(&store, "Open one".into()).await;
    let id = stored(&storage)[0].id.clone();
    cmd_toggle(&store, id).await;

    cmd_clear_completed(&store).await;

    let tasks = stored(&storage);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Open one");
}

#[tokio::test]
async fn test_move_changes_persisted_order() {
    let temp = tempdir().unwrap();
    let (store, storage) = open(temp.path());
    cmd_add(&store, "First".into()).await;
    cmd_add(&store, "Second".into()).await;
    cmd_add(&store, "Third".into()).await;
    let before = stored(&storage);

    // Ascending order lists the tasks in creation order.
    cmd_move(&store, 0, 2, Filter::All, SortOrder::Ascending, None).await;

    let after = stored(&storage);
    assert_eq!(after.len(), 3);
    assert_eq!(after[2].id, before[0].id);

    // Out of range: nothing changes.
    cmd_move(&store, 0, 5, Filter::All, SortOrder::Ascending, None).await;
    assert_eq!(stored(&storage), after);
}
