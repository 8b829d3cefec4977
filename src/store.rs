//! The task store: in-memory collection plus view parameters, mutated only
//! through the persistence service.
//!
//! State sits behind a mutex that is never held across an `.await`, so several
//! actions can be in flight at once and apply in whatever order they settle.

use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::models::{Filter, SortOrder, Task, TaskPatch, ViewParams};
use crate::notify::{Notification, Notifier};
use crate::projection::project;
use crate::service::{Operation, ServiceError, TaskService};
use crate::storage::{StorageEvent, TASKS_KEY};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task title cannot be empty")]
    BlankTitle,

    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub tasks: Vec<Task>,
    pub view: ViewParams,
    pub is_loading: bool,
}

pub struct TaskStore {
    service: Arc<dyn TaskService>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<StoreState>,
}

impl TaskStore {
    pub fn new(service: Arc<dyn TaskService>, notifier: Arc<dyn Notifier>) -> TaskStore {
        TaskStore { service, notifier, state: Mutex::new(StoreState::default()) }
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.lock().clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    pub fn view(&self) -> ViewParams {
        self.state.lock().view.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().is_loading
    }

    /// The currently displayed sequence.
    pub fn displayed(&self) -> Vec<Task> {
        let state = self.state.lock();
        project(&state.tasks, &state.view)
    }

    pub fn find(&self, id: &str) -> Option<Task> {
        self.state.lock().tasks.iter().find(|t| t.id == id).cloned()
    }

    fn set_loading(&self, loading: bool) {
        self.state.lock().is_loading = loading;
    }

    fn report(&self, err: &ServiceError, op: Operation) {
        tracing::warn!(op = op.as_str(), error = %err, "Task action failed");
        self.notifier.notify(Notification::error(err.to_string(), op.failure_message()));
    }

    /// Replaces the collection with the persisted one.
    ///
    /// On failure the collection is cleared, not preserved.
    pub async fn load(&self) -> StoreResult<()> {
        self.set_loading(true);
        let result = self.service.get_all().await;
        match result {
            Ok(tasks) => {
                tracing::info!(count = tasks.len(), "Loaded tasks");
                let mut state = self.state.lock();
                state.tasks = tasks;
                state.is_loading = false;
                Ok(())
            }
            Err(e) => {
                self.report(&e, Operation::List);
                let mut state = self.state.lock();
                state.tasks.clear();
                state.is_loading = false;
                Err(e.into())
            }
        }
    }

    /// Creates a task and appends it. Blank titles never reach the service.
    pub async fn add(&self, title: &str) -> StoreResult<Task> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::BlankTitle);
        }
        self.set_loading(true);
        let result = self.service.create(title).await;
        match result {
            Ok(task) => {
                tracing::info!(id = %task.id, "Task added");
                {
                    let mut state = self.state.lock();
                    state.tasks.push(task.clone());
                    state.is_loading = false;
                }
                self.notifier.notify(Notification::success("Task added!"));
                Ok(task)
            }
            Err(e) => {
                self.report(&e, Operation::Create);
                self.set_loading(false);
                Err(e.into())
            }
        }
    }

    /// Flips the completion flag. Unknown ids are ignored.
    pub async fn toggle(&self, id: &str) -> StoreResult<()> {
        let current = match self.find(id) {
            Some(t) => t,
            None => return Ok(()),
        };
        let result = self.service.update(id, TaskPatch::completed(!current.completed)).await;
        match result {
            Ok(_) => {
                tracing::info!(id = %id, completed = !current.completed, "Task toggled");
                if let Some(t) = self.state.lock().tasks.iter_mut().find(|t| t.id == id) {
                    t.completed = !t.completed;
                }
                Ok(())
            }
            Err(e) => {
                self.report(&e, Operation::Update);
                Err(e.into())
            }
        }
    }

    /// Renames a task. The title is trimmed and must not be blank.
    pub async fn edit(&self, id: &str, title: &str) -> StoreResult<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::BlankTitle);
        }
        let result = self.service.update(id, TaskPatch::title(title)).await;
        match result {
            Ok(_) => {
                tracing::info!(id = %id, "Task renamed");
                if let Some(t) = self.state.lock().tasks.iter_mut().find(|t| t.id == id) {
                    t.title = title.to_string();
                }
                self.notifier.notify(Notification::success("Task updated"));
                Ok(())
            }
            Err(e) => {
                self.report(&e, Operation::Update);
                Err(e.into())
            }
        }
    }

    pub async fn remove(&self, id: &str) -> StoreResult<()> {
        let result = self.service.delete(id).await;
        match result {
            Ok(()) => {
                tracing::info!(id = %id, "Task deleted");
                self.state.lock().tasks.retain(|t| t.id != id);
                self.notifier.notify(Notification::success("Task deleted"));
                Ok(())
            }
            Err(e) => {
                self.report(&e, Operation::Delete);
                Err(e.into())
            }
        }
    }

    /// Persists `new_order` as the full collection and adopts it on success.
    ///
    /// On failure the in-memory collection is left as it is; callers that
    /// applied an optimistic order are responsible for restoring theirs.
    pub async fn reorder(&self, new_order: Vec<Task>) -> StoreResult<()> {
        let result = self.service.reorder(&new_order).await;
        match result {
            Ok(()) => {
                tracing::info!(count = new_order.len(), "Tasks reordered");
                self.state.lock().tasks = new_order;
                Ok(())
            }
            Err(e) => {
                self.report(&e, Operation::Reorder);
                Err(e.into())
            }
        }
    }

    /// Removes every completed task with concurrent deletes.
    ///
    /// Returns how many deletes succeeded.
    pub async fn clear_completed(&self) -> usize {
        let ids: Vec<String> = self
            .state
            .lock()
            .tasks
            .iter()
            .filter(|t| t.completed)
            .map(|t| t.id.clone())
            .collect();
        let results = join_all(ids.iter().map(|id| self.remove(id))).await;
        results.iter().filter(|r| r.is_ok()).count()
    }

    /// Sets the collection directly, without persisting.
    pub fn replace_tasks(&self, tasks: Vec<Task>) {
        self.state.lock().tasks = tasks;
    }

    pub fn set_filter(&self, filter: Filter) {
        self.state.lock().view.filter = filter;
    }

    pub fn set_sort(&self, sort: SortOrder) {
        self.state.lock().view.sort = sort;
    }

    pub fn set_search(&self, query: impl Into<String>) {
        self.state.lock().view.search_query = query.into();
    }

    /// Reloads whenever another writer touches the tasks key.
    ///
    /// This gives eventual consistency only: concurrent writers race and the
    /// last completed write wins, with no merge.
    pub fn watch_storage(self: &Arc<Self>, mut events: broadcast::Receiver<StorageEvent>) -> StorageSubscription {
        let store = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.key == TASKS_KEY => {
                        tracing::debug!("Tasks changed elsewhere, reloading");
                        let _ = store.load().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Storage events lagged, reloading");
                        let _ = store.load().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        StorageSubscription { handle }
    }
}

/// Live storage-change subscription. Dropping it stops the reloads.
pub struct StorageSubscription {
    handle: JoinHandle<()>,
}

impl StorageSubscription {
    pub fn unsubscribe(self) {
        self.handle.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for StorageSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
