use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::widgets::TableState;

use crate::models::{Task, ViewParams};
use crate::notify::{Notification, NotificationLog};
use crate::projection::project;
use crate::reorder::move_task;
use crate::store::TaskStore;

/// How long a notification stays on screen.
pub const TOAST_TTL: Duration = Duration::from_secs(4);
/// Quiet period before a typed search query is applied.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(PartialEq)]
pub enum InputMode {
    Normal,
    Editing,
    Adding,
    Searching,
}

/// Trailing-edge debounce of a text value.
pub struct Debounced {
    pub value: String,
    changed_at: Option<Instant>,
    delay: Duration,
}

impl Debounced {
    pub fn new(delay: Duration) -> Debounced {
        Debounced { value: String::new(), changed_at: None, delay }
    }

    pub fn set(&mut self, value: String) {
        self.value = value;
        self.changed_at = Some(Instant::now());
    }

    /// Returns the value once it has been stable for the delay, at most once per change.
    pub fn take_settled(&mut self) -> Option<String> {
        match self.changed_at {
            Some(at) if at.elapsed() >= self.delay => {
                self.changed_at = None;
                Some(self.value.clone())
            }
            _ => None,
        }
    }
}

pub struct App {
    pub store: Arc<TaskStore>,
    pub toasts: Arc<NotificationLog>,
    /// Projection of the store as of the last tick.
    pub displayed: Vec<Task>,
    pub total: usize,
    pub is_loading: bool,
    pub view: ViewParams,
    pub state: TableState,
    pub input_mode: InputMode,
    pub input_buffer: String,
    pub target_id: Option<String>,
    pub search: Debounced,
}

impl App {
    pub fn new(store: Arc<TaskStore>, toasts: Arc<NotificationLog>) -> App {
        let mut app = App {
            store,
            toasts,
            displayed: Vec::new(),
            total: 0,
            is_loading: false,
            view: ViewParams::default(),
            state: TableState::default(),
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            target_id: None,
            search: Debounced::new(SEARCH_DEBOUNCE),
        };
        app.refresh();
        app
    }

    /// Runs a store action in the background; the next tick picks up its effect.
    fn spawn<F, Fut>(&self, action: F)
    where
        F: FnOnce(Arc<TaskStore>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(action(Arc::clone(&self.store)));
    }

    /// Applies a settled search query and re-derives the displayed list.
    pub fn tick(&mut self) {
        if let Some(query) = self.search.take_settled() {
            self.store.set_search(query);
        }
        self.refresh();
    }

    /// Re-derives the displayed list, keeping the selected task selected.
    pub fn refresh(&mut self) {
        let selected_id = self.selected().map(|t| t.id.clone());
        let snapshot = self.store.snapshot();
        self.displayed = project(&snapshot.tasks, &snapshot.view);
        self.total = snapshot.tasks.len();
        self.is_loading = snapshot.is_loading;
        self.view = snapshot.view;

        let by_id = selected_id.and_then(|id| self.displayed.iter().position(|t| t.id == id));
        if self.displayed.is_empty() {
            self.state.select(None);
        } else if let Some(i) = by_id {
            self.state.select(Some(i));
        } else if let Some(i) = self.state.selected() {
            if i >= self.displayed.len() {
                self.state.select(Some(self.displayed.len() - 1));
            }
        } else {
            self.state.select(Some(0));
        }
    }

    pub fn selected(&self) -> Option<&Task> {
        self.state.selected().and_then(|i| self.displayed.get(i))
    }

    pub fn recent_toasts(&self) -> Vec<Notification> {
        self.toasts.recent(TOAST_TTL)
    }

    /// Selects the next task, wrapping around.
    pub fn next(&mut self) {
        if self.displayed.is_empty() { return; }
        let i = match self.state.selected() {
            Some(i) if i + 1 < self.displayed.len() => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    /// Selects the previous task, wrapping around.
    pub fn previous(&mut self) {
        if self.displayed.is_empty() { return; }
        let i = match self.state.selected() {
            Some(0) | None => self.displayed.len() - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn reload(&mut self) {
        self.spawn(|store| async move {
            let _ = store.load().await;
        });
    }

    pub fn toggle_selected(&mut self) {
        if let Some(id) = self.selected().map(|t| t.id.clone()) {
            self.spawn(|store| async move {
                let _ = store.toggle(&id).await;
            });
        }
    }

    pub fn delete_selected(&mut self) {
        if let Some(id) = self.selected().map(|t| t.id.clone()) {
            self.spawn(|store| async move {
                let _ = store.remove(&id).await;
            });
        }
    }

    pub fn clear_completed(&mut self) {
        self.spawn(|store| async move {
            store.clear_completed().await;
        });
    }

    /// Moves the selected task `delta` rows within the displayed list.
    pub fn move_selected(&mut self, delta: isize) {
        let from = match self.state.selected() {
            Some(i) => i,
            None => return,
        };
        let to = match from.checked_add_signed(delta) {
            Some(to) if to < self.displayed.len() => to,
            _ => return,
        };
        self.spawn(move |store| async move {
            move_task(&store, from, to).await;
        });
    }

    pub fn cycle_filter(&mut self) {
        self.store.set_filter(self.view.filter.next());
        self.refresh();
    }

    pub fn flip_sort(&mut self) {
        self.store.set_sort(self.view.sort.reversed());
        self.refresh();
    }

    pub fn start_add(&mut self) {
        self.input_mode = InputMode::Adding;
        self.input_buffer.clear();
    }

    /// Opens the title editor pre-filled with the selected task's title.
    pub fn start_edit(&mut self) {
        if let Some(t) = self.selected().cloned() {
            self.target_id = Some(t.id);
            self.input_buffer = t.title;
            self.input_mode = InputMode::Editing;
        }
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input_buffer.clear();
        self.target_id = None;
    }

    /// Submits the add or edit box. Blank input keeps the box open.
    pub fn handle_input(&mut self) {
        let title = self.input_buffer.trim().to_string();
        if title.is_empty() {
            if self.input_mode == InputMode::Editing {
                self.cancel_input();
            }
            return;
        }
        match self.input_mode {
            InputMode::Adding => {
                self.spawn(|store| async move {
                    let _ = store.add(&title).await;
                });
            }
            InputMode::Editing => {
                if let Some(id) = self.target_id.take() {
                    let unchanged = self.store.find(&id).map(|t| t.title == title).unwrap_or(true);
                    if !unchanged {
                        self.spawn(|store| async move {
                            let _ = store.edit(&id, &title).await;
                        });
                    }
                }
            }
            _ => {}
        }
        self.cancel_input();
    }

    pub fn start_search(&mut self) {
        self.input_mode = InputMode::Searching;
    }

    pub fn search_push(&mut self, c: char) {
        let mut value = self.search.value.clone();
        value.push(c);
        self.search.set(value);
    }

    pub fn search_pop(&mut self) {
        let mut value = self.search.value.clone();
        value.pop();
        self.search.set(value);
    }

    /// Clears the query immediately and leaves search mode.
    pub fn cancel_search(&mut self) {
        self.search = Debounced::new(SEARCH_DEBOUNCE);
        self.store.set_search("");
        self.input_mode = InputMode::Normal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_waits_for_quiet_period() {
        let mut d = Debounced::new(Duration::from_millis(50));
        assert_eq!(d.take_settled(), None);
        d.set("mil".into());
        assert_eq!(d.take_settled(), None);
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(d.take_settled(), Some("mil".to_string()));
        assert_eq!(d.take_settled(), None);
    }

    #[test]
    fn test_zero_delay_settles_immediately() {
        let mut d = Debounced::new(Duration::ZERO);
        d.set("x".into());
        assert_eq!(d.take_settled(), Some("x".to_string()));
    }
}
