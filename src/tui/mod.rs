pub mod app;
pub mod ui;

use std::sync::Arc;
use std::time::Duration;
use std::{error::Error, io};

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use crate::notify::NotificationLog;
use crate::storage::{FileStorage, Storage};
use crate::store::TaskStore;
use app::{App, InputMode};
use ui::ui;

const TICK: Duration = Duration::from_millis(100);
const WATCH_INTERVAL: Duration = Duration::from_millis(500);

/// Runs the interactive client. Must be called from inside a tokio runtime.
pub fn run_tui(store: Arc<TaskStore>, storage: Arc<FileStorage>, toasts: Arc<NotificationLog>) -> Result<(), Box<dyn Error>> {
    // Reload when another process writes the tasks file
    let subscription = store.watch_storage(storage.subscribe());
    let watcher = storage.watch(WATCH_INTERVAL);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(store, toasts);
    app.reload();

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    subscription.unsubscribe();
    watcher.abort();

    if let Err(err) = res {
        println!("{:?}", err)
    }

    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        app.tick();
        terminal.draw(|f| ui(f, app))?;

        if !event::poll(TICK)? {
            continue;
        }
        let key = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => key,
            _ => continue,
        };
        match app.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Char(' ') => app.toggle_selected(),
                KeyCode::Char('d') | KeyCode::Delete => app.delete_selected(),
                KeyCode::Char('a') => app.start_add(),
                KeyCode::Char('e') | KeyCode::Enter => app.start_edit(),
                KeyCode::Char('f') => app.cycle_filter(),
                KeyCode::Char('s') => app.flip_sort(),
                KeyCode::Char('/') => app.start_search(),
                KeyCode::Char('J') => app.move_selected(1),
                KeyCode::Char('K') => app.move_selected(-1),
                KeyCode::Char('x') => app.clear_completed(),
                KeyCode::Char('r') => app.reload(),
                _ => {}
            },
            InputMode::Editing | InputMode::Adding => match key.code {
                KeyCode::Enter => app.handle_input(),
                KeyCode::Esc => app.cancel_input(),
                KeyCode::Char(c) => {
                    app.input_buffer.push(c);
                }
                KeyCode::Backspace => {
                    app.input_buffer.pop();
                }
                _ => {}
            },
            InputMode::Searching => match key.code {
                KeyCode::Enter => app.input_mode = InputMode::Normal,
                KeyCode::Esc => app.cancel_search(),
                KeyCode::Char(c) => app.search_push(c),
                KeyCode::Backspace => app.search_pop(),
                _ => {}
            },
        }
    }
}
