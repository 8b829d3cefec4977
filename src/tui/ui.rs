use chrono::Local;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

use super::app::{App, InputMode};
use crate::commands::{short_id, showing_line};
use crate::notify::Level;

pub fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // View bar
            Constraint::Min(0),    // Table
            Constraint::Length(3), // Help
        ].as_ref())
        .split(f.area());

    let search = if app.input_mode == InputMode::Searching || !app.search.value.is_empty() {
        format!(" | Search: {}", app.search.value)
    } else {
        String::new()
    };
    let bar = format!(
        "Filter: {} | Sort: {}{} | {}",
        app.view.filter.label(),
        app.view.sort.label(),
        search,
        showing_line(app.displayed.len(), app.total),
    );
    let bar = Paragraph::new(bar)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).title("Task Master"));
    f.render_widget(bar, chunks[0]);

    if app.is_loading {
        let loading = Paragraph::new("Loading...")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(loading, chunks[1]);
    } else if app.displayed.is_empty() {
        let empty = Paragraph::new("No tasks yet. Press 'a' to add one!")
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(empty, chunks[1]);
    } else {
        let rows: Vec<Row> = app
            .displayed
            .iter()
            .map(|t| {
                let style = if t.completed {
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
                } else {
                    Style::default()
                };
                Row::new(vec![
                    Cell::from(if t.completed { "[x]" } else { "[ ]" }),
                    Cell::from(t.title.clone()),
                    Cell::from(t.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()),
                    Cell::from(short_id(&t.id).to_string()),
                ]).style(style)
            })
            .collect();

        let widths = [
            Constraint::Length(4),
            Constraint::Min(20),
            Constraint::Length(17),
            Constraint::Length(9),
        ];

        let table = Table::new(rows, widths)
            .header(Row::new(vec!["", "Title", "Created", "ID"])
                .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
                .bottom_margin(1))
            .block(Block::default().borders(Borders::ALL).title("Tasks"))
            .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
            .highlight_symbol(">> ");

        f.render_stateful_widget(table, chunks[1], &mut app.state);
    }

    let help_text = match app.input_mode {
        InputMode::Normal => "q: Quit | a: Add | e: Edit | Space: Toggle | d: Del | f: Filter | s: Sort | /: Search | J/K: Move | x: Clear Done | r: Reload",
        InputMode::Editing | InputMode::Adding => "Enter: Save | Esc: Cancel",
        InputMode::Searching => "Type to search | Enter: Done | Esc: Clear",
    };

    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(help, chunks[2]);

    render_toasts(f, app);

    // Input box
    if let InputMode::Editing | InputMode::Adding = app.input_mode {
        let area = centered_rect(60, 3, f.area());
        f.render_widget(Clear, area);

        let title = match app.input_mode {
            InputMode::Adding => "What needs to be done?",
            _ => "Edit Title",
        };

        let input = Paragraph::new(app.input_buffer.as_str())
            .style(Style::default().fg(Color::Yellow))
            .block(Block::default().borders(Borders::ALL).title(title));

        f.render_widget(input, area);
    }
}

/// Stacks recent notifications in the bottom-right corner, above the help bar.
fn render_toasts(f: &mut Frame, app: &App) {
    let toasts = app.recent_toasts();
    if toasts.is_empty() {
        return;
    }
    let area = f.area();
    let width = 40.min(area.width);
    let height = (toasts.len() as u16 + 2).min(area.height.saturating_sub(3));
    if height < 3 {
        return;
    }
    let rect = Rect {
        x: area.x + area.width - width,
        y: area.y + area.height.saturating_sub(3 + height),
        width,
        height,
    };
    let lines: Vec<Line> = toasts
        .iter()
        .map(|n| {
            let color = match n.level {
                Level::Success => Color::Green,
                Level::Error => Color::Red,
            };
            Line::styled(n.message.clone(), Style::default().fg(color))
        })
        .collect();
    f.render_widget(Clear, rect);
    f.render_widget(Paragraph::new(lines).block(Block::default().borders(Borders::ALL)), rect);
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let margin = r.height.saturating_sub(height) / 2;
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(margin),
            Constraint::Length(height),
            Constraint::Length(margin),
        ].as_ref())
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ].as_ref())
        .split(popup_layout[1])[1]
}
