//! UI rendering

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use chainlist_core::SyncPhase;

use super::app::{App, ErrorModal, InputMode};

/// Main UI rendering function
pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0]);
    draw_list(frame, app, chunks[1]);

    match app.input_mode {
        InputMode::Normal => draw_status_bar(frame, app, chunks[2]),
        InputMode::Add => draw_input(frame, app, chunks[2], "+ ", Color::Green),
        InputMode::Edit => draw_input(frame, app, chunks[2], "edit: ", Color::Yellow),
    }

    if let Some(ref error) = app.error {
        draw_error_modal(frame, error);
    } else if app.show_help {
        draw_help_overlay(frame);
    }
}

/// Identity, counts and phase
fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let view = &app.view;

    let identity = match view.short_identity() {
        Some(id) => Span::styled(id, Style::default().add_modifier(Modifier::BOLD)),
        None => Span::styled("not connected", Style::default().fg(Color::Red)),
    };

    let (phase_text, phase_style) = match view.phase {
        SyncPhase::Idle => ("●".to_string(), Style::default().fg(Color::Green)),
        SyncPhase::Failed => ("✗ failed".to_string(), Style::default().fg(Color::Red)),
        phase => (format!("↻ {}", phase), Style::default().fg(Color::Yellow)),
    };

    let line = Line::from(vec![
        Span::raw(" chainlist  "),
        identity,
        Span::styled(
            format!(
                "  {} active, {} completed  ",
                view.active_count, view.completed_count
            ),
            Style::default().add_modifier(Modifier::DIM),
        ),
        Span::styled(phase_text, phase_style),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

fn draw_list(frame: &mut Frame, app: &App, area: Rect) {
    let view = &app.view;
    let max_len = area.width.saturating_sub(8) as usize;

    let items: Vec<ListItem> = view
        .rows()
        .iter()
        .map(|row| {
            let mark = if row.completed { "[x] " } else { "[ ] " };
            let mut style = Style::default();
            if row.completed {
                style = style
                    .add_modifier(Modifier::DIM)
                    .add_modifier(Modifier::CROSSED_OUT);
            }
            if view.is_editing(row.index) {
                style = style.fg(Color::Yellow);
            }

            ListItem::new(Line::from(vec![
                Span::raw(mark),
                Span::styled(truncate(&row.text, max_len), style),
            ]))
        })
        .collect();

    let title = if view.connected {
        format!(" Todos ({}) ", view.rows().len())
    } else {
        " Todos ".to_string()
    };
    let block = Block::default().title(title).borders(Borders::ALL);

    if items.is_empty() {
        let hint = if view.connected {
            "No entries. Press a to add one."
        } else {
            "Press o to connect."
        };
        let paragraph = Paragraph::new(hint)
            .block(block)
            .style(Style::default().add_modifier(Modifier::DIM));
        frame.render_widget(paragraph, area);
        return;
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = ListState::default();
    state.select(Some(app.selected));

    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let content = if let Some(msg) = &app.status_message {
        msg.clone()
    } else {
        "a:add  e:edit  space:toggle  d:del  c:clear done  r:refresh  ?:help  q:quit".to_string()
    };

    let paragraph = Paragraph::new(content).style(Style::default().add_modifier(Modifier::DIM));

    frame.render_widget(paragraph, area);
}

/// Draw the text input line at the bottom
fn draw_input(frame: &mut Frame, app: &App, area: Rect, prefix: &str, color: Color) {
    let input = app.input_text();

    let line = Line::from(vec![
        Span::styled(prefix, Style::default().fg(color)),
        Span::raw(input),
    ]);

    frame.render_widget(Paragraph::new(line), area);

    // Cursor sits at the end of the input
    let cursor_x = area.x + (prefix.chars().count() + input.chars().count()) as u16;
    frame.set_cursor_position((cursor_x.min(area.right().saturating_sub(1)), area.y));
}

fn draw_error_modal(frame: &mut Frame, error: &ErrorModal) {
    let popup_area = centered_rect(frame.area(), 60, 9);
    frame.render_widget(Clear, popup_area);

    let title = if error.data_loss {
        " Data may have been lost "
    } else {
        " Error "
    };

    let mut lines = vec![Line::from(error.message.clone()), Line::from("")];
    if let Some(ref notice) = error.notice {
        lines.push(Line::from(Span::styled(
            notice.clone(),
            Style::default().add_modifier(Modifier::ITALIC),
        )));
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
        "Press any key to close",
        Style::default().add_modifier(Modifier::DIM),
    )));

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, popup_area);
}

fn draw_help_overlay(frame: &mut Frame) {
    let popup_area = centered_rect(frame.area(), 44, 19);
    frame.render_widget(Clear, popup_area);

    let help_text = vec![
        Line::from(vec![Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from(""),
        Line::from("  j/k, ↑/↓    Move up/down"),
        Line::from("  g/G         First/last entry"),
        Line::from(""),
        Line::from("  a           Add entry"),
        Line::from("  e           Edit entry (moves to end)"),
        Line::from("  space       Toggle completed"),
        Line::from("  d           Delete entry"),
        Line::from("  c           Clear completed"),
        Line::from("  r           Refresh"),
        Line::from("  o / x       Connect / disconnect"),
        Line::from("  q           Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default().title(" Help ").borders(Borders::ALL);
    frame.render_widget(Paragraph::new(help_text).block(block), popup_area);
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

/// Truncate to max characters, adding "…" if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
