use crate::api::TaskApi;
use crate::app::{App, InputMode};
use crate::models::{Task, TaskPriority, TaskStatus};
use crate::parser::format_filter;
use chrono::NaiveDate;
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn key_hint(key: &'static str, label: &'static str) -> [Span<'static>; 2] {
    [
        Span::styled(key, Style::default().fg(Color::Red)),
        Span::raw(label),
    ]
}

fn get_legend(input_mode: InputMode, detail_open: bool) -> Text<'static> {
    let hints: Vec<[Span<'static>; 2]> = match input_mode {
        InputMode::Normal if detail_open => vec![
            key_hint(" Esc ", ": Close "),
            key_hint(" q ", ": Quit "),
        ],
        InputMode::Normal => vec![
            key_hint(" q ", ": Quit "),
            key_hint(" h/l ", ": Column "),
            key_hint(" j/k ", ": Card "),
            key_hint(" H/L ", ": Move Card "),
            key_hint(" Enter ", ": Details "),
            key_hint(" a ", ": Add "),
            key_hint(" d ", ": Delete "),
            key_hint(" f ", ": Filter "),
            key_hint(" c ", ": Clear Filters "),
            key_hint(" r ", ": Refresh "),
            key_hint(" Esc ", ": Dismiss Error "),
        ],
        InputMode::Adding | InputMode::Filtering => vec![
            key_hint(" Enter ", ": Submit "),
            key_hint(" Esc ", ": Cancel "),
        ],
    };
    Text::from(Line::from(hints.into_iter().flatten().collect::<Vec<_>>()))
}

fn priority_style(priority: TaskPriority) -> Style {
    match priority {
        TaskPriority::High => Style::default().fg(Color::Red),
        TaskPriority::Medium => Style::default().fg(Color::Yellow),
        TaskPriority::Low => Style::default().fg(Color::Green),
    }
}

fn task_item(task: &Task, today: NaiveDate) -> ListItem<'static> {
    let due_style = if task.status != TaskStatus::Done && task.due_date < today {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    ListItem::new(vec![
        Line::from(vec![
            Span::styled(
                format!("[{}] ", task.priority),
                priority_style(task.priority),
            ),
            Span::raw(task.title.clone()),
        ]),
        Line::from(Span::styled(format!("    due {}", task.due_date), due_style)),
    ])
}

fn header_line(task_count: usize, filter: &str, active: usize, loading: bool) -> Line<'static> {
    let mut spans = vec![
        Span::styled(" Kanban ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(" {task_count} issues ")),
    ];
    if active > 0 {
        spans.push(Span::styled(
            format!(" Filters ({active}): {filter} "),
            Style::default().bg(Color::Blue).fg(Color::White),
        ));
    }
    if loading {
        spans.push(Span::styled(" Loading... ", Style::default().fg(Color::Yellow)));
    }
    Line::from(spans)
}

pub fn draw<A: TaskApi>(f: &mut Frame, app: &mut App<A>) {
    let size = f.area();
    let state = app.store.snapshot();
    let today = app.today();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Length(if state.error.is_some() { 1 } else { 0 }),
                Constraint::Min(0),
                Constraint::Length(2),
            ]
            .as_ref(),
        )
        .split(size);

    let header = header_line(
        state.tasks.len(),
        &format_filter(&state.filter),
        state.filter.active_count(),
        state.loading,
    );
    f.render_widget(Paragraph::new(header), chunks[0]);

    if let Some(ref error) = state.error {
        let banner = Paragraph::new(format!(" {error} "))
            .style(Style::default().bg(Color::Red).fg(Color::White));
        f.render_widget(banner, chunks[1]);
    }

    let body_chunk = chunks[2];
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage(33),
                Constraint::Percentage(33),
                Constraint::Percentage(34),
            ]
            .as_ref(),
        )
        .split(body_chunk);

    for status in TaskStatus::ALL {
        let column = status.column();
        let tasks = state.column(status);
        let title = format!(" {} ({}) ", status.label(), tasks.len());
        let focused = app.selected_column == column;

        let items: Vec<ListItem> = if tasks.is_empty() {
            vec![ListItem::new(Span::styled(
                "No tasks",
                Style::default().fg(Color::DarkGray),
            ))]
        } else {
            tasks.iter().map(|task| task_item(task, today)).collect()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(if focused {
                        Style::default().fg(Color::Cyan)
                    } else {
                        Style::default()
                    }),
            )
            .highlight_style(if focused {
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            })
            .highlight_symbol(if focused { ">> " } else { "   " });

        f.render_stateful_widget(list, columns[column], &mut app.column_states[column]);
    }

    match app.input_mode {
        InputMode::Adding => render_prompt(
            f,
            body_chunk,
            "New Task: title !priority @YYYY-MM-DD -- description",
            &app.input,
            app.form_error.as_deref(),
        ),
        InputMode::Filtering => render_prompt(
            f,
            body_chunk,
            "Filter: !priority from:YYYY-MM-DD to:YYYY-MM-DD (empty clears)",
            &app.input,
            app.form_error.as_deref(),
        ),
        InputMode::Normal => {
            if let Some(ref detail) = app.task_detail {
                render_detail(f, body_chunk, detail);
            }
        }
    }

    // Render the legend in the footer
    let legend = Paragraph::new(get_legend(app.input_mode, app.task_detail.is_some()))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    f.render_widget(legend, chunks[3]);
}

fn render_prompt(f: &mut Frame, area: Rect, title: &str, input: &str, error: Option<&str>) {
    let popup_width = (area.width * 70 / 100).saturating_sub(2);

    let lines_required = calculate_wrapped_lines(input, popup_width);
    let error_lines = error.map_or(0, |e| calculate_wrapped_lines(e, popup_width));
    let required_height = std::cmp::max(lines_required as u16, 1) + error_lines as u16;

    let popup_height = std::cmp::min(required_height + 2, area.height.saturating_sub(2));
    let popup_area = centered_rect_absolute(popup_width + 2, popup_height, area);

    let popup_block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Green));

    let mut lines = vec![Line::from(Span::styled(
        input.to_string(),
        Style::default().fg(Color::White),
    ))];
    if let Some(error) = error {
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .block(popup_block)
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(paragraph, popup_area);
}

fn render_detail(f: &mut Frame, area: Rect, detail: &Task) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let field = |name: &'static str, value: String| {
        Line::from(vec![Span::styled(name, bold), Span::raw(value)])
    };

    let mut lines = vec![
        Line::from(Span::styled(detail.title.clone(), bold.fg(Color::Cyan))),
        Line::from(""),
        field("Status: ", detail.status.label().to_string()),
        Line::from(vec![
            Span::styled("Priority: ", bold),
            Span::styled(detail.priority.to_string(), priority_style(detail.priority)),
        ]),
        field("Due Date: ", detail.due_date.to_string()),
        field(
            "Created: ",
            detail.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ),
        field(
            "Updated: ",
            detail.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        ),
        Line::from(""),
        Line::from(Span::styled("Description: ", bold)),
    ];
    match &detail.description {
        Some(description) => lines.extend(description.lines().map(|l| Line::from(l.to_string()))),
        None => lines.push(Line::from("No description")),
    }

    let width = (area.width * 60 / 100).max(30).min(area.width);
    let height = (lines.len() as u16 + 2).min(area.height);
    let popup_area = centered_rect_absolute(width, height, area);

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(format!(" Task {} ", detail.id))
                .borders(Borders::ALL),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(Clear, popup_area);
    f.render_widget(paragraph, popup_area);
}

pub async fn run_app<B: Backend, A: TaskApi>(
    terminal: &mut Terminal<B>,
    mut app: App<A>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, &mut app))?;

        // Handle input
        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let should_quit = app.handle_input(key).await?;
                if should_quit {
                    return Ok(());
                }
            }
        }
    }
}

fn calculate_wrapped_lines(text: &str, max_width: u16) -> usize {
    let max_width = max_width.max(1) as usize;
    let mut line_count = 0;
    for line in text.lines() {
        let line_width = line.chars().count();
        line_count += line_width.div_ceil(max_width);
    }
    line_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_lines() {
        assert_eq!(calculate_wrapped_lines("", 10), 0);
        assert_eq!(calculate_wrapped_lines("abcde", 10), 1);
        assert_eq!(calculate_wrapped_lines("abcdefghijk", 10), 2);
        assert_eq!(calculate_wrapped_lines("ab\ncd", 10), 2);
        assert_eq!(calculate_wrapped_lines("abc", 0), 3);
    }

    #[test]
    fn test_centered_rect_fits_inside() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = centered_rect_absolute(50, 10, area);
        assert_eq!(popup, Rect::new(25, 15, 50, 10));
    }

    #[test]
    fn test_header_shows_count_and_filters() {
        let line = header_line(3, "!high", 1, true);
        let text: String = line.spans.iter().map(|span| &*span.content).collect();
        assert!(text.contains("3 issues"));
        assert!(text.contains("Filters (1): !high"));
        assert!(text.contains("Loading"));

        let line = header_line(0, "", 0, false);
        let text: String = line.spans.iter().map(|span| &*span.content).collect();
        assert!(!text.contains("Filters"));
    }
}
