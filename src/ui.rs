use crate::app::{ActiveInput, App, InputMode};
use crate::dates::{format_date, format_time, DueStatus};
use crate::models::{Assignment, Priority};
use crate::storage::KeyValueStore;
use chrono::{DateTime, Local};
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
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

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Green,
    }
}

fn status_color(status: DueStatus) -> Color {
    match status {
        DueStatus::Completed => Color::Green,
        DueStatus::Overdue(_) => Color::Red,
        DueStatus::DueToday => Color::LightRed,
        DueStatus::DueSoon(_) => Color::Yellow,
        DueStatus::Upcoming(_) => Color::Gray,
    }
}

fn key_hint(key: &'static str, action: &'static str) -> [Span<'static>; 2] {
    [
        Span::styled(key, Style::default().fg(Color::Red)),
        Span::raw(action),
    ]
}

fn get_legend(input_mode: &InputMode) -> Text<'static> {
    let hints: Vec<[Span<'static>; 2]> = match input_mode {
        InputMode::Normal => vec![
            key_hint(" q ", ": Quit "),
            key_hint(" j/k ", ": Down/Up "),
            key_hint(" a ", ": Add "),
            key_hint(" e ", ": Edit "),
            key_hint(" d ", ": Delete "),
            key_hint(" Space ", ": Toggle Done "),
            key_hint(" / ", ": Search "),
            key_hint(" f ", ": Subject "),
            key_hint(" p ", ": Priority "),
            key_hint(" t ", ": Show Done "),
            key_hint(" s ", ": Sort "),
            key_hint(" c ", ": Clear Filters "),
        ],
        InputMode::Editing => vec![
            key_hint(" i ", ": Insert "),
            key_hint(" Tab ", ": Switch Field "),
            key_hint(" Enter ", ": Submit "),
            key_hint(" Esc ", ": Cancel "),
        ],
        InputMode::Insert => vec![
            key_hint(" Esc ", ": Stop Typing "),
            key_hint(" Markers ", ": !high #Subject @tomorrow @+3 @2026-10-21T17:00 "),
            key_hint(" \\# ", ": Literal Marker "),
        ],
        InputMode::Search => vec![
            key_hint(" Enter/Esc ", ": Done "),
            key_hint(" Backspace ", ": Delete Character "),
        ],
    };
    Text::from(Line::from(hints.into_iter().flatten().collect::<Vec<_>>()))
}

fn render_header<S: KeyValueStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let stats = app.store.completion_stats();
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Homework Tracker"))
        .gauge_style(Style::default().fg(Color::Blue))
        .percent(stats.percentage.min(100) as u16)
        .label(format!(
            "{}% ({} of {} completed)",
            stats.percentage, stats.completed, stats.total
        ));
    f.render_widget(gauge, area);
}

fn render_filters<S: KeyValueStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let search_style = if app.input_mode == InputMode::Search {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    };
    let params = &app.params;

    let line = Line::from(vec![
        Span::styled("Search: ", bold),
        Span::styled(format!("{:<12}", params.search_term), search_style),
        Span::styled(" Subject: ", bold),
        Span::raw(params.subject.clone().unwrap_or_else(|| "All".to_string())),
        Span::styled(" Priority: ", bold),
        Span::raw(
            params
                .priority
                .map(|p| p.to_string())
                .unwrap_or_else(|| "All".to_string()),
        ),
        Span::styled(" Completed: ", bold),
        Span::raw(if params.show_completed { "Shown" } else { "Hidden" }),
        Span::styled(" Sort: ", bold),
        Span::raw(params.sort_key.to_string()),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn assignment_item(assignment: &Assignment, now: &DateTime<Local>) -> ListItem<'static> {
    let status = DueStatus::of(assignment, now);
    let title_style = if assignment.is_completed {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default()
    };

    ListItem::new(Line::from(vec![
        Span::styled(
            format!("{:<16}", status.to_string()),
            Style::default().fg(status_color(status)),
        ),
        Span::styled(
            format!("{:<7}", assignment.priority.as_str().to_uppercase()),
            Style::default().fg(priority_color(assignment.priority)),
        ),
        Span::styled(
            format!("[{}] ", assignment.subject),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(assignment.title.clone(), title_style),
    ]))
}

fn detail_lines(assignment: &Assignment, now: &DateTime<Local>) -> Vec<Line<'static>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let due = assignment.due_date.with_timezone(&Local);
    let created = assignment.created_at.with_timezone(&Local);
    let status = DueStatus::of(assignment, now);

    let mut lines = vec![
        Line::from(Span::styled(assignment.title.clone(), bold)),
        Line::from(vec![
            Span::styled("Subject: ", bold),
            Span::raw(assignment.subject.clone()),
        ]),
        Line::from(vec![
            Span::styled("Priority: ", bold),
            Span::styled(
                assignment.priority.to_string(),
                Style::default().fg(priority_color(assignment.priority)),
            ),
        ]),
        Line::from(vec![
            Span::styled("Due: ", bold),
            Span::raw(format!("{} at {}", format_date(&due), format_time(&due))),
        ]),
        Line::from(vec![
            Span::styled("Status: ", bold),
            Span::styled(status.to_string(), Style::default().fg(status_color(status))),
        ]),
        Line::from(vec![
            Span::styled("Created: ", bold),
            Span::raw(format_date(&created)),
        ]),
        Line::from(""),
        Line::from(Span::styled("Description: ", bold)),
    ];

    if assignment.description.trim().is_empty() {
        lines.push(Line::from("No description"));
    } else {
        lines.extend(
            assignment
                .description
                .lines()
                .map(|line| Line::from(line.to_string())),
        );
    }
    lines
}

fn render_body<S: KeyValueStore>(f: &mut Frame, app: &mut App<S>, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
        .split(area);
    let now = Local::now();

    let visible = app.visible();
    let list_title = format!("Assignments ({})", visible.len());
    let list_widget = if !visible.is_empty() {
        let items: Vec<ListItem> = visible
            .iter()
            .map(|assignment| assignment_item(assignment, &now))
            .collect();

        List::new(items)
            .block(Block::default().borders(Borders::ALL).title(list_title))
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ")
    } else {
        let message = if app.store.assignments().is_empty() {
            "No homework yet. Press 'a' to add an assignment."
        } else {
            "No homework matches your current filters. Press 'c' to clear them."
        };
        List::new(vec![ListItem::new(message)])
            .block(Block::default().borders(Borders::ALL).title(list_title))
    };

    let detail_block = Block::default().borders(Borders::ALL).title("Details");
    let detail = match app.selected() {
        Some(assignment) => Paragraph::new(detail_lines(assignment, &now)),
        None => Paragraph::new("Select an assignment to see its details"),
    }
    .block(detail_block)
    .wrap(Wrap { trim: true });

    f.render_stateful_widget(list_widget, chunks[0], &mut app.state);
    f.render_widget(detail, chunks[1]);
}

fn render_form<S: KeyValueStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let popup_width = ((u32::from(area.width) * 60 / 100) as u16).max(20);
    let popup_height = 10u16.min(area.height);
    let popup_area = centered_rect_absolute(popup_width, popup_height, area);

    let form_title = if app.editing_id.is_some() {
        "Edit Assignment (Enter to Submit)"
    } else {
        "New Assignment (Enter to Submit)"
    };
    let field_style = |field: ActiveInput| {
        if app.active_input == field {
            let color = if app.input_mode == InputMode::Insert {
                Color::Yellow
            } else {
                Color::Green
            };
            Style::default().fg(color)
        } else {
            Style::default().fg(Color::White)
        }
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)].as_ref())
        .split(popup_area);

    let title_input = Paragraph::new(app.new_assignment_input.as_str())
        .style(field_style(ActiveInput::Title))
        .block(Block::default().borders(Borders::ALL).title(form_title))
        .wrap(Wrap { trim: false });
    let description_input = Paragraph::new(app.new_assignment_description.as_str())
        .style(field_style(ActiveInput::Description))
        .block(Block::default().borders(Borders::ALL).title("Description"))
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(title_input, chunks[0]);
    f.render_widget(description_input, chunks[1]);
}

fn render_footer<S: KeyValueStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let mut legend = get_legend(&app.input_mode);
    if let Some(status) = &app.status {
        legend.lines.insert(
            0,
            Line::from(Span::styled(
                status.clone(),
                Style::default().fg(Color::Yellow),
            )),
        );
    }

    let footer = Paragraph::new(legend)
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });
    f.render_widget(footer, area);
}

pub fn run_app<B: Backend, S: KeyValueStore>(
    terminal: &mut Terminal<B>,
    mut app: App<S>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| {
            let size = f.area();

            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(0)
                .constraints(
                    [
                        Constraint::Length(3),
                        Constraint::Length(1),
                        Constraint::Min(0),
                        Constraint::Length(3),
                    ]
                    .as_ref(),
                )
                .split(size);

            render_header(f, &app, chunks[0]);
            render_filters(f, &app, chunks[1]);
            render_body(f, &mut app, chunks[2]);
            if matches!(app.input_mode, InputMode::Editing | InputMode::Insert) {
                render_form(f, &app, chunks[2]);
            }
            render_footer(f, &app, chunks[3]);
        })?;

        // Handle input
        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let should_quit = app.handle_input(key);
                if should_quit {
                    return Ok(());
                }
            }
        }
    }
}
