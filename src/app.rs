use crate::config::Config;
use crate::models::{Assignment, AssignmentDraft, AssignmentPatch, Priority};
use crate::parser::{parse_assignment_input, render_assignment_input, to_utc, ParsedAssignment};
use crate::storage::KeyValueStore;
use crate::store::{AssignmentStore, StoreError};
use crate::view::ViewParams;
use chrono::{DateTime, Local, TimeZone, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::ListState;
use tracing::{error, info};

pub struct App<S> {
    pub store: AssignmentStore<S>,
    pub params: ViewParams,
    pub state: ListState,
    pub input_mode: InputMode,
    pub active_input: ActiveInput,
    pub new_assignment_input: String,
    pub new_assignment_description: String,
    pub editing_id: Option<String>,
    // What the edit form was opened with, parsed back
    edit_baseline: Option<ParsedAssignment>,
    pub status: Option<String>,
    default_priority: Priority,
    default_subject: String,
}

#[derive(Debug, PartialEq)]
pub enum InputMode {
    Normal,
    Editing,
    Insert,
    Search,
}

#[derive(Debug, PartialEq)]
pub enum ActiveInput {
    Title,
    Description,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(store: AssignmentStore<S>, config: &Config) -> App<S> {
        let mut app = App {
            store,
            params: config.view_params(),
            state: ListState::default(),
            input_mode: InputMode::Normal,
            active_input: ActiveInput::Title,
            new_assignment_input: String::new(),
            new_assignment_description: String::new(),
            editing_id: None,
            edit_baseline: None,
            status: None,
            default_priority: config.default_priority,
            default_subject: config.default_subject.clone(),
        };
        app.clamp_selection();
        app
    }

    pub fn visible(&self) -> Vec<&Assignment> {
        self.store.visible(&self.params)
    }

    pub fn selected(&self) -> Option<&Assignment> {
        let index = self.state.selected()?;
        self.visible().get(index).copied()
    }

    fn selected_id(&self) -> Option<String> {
        self.selected().map(|assignment| assignment.id.clone())
    }

    /// Keeps the selection inside the visible list after it changes.
    pub fn clamp_selection(&mut self) {
        let len = self.visible().len();
        let selected = match self.state.selected() {
            _ if len == 0 => None,
            Some(i) => Some(i.min(len - 1)),
            None => Some(0),
        };
        self.state.select(selected);
    }

    fn select_id(&mut self, id: &str) {
        let index = self.visible().iter().position(|a| a.id == id);
        if index.is_some() {
            self.state.select(index);
        } else {
            self.clamp_selection();
        }
    }

    pub fn next(&mut self) {
        let len = self.visible().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn cycle_subject_filter(&mut self) {
        let subjects = self.store.subjects();
        self.params.subject = match &self.params.subject {
            None => subjects.first().cloned(),
            Some(current) => subjects
                .iter()
                .position(|subject| subject == current)
                .and_then(|i| subjects.get(i + 1))
                .cloned(),
        };
        self.clamp_selection();
    }

    pub fn cycle_priority_filter(&mut self) {
        self.params.priority = match self.params.priority {
            None => Some(Priority::High),
            Some(Priority::High) => Some(Priority::Medium),
            Some(Priority::Medium) => Some(Priority::Low),
            Some(Priority::Low) => None,
        };
        self.clamp_selection();
    }

    pub fn toggle_show_completed(&mut self) {
        self.params.show_completed = !self.params.show_completed;
        self.clamp_selection();
    }

    pub fn cycle_sort(&mut self) {
        let selected = self.selected_id();
        self.params.sort_key = self.params.sort_key.next();
        match selected {
            Some(id) => self.select_id(&id),
            None => self.clamp_selection(),
        }
    }

    pub fn clear_filters(&mut self) {
        self.params.clear_filters();
        self.clamp_selection();
    }

    pub fn open_new_form(&mut self) {
        self.editing_id = None;
        self.edit_baseline = None;
        self.new_assignment_input.clear();
        self.new_assignment_description.clear();
        self.active_input = ActiveInput::Title;
        self.input_mode = InputMode::Editing;
    }

    pub fn open_edit_form(&mut self) {
        let Some(assignment) = self.selected() else {
            return;
        };
        let input = render_assignment_input(assignment, &Local);
        let description = assignment.description.clone();
        let id = assignment.id.clone();

        self.edit_baseline = Some(parse_assignment_input(&input));
        self.new_assignment_input = input;
        self.new_assignment_description = description;
        self.editing_id = Some(id);
        self.active_input = ActiveInput::Title;
        self.input_mode = InputMode::Editing;
    }

    fn close_form(&mut self) {
        self.new_assignment_input.clear();
        self.new_assignment_description.clear();
        self.editing_id = None;
        self.edit_baseline = None;
        self.input_mode = InputMode::Normal;
    }

    /// Creates or updates from the form, resolving relative due dates
    /// against `now`.
    pub fn submit_form<Tz: TimeZone>(&mut self, now: DateTime<Tz>) {
        let parsed = parse_assignment_input(&self.new_assignment_input);
        if parsed.title.is_empty() {
            self.status = Some("Assignment title cannot be empty.".to_string());
            return;
        }

        let today = now.date_naive();
        let tz = now.timezone();
        let due_date = parsed
            .due
            .and_then(|due| due.resolve(today))
            .map(|due| to_utc(due, &tz));
        let description = self.new_assignment_description.trim().to_string();

        let result = match self.editing_id.clone() {
            Some(id) => {
                let unchanged_description = self
                    .store
                    .get(&id)
                    .is_some_and(|a| a.description.trim() == description);
                let mut patch = match &self.edit_baseline {
                    Some(baseline) => changed_fields(parsed, baseline, due_date),
                    None => AssignmentPatch {
                        title: Some(parsed.title),
                        subject: parsed.subject,
                        due_date,
                        priority: parsed.priority,
                        ..Default::default()
                    },
                };
                if !unchanged_description {
                    patch.description = Some(description);
                }
                self.store
                    .update(&id, patch)
                    .map(|updated| (updated.id.clone(), format!("Updated '{}'", updated.title)))
            }
            None => {
                let draft = AssignmentDraft {
                    title: parsed.title,
                    subject: parsed
                        .subject
                        .unwrap_or_else(|| self.default_subject.clone()),
                    description,
                    due_date: due_date.unwrap_or_else(|| now.with_timezone(&Utc)),
                    priority: parsed.priority.unwrap_or(self.default_priority),
                };
                self.store
                    .create(draft)
                    .map(|created| (created.id.clone(), format!("Added '{}'", created.title)))
            }
        };

        match result {
            Ok((id, message)) => {
                info!("{}", message);
                self.status = Some(message);
                self.close_form();
                self.select_id(&id);
            }
            Err(err) => {
                self.report("Could not save assignment", err);
                self.close_form();
                self.clamp_selection();
            }
        }
    }

    pub fn toggle_selected(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        match self.store.toggle_complete(&id) {
            Ok(Some(assignment)) => {
                let state = if assignment.is_completed {
                    "completed"
                } else {
                    "not completed"
                };
                self.status = Some(format!("Marked '{}' {}", assignment.title, state));
            }
            Ok(None) => {}
            Err(err) => self.report("Could not save assignment", err),
        }
        self.clamp_selection();
    }

    pub fn delete_selected(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        match self.store.delete(&id) {
            Ok(Some(removed)) => self.status = Some(format!("Deleted '{}'", removed.title)),
            Ok(None) => {}
            Err(err) => self.report("Could not save after delete", err),
        }
        self.clamp_selection();
    }

    fn report(&mut self, context: &str, err: StoreError) {
        error!(error = %err, "{}", context);
        self.status = Some(format!("{}: {}", context, err));
    }

    /// Returns true when the user asked to quit.
    pub fn handle_input(&mut self, key: KeyEvent) -> bool {
        match self.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => return true,
                KeyCode::Char('j') | KeyCode::Down => self.next(),
                KeyCode::Char('k') | KeyCode::Up => self.previous(),
                KeyCode::Char('a') => self.open_new_form(),
                KeyCode::Char('e') => self.open_edit_form(),
                KeyCode::Char('d') => self.delete_selected(),
                KeyCode::Char(' ') => self.toggle_selected(),
                KeyCode::Char('/') => self.input_mode = InputMode::Search,
                KeyCode::Char('f') => self.cycle_subject_filter(),
                KeyCode::Char('p') => self.cycle_priority_filter(),
                KeyCode::Char('t') => self.toggle_show_completed(),
                KeyCode::Char('s') => self.cycle_sort(),
                KeyCode::Char('c') => self.clear_filters(),
                _ => {}
            },

            InputMode::Editing => match key.code {
                KeyCode::Char('i') => {
                    self.input_mode = InputMode::Insert;
                }
                KeyCode::Tab => {
                    self.active_input = match self.active_input {
                        ActiveInput::Title => ActiveInput::Description,
                        ActiveInput::Description => ActiveInput::Title,
                    };
                }
                KeyCode::Enter => self.submit_form(Local::now()),
                KeyCode::Esc => self.close_form(),
                _ => {}
            },

            InputMode::Insert => match key.code {
                KeyCode::Char(c) => match self.active_input {
                    ActiveInput::Title => self.new_assignment_input.push(c),
                    ActiveInput::Description => self.new_assignment_description.push(c),
                },
                KeyCode::Backspace => match self.active_input {
                    ActiveInput::Title => {
                        self.new_assignment_input.pop();
                    }
                    ActiveInput::Description => {
                        self.new_assignment_description.pop();
                    }
                },
                KeyCode::Esc => {
                    self.input_mode = InputMode::Editing;
                }
                _ => {}
            },

            InputMode::Search => {
                match key.code {
                    KeyCode::Char(c) => self.params.search_term.push(c),
                    KeyCode::Backspace => {
                        self.params.search_term.pop();
                    }
                    KeyCode::Enter | KeyCode::Esc => self.input_mode = InputMode::Normal,
                    _ => {}
                }
                self.clamp_selection();
            }
        }
        false
    }
}

// Keeps only the fields whose parsed value moved away from the rendered
// one, so fields the quick-add syntax cannot represent exactly survive.
fn changed_fields(
    parsed: ParsedAssignment,
    baseline: &ParsedAssignment,
    due_date: Option<DateTime<Utc>>,
) -> AssignmentPatch {
    let due_changed = parsed.due != baseline.due;
    AssignmentPatch {
        subject: parsed.subject.filter(|s| baseline.subject.as_ref() != Some(s)),
        priority: parsed.priority.filter(|p| baseline.priority != Some(*p)),
        due_date: due_date.filter(|_| due_changed),
        title: (parsed.title != baseline.title).then_some(parsed.title),
        ..Default::default()
    }
}
