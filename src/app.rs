use crate::api::TaskApi;
use crate::clock::{Clock, SystemClock};
use crate::models::{Task, TaskStatus};
use crate::parser::{format_filter, parse_filter_input, parse_task_input};
use crate::store::TaskStore;
use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::ListState;
use std::io;
use std::sync::Arc;

pub struct App<A> {
    pub store: TaskStore<A>,
    pub selected_column: usize,
    pub column_states: [ListState; 3],
    pub task_detail: Option<Task>,
    pub input_mode: InputMode,
    pub input: String,
    pub form_error: Option<String>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Adding,
    Filtering,
}

impl<A: TaskApi> App<A> {
    pub fn new(store: TaskStore<A>) -> App<A> {
        App::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: TaskStore<A>, clock: Arc<dyn Clock>) -> App<A> {
        let mut app = App {
            store,
            selected_column: 0,
            column_states: Default::default(),
            task_detail: None,
            input_mode: InputMode::Normal,
            input: String::new(),
            form_error: None,
            clock,
        };
        app.sync_selection();
        app
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    pub fn selected_status(&self) -> TaskStatus {
        TaskStatus::from_column(self.selected_column).unwrap_or_default()
    }

    pub fn selected_task(&self) -> Option<Task> {
        let index = self.column_states[self.selected_column].selected()?;
        let state = self.store.snapshot();
        let column = state.column(self.selected_status());
        column.get(index).map(|task| (*task).clone())
    }

    fn column_len(&self, column: usize) -> usize {
        TaskStatus::from_column(column)
            .map(|status| self.store.snapshot().column(status).len())
            .unwrap_or(0)
    }

    /// Keeps every column's cursor inside its (possibly shrunk) list.
    pub fn sync_selection(&mut self) {
        let state = self.store.snapshot();
        for status in TaskStatus::ALL {
            let len = state.column(status).len();
            let list = &mut self.column_states[status.column()];
            let selected = match (len, list.selected()) {
                (0, _) => None,
                (len, Some(i)) => Some(i.min(len - 1)),
                (_, None) => Some(0),
            };
            list.select(selected);
        }
    }

    pub fn next(&mut self) {
        let len = self.column_len(self.selected_column);
        if len == 0 {
            return;
        }
        let list = &mut self.column_states[self.selected_column];
        let i = match list.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        list.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.column_len(self.selected_column);
        if len == 0 {
            return;
        }
        let list = &mut self.column_states[self.selected_column];
        let i = match list.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        list.select(Some(i));
    }

    pub fn focus_left(&mut self) {
        self.selected_column = self.selected_column.saturating_sub(1);
    }

    pub fn focus_right(&mut self) {
        if self.selected_column + 1 < TaskStatus::ALL.len() {
            self.selected_column += 1;
        }
    }

    // Moves the selected card one column over; nothing happens at the edges
    async fn move_selected(&mut self, right: bool) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let target = if right {
            TaskStatus::from_column(self.selected_column + 1)
        } else {
            self.selected_column
                .checked_sub(1)
                .and_then(TaskStatus::from_column)
        };
        self.store.move_task(&task.id, target).await;
        self.sync_selection();
    }

    async fn submit_task(&mut self) {
        let data = match parse_task_input(&self.input).validate(self.today()) {
            Ok(data) => data,
            Err(message) => {
                self.form_error = Some(message);
                return;
            }
        };

        match self.store.create_task(data).await {
            Ok(_) => {
                self.close_prompt();
                self.selected_column = TaskStatus::Todo.column();
                self.column_states[self.selected_column].select(Some(0));
                self.sync_selection();
            }
            // Form stays open with the server's reason
            Err(err) => self.form_error = Some(err.to_string()),
        }
    }

    async fn submit_filter(&mut self) {
        match parse_filter_input(&self.input) {
            Ok(filter) => {
                self.close_prompt();
                if filter.is_empty() {
                    self.store.clear_filters().await;
                } else {
                    self.store.set_filter(filter).await;
                }
                self.sync_selection();
            }
            Err(message) => self.form_error = Some(message),
        }
    }

    fn open_prompt(&mut self, mode: InputMode, input: String) {
        self.input_mode = mode;
        self.input = input;
        self.form_error = None;
    }

    fn close_prompt(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input.clear();
        self.form_error = None;
    }

    pub async fn handle_input(&mut self, key: KeyEvent) -> io::Result<bool> {
        match self.input_mode {
            InputMode::Normal if self.task_detail.is_some() => match key.code {
                KeyCode::Esc | KeyCode::Enter => self.task_detail = None,
                KeyCode::Char('q') => return Ok(true),
                _ => {}
            },
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => return Ok(true),
                KeyCode::Char('j') | KeyCode::Down => self.next(),
                KeyCode::Char('k') | KeyCode::Up => self.previous(),
                KeyCode::Char('h') | KeyCode::Left => self.focus_left(),
                KeyCode::Char('l') | KeyCode::Right => self.focus_right(),
                KeyCode::Char('H') => self.move_selected(false).await,
                KeyCode::Char('L') => self.move_selected(true).await,
                KeyCode::Char('d') => {
                    if let Some(task) = self.selected_task() {
                        self.store.delete_task(&task.id).await;
                        self.sync_selection();
                    }
                }
                KeyCode::Enter => {
                    if let Some(task) = self.selected_task() {
                        self.task_detail = self.store.fetch_task(&task.id).await;
                    }
                }
                KeyCode::Char('a') => self.open_prompt(InputMode::Adding, String::new()),
                KeyCode::Char('f') => {
                    let current = format_filter(&self.store.snapshot().filter);
                    self.open_prompt(InputMode::Filtering, current);
                }
                KeyCode::Char('c') => {
                    self.store.clear_filters().await;
                    self.sync_selection();
                }
                KeyCode::Char('r') => {
                    self.store.refresh().await;
                    self.sync_selection();
                }
                KeyCode::Esc => self.store.clear_error(),
                _ => {}
            },
            InputMode::Adding | InputMode::Filtering => match key.code {
                KeyCode::Char(c) => self.input.push(c),
                KeyCode::Backspace => {
                    self.input.pop();
                }
                KeyCode::Esc => self.close_prompt(),
                KeyCode::Enter if self.input_mode == InputMode::Adding => {
                    self.submit_task().await
                }
                KeyCode::Enter => self.submit_filter().await,
                _ => {}
            },
        }
        Ok(false)
    }
}
