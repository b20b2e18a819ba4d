use crate::models::{
    parse_calendar_date, CreateTaskData, TaskFilter, TaskPriority, TITLE_MAX_CHARS,
};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

// Markers only count at the start of a word, so `bob@example.com` stays in the title
static PRIORITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)!(\w+)").expect("priority pattern"));
static DUE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)@(\S+)").expect("due date pattern"));
static DESCRIPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)--(?:\s|$)").expect("description pattern"));
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("space pattern"));

// Quick-add line: `Write docs !high @2999-01-01 -- optional details`
#[derive(Debug, PartialEq)]
pub struct ParsedTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub bad_due_date: Option<String>,
}

pub fn parse_task_input(input: &str) -> ParsedTask {
    let (line, description) = match DESCRIPTION_RE.find(input) {
        Some(m) => {
            let rest = input[m.end()..].trim();
            (&input[..m.start()], Some(rest.to_string()).filter(|d| !d.is_empty()))
        }
        None => (input, None),
    };

    let mut priority = None;

    // Priority, first valid marker wins
    for caps in PRIORITY_RE.captures_iter(line) {
        if let Some(priority_match) = caps.get(1) {
            if let Ok(p) = priority_match.as_str().parse::<TaskPriority>() {
                if priority.is_none() {
                    priority = Some(p);
                }
            }
        }
    }

    // Due date, first marker only
    let mut due_date = None;
    let mut bad_due_date = None;
    if let Some(date_match) = DUE_DATE_RE.captures(line).and_then(|caps| caps.get(1)) {
        match parse_calendar_date(date_match.as_str()) {
            Some(date) => due_date = Some(date),
            None => bad_due_date = Some(date_match.as_str().to_string()),
        }
    }

    let title = PRIORITY_RE.replace_all(line, " ");
    let title = DUE_DATE_RE.replace_all(&title, " ");
    let title = SPACES_RE.replace_all(&title, " ").trim().to_string();

    ParsedTask {
        title,
        description,
        priority,
        due_date,
        bad_due_date,
    }
}

impl ParsedTask {
    /// Form checks run before anything is sent. Priority defaults to medium.
    pub fn validate(self, today: NaiveDate) -> Result<CreateTaskData, String> {
        if self.title.trim().is_empty() {
            return Err("Title is required".to_string());
        }
        if self.title.chars().count() > TITLE_MAX_CHARS {
            return Err(format!("Title cannot exceed {TITLE_MAX_CHARS} characters"));
        }
        if let Some(raw) = self.bad_due_date {
            return Err(format!("Invalid due date `{raw}`. Use YYYY-MM-DD"));
        }
        let due_date = self.due_date.ok_or("Due date is required")?;
        if due_date < today {
            return Err("Due date cannot be in the past".to_string());
        }

        Ok(CreateTaskData {
            title: self.title,
            description: self.description,
            status: None,
            priority: Some(self.priority.unwrap_or(TaskPriority::Medium)),
            due_date: Some(due_date),
        })
    }
}

/// Parses a filter line such as `!high from:2025-01-01 to:2025-12-31`.
///
/// An empty line yields the empty filter.
pub fn parse_filter_input(input: &str) -> Result<TaskFilter, String> {
    let mut filter = TaskFilter::default();

    for token in input.split_whitespace() {
        if let Some(raw) = token.strip_prefix('!') {
            let priority = raw.parse::<TaskPriority>().map_err(|_| {
                format!("Unknown priority `{raw}`. Use !low, !medium or !high")
            })?;
            filter.priority = Some(priority);
        } else if let Some(raw) = token.strip_prefix("from:") {
            filter.due_date_from = Some(
                parse_calendar_date(raw)
                    .ok_or_else(|| format!("Invalid from date `{raw}`. Use YYYY-MM-DD"))?,
            );
        } else if let Some(raw) = token.strip_prefix("to:") {
            filter.due_date_to = Some(
                parse_calendar_date(raw)
                    .ok_or_else(|| format!("Invalid to date `{raw}`. Use YYYY-MM-DD"))?,
            );
        } else {
            return Err(format!("Unrecognised filter `{token}`"));
        }
    }

    Ok(filter)
}

/// Inverse of [`parse_filter_input`], used to prefill the filter prompt.
pub fn format_filter(filter: &TaskFilter) -> String {
    let mut parts = Vec::new();
    if let Some(priority) = filter.priority {
        parts.push(format!("!{priority}"));
    }
    if let Some(from) = filter.due_date_from {
        parts.push(format!("from:{from}"));
    }
    if let Some(to) = filter.due_date_to {
        parts.push(format!("to:{to}"));
    }
    parts.join(" ")
}
