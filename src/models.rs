use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub const TITLE_MAX_CHARS: usize = 100;

// Opaque task identifier, assigned by the repository
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        TaskId(value.to_string())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Todo => "TO DO",
            TaskStatus::InProgress => "IN PROGRESS",
            TaskStatus::Done => "DONE",
        }
    }

    /// Column position on the board, left to right.
    pub fn column(self) -> usize {
        match self {
            TaskStatus::Todo => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Done => 2,
        }
    }

    pub fn from_column(column: usize) -> Option<TaskStatus> {
        Self::ALL.get(column).copied()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 3] = [TaskPriority::Low, TaskPriority::Medium, TaskPriority::High];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = ();

    // Case-sensitive, matches the wire values only
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str() == s)
            .ok_or(())
    }
}

// Task struct, as stored and as sent over the wire
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(deserialize_with = "deserialize_date")]
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Body of a create request; presence checks happen in the service
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskData {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_date"
    )]
    pub due_date: Option<NaiveDate>,
}

// Partial update; absent fields are left untouched
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskData {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_supplied_string"
    )]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_date"
    )]
    pub due_date: Option<NaiveDate>,
}

impl UpdateTaskData {
    pub fn status(status: TaskStatus) -> Self {
        UpdateTaskData {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// A create request that passed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: NaiveDate,
}

// Typed filter; both date bounds are inclusive
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date_to: Option<NaiveDate>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self.priority.is_none() && self.due_date_from.is_none() && self.due_date_to.is_none()
    }

    pub fn active_count(&self) -> usize {
        [
            self.priority.is_some(),
            self.due_date_from.is_some(),
            self.due_date_to.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

// Raw query string parameters, before validation
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueryParams {
    pub priority: Option<String>,
    pub due_date_from: Option<String>,
    pub due_date_to: Option<String>,
}

// Response wrapper shared by the server and the client
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn data(data: T) -> Self {
        Envelope {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Envelope {
            success: true,
            data: None,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Envelope {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// Parses a calendar date given as `YYYY-MM-DD` or as an RFC 3339 timestamp.
///
/// Timestamps are reduced to their UTC date.
pub fn parse_calendar_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(input)
            .ok()
            .map(|timestamp| timestamp.with_timezone(&Utc).date_naive())
    })
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_calendar_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date `{raw}`, use YYYY-MM-DD")))
}

fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_calendar_date(&raw).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid date `{raw}`, use YYYY-MM-DD"))
        }),
    }
}

// An explicit `null` still counts as supplied; it reads as an empty string
fn deserialize_supplied_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(Option::<String>::deserialize(deserializer)?.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(json!(TaskStatus::InProgress), json!("in-progress"));
        let status: TaskStatus = serde_json::from_value(json!("done")).unwrap();
        assert_eq!(status, TaskStatus::Done);
        assert!(serde_json::from_value::<TaskStatus>(json!("Done")).is_err());
    }

    #[test]
    fn test_priority_from_str_is_case_sensitive() {
        assert_eq!("high".parse::<TaskPriority>(), Ok(TaskPriority::High));
        assert!("HIGH".parse::<TaskPriority>().is_err());
        assert!("urgent".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn test_parse_calendar_date_accepts_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2025, 12, 31);
        assert_eq!(parse_calendar_date("2025-12-31"), expected);
        assert_eq!(parse_calendar_date("2025-12-31T00:00:00.000Z"), expected);
        assert_eq!(parse_calendar_date("2025-13-01"), None);
        assert_eq!(parse_calendar_date("tomorrow"), None);
    }

    #[test]
    fn test_task_uses_camel_case_on_the_wire() {
        let value = json!({
            "id": "abc",
            "title": "Write docs",
            "status": "todo",
            "priority": "high",
            "dueDate": "2999-01-01T00:00:00.000Z",
            "createdAt": "2025-01-01T10:00:00Z",
            "updatedAt": "2025-01-01T10:00:00Z"
        });
        let task: Task = serde_json::from_value(value).unwrap();
        assert_eq!(task.id, TaskId::from("abc"));
        assert_eq!(task.description, None);
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2999, 1, 1).unwrap());

        let back = serde_json::to_value(&task).unwrap();
        assert_eq!(back["dueDate"], json!("2999-01-01"));
        assert!(back.get("description").is_none());
    }

    #[test]
    fn test_create_data_tolerates_missing_fields() {
        let data: CreateTaskData = serde_json::from_value(json!({})).unwrap();
        assert_eq!(data, CreateTaskData::default());
    }

    #[test]
    fn test_filter_active_count() {
        let filter = TaskFilter {
            priority: Some(TaskPriority::Low),
            due_date_to: NaiveDate::from_ymd_opt(2025, 1, 1),
            ..Default::default()
        };
        assert!(!filter.is_empty());
        assert_eq!(filter.active_count(), 2);
        assert!(TaskFilter::default().is_empty());
    }

    #[test]
    fn test_envelope_reads_task_data_and_errors() {
        let envelope: Envelope<Task> = serde_json::from_value(json!({
            "success": true,
            "data": {
                "id": "abc",
                "title": "Write docs",
                "status": "done",
                "priority": "low",
                "dueDate": "2999-01-01",
                "createdAt": "2025-01-01T10:00:00Z",
                "updatedAt": "2025-01-01T10:00:00Z"
            }
        }))
        .unwrap();
        assert_eq!(envelope.data.unwrap().status, TaskStatus::Done);

        let envelope: Envelope<Vec<Task>> =
            serde_json::from_value(json!({ "success": false, "error": "Task not found" }))
                .unwrap();
        assert!(envelope.data.is_none());
        assert_eq!(envelope.error.as_deref(), Some("Task not found"));
    }

    #[test]
    fn test_update_title_null_is_supplied() {
        let data: UpdateTaskData = serde_json::from_value(json!({ "title": null })).unwrap();
        assert_eq!(data.title.as_deref(), Some(""));

        let data: UpdateTaskData = serde_json::from_value(json!({ "status": "done" })).unwrap();
        assert_eq!(data.title, None);
    }
}
