use crate::clock::{Clock, SystemClock};
use crate::error::{ServiceError, ValidationError};
use crate::models::{
    CreateTaskData, NewTask, Task, TaskFilter, TaskId, UpdateTaskData, TITLE_MAX_CHARS,
};
use crate::query::build_query;
use crate::repository::TaskRepository;
use chrono::{NaiveDate, NaiveTime};
use std::sync::Arc;
use tracing::{debug, info};

/// Enforces task field rules and delegates storage to a [`TaskRepository`].
pub struct TaskService<R> {
    repository: R,
    clock: Arc<dyn Clock>,
}

impl<R: TaskRepository> TaskService<R> {
    pub fn new(repository: R) -> Self {
        Self::with_clock(repository, Arc::new(SystemClock))
    }

    pub fn with_clock(repository: R, clock: Arc<dyn Clock>) -> Self {
        TaskService { repository, clock }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub async fn create_task(&self, data: CreateTaskData) -> Result<Task, ServiceError> {
        let task = self.validate_new_task(data)?;
        let created = self.repository.create(task).await?;
        info!(id = %created.id, priority = %created.priority, "task created");
        Ok(created)
    }

    /// Tasks matching `filter`, newest first.
    pub async fn get_all_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ServiceError> {
        let query = build_query(filter);
        let mut tasks = self.repository.find_all(&query).await?;
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!(count = tasks.len(), filtered = !query.is_empty(), "listed tasks");
        Ok(tasks)
    }

    pub async fn get_task_by_id(&self, id: &TaskId) -> Result<Option<Task>, ServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    pub async fn update_task(
        &self,
        id: &TaskId,
        changes: UpdateTaskData,
    ) -> Result<Option<Task>, ServiceError> {
        if let Some(title) = &changes.title {
            if title.trim().is_empty() {
                return Err(ValidationError::new("Title cannot be empty").into());
            }
            check_title_length(title)?;
        }
        if let Some(due_date) = changes.due_date {
            self.check_due_date(due_date)?;
        }

        let updated = self.repository.update(id, changes).await?;
        match &updated {
            Some(task) => info!(id = %task.id, status = %task.status, "task updated"),
            None => debug!(%id, "update for unknown task"),
        }
        Ok(updated)
    }

    /// Returns whether a task was actually removed.
    pub async fn delete_task(&self, id: &TaskId) -> Result<bool, ServiceError> {
        let deleted = self.repository.delete(id).await?;
        if deleted {
            info!(%id, "task deleted");
        }
        Ok(deleted)
    }

    // Checks run in a fixed order and stop at the first violation
    fn validate_new_task(&self, data: CreateTaskData) -> Result<NewTask, ValidationError> {
        if data.title.trim().is_empty() {
            return Err(ValidationError::new("Title is required"));
        }
        check_title_length(&data.title)?;
        let priority = data
            .priority
            .ok_or_else(|| ValidationError::new("Priority is required"))?;
        let due_date = data
            .due_date
            .ok_or_else(|| ValidationError::new("Due date must be in the future"))?;
        self.check_due_date(due_date)?;

        Ok(NewTask {
            title: data.title,
            description: data.description,
            status: data.status.unwrap_or_default(),
            priority,
            due_date,
        })
    }

    // A due date stands for the start of that day in UTC
    fn check_due_date(&self, due_date: NaiveDate) -> Result<(), ValidationError> {
        let due = due_date.and_time(NaiveTime::MIN).and_utc();
        if due <= self.clock.now() {
            return Err(ValidationError::new("Due date must be in the future"));
        }
        Ok(())
    }
}

fn check_title_length(title: &str) -> Result<(), ValidationError> {
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(ValidationError::new(format!(
            "Title cannot exceed {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(())
}
