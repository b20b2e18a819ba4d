use crate::clock::{Clock, SystemClock};
use crate::error::RepositoryError;
use crate::models::{NewTask, Task, TaskId, UpdateTaskData};
use crate::query::QueryPredicate;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// CRUD primitives over the task collection, keyed by [`TaskId`].
///
/// Missing tasks are reported as `None` / `false`, never as errors.
#[async_trait]
pub trait TaskRepository: Send + Sync + 'static {
    async fn create(&self, task: NewTask) -> Result<Task, RepositoryError>;

    async fn find_all(&self, query: &QueryPredicate) -> Result<Vec<Task>, RepositoryError>;

    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, RepositoryError>;

    async fn update(
        &self,
        id: &TaskId,
        changes: UpdateTaskData,
    ) -> Result<Option<Task>, RepositoryError>;

    async fn delete(&self, id: &TaskId) -> Result<bool, RepositoryError>;
}

/// Document store kept in memory, optionally mirrored to a JSON file.
///
/// Every write replaces the whole collection under the write lock, so a
/// failed file write leaves the previous state in place.
pub struct InMemoryTaskRepository {
    tasks: RwLock<Vec<Task>>,
    clock: Arc<dyn Clock>,
    data_file: Option<PathBuf>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        InMemoryTaskRepository {
            tasks: RwLock::new(Vec::new()),
            clock,
            data_file: None,
        }
    }

    /// Loads the collection from `path` if it exists and writes every
    /// change back to it.
    pub async fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let tasks = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<Task>>(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(RepositoryError::Io { path, source }),
        };
        info!(path = %path.display(), count = tasks.len(), "loaded task store");

        Ok(InMemoryTaskRepository {
            tasks: RwLock::new(tasks),
            clock,
            data_file: Some(path),
        })
    }

    async fn persist(&self, tasks: &[Task]) -> Result<(), RepositoryError> {
        let Some(path) = &self.data_file else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(tasks)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir(parent).await?;
        }
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| RepositoryError::Io {
                path: path.clone(),
                source,
            })
    }
}

impl Default for InMemoryTaskRepository {
    fn default() -> Self {
        Self::new()
    }
}

async fn create_dir(dir: &Path) -> Result<(), RepositoryError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| RepositoryError::Io {
            path: dir.to_path_buf(),
            source,
        })
}

// Schema normalisation: surrounding whitespace is dropped, blank descriptions vanish
fn normalise_description(description: Option<String>) -> Option<String> {
    description
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, task: NewTask) -> Result<Task, RepositoryError> {
        let now = self.clock.now();
        let created = Task {
            id: TaskId(Uuid::new_v4().to_string()),
            title: task.title.trim().to_string(),
            description: normalise_description(task.description),
            status: task.status,
            priority: task.priority,
            due_date: task.due_date,
            created_at: now,
            updated_at: now,
        };

        let mut guard = self.tasks.write().await;
        let mut next = guard.clone();
        next.push(created.clone());
        self.persist(&next).await?;
        *guard = next;

        debug!(id = %created.id, "stored task");
        Ok(created)
    }

    async fn find_all(&self, query: &QueryPredicate) -> Result<Vec<Task>, RepositoryError> {
        let guard = self.tasks.read().await;
        Ok(guard
            .iter()
            .rev()
            .filter(|task| query.matches(task))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, RepositoryError> {
        let guard = self.tasks.read().await;
        Ok(guard.iter().find(|task| &task.id == id).cloned())
    }

    async fn update(
        &self,
        id: &TaskId,
        changes: UpdateTaskData,
    ) -> Result<Option<Task>, RepositoryError> {
        let mut guard = self.tasks.write().await;
        let Some(index) = guard.iter().position(|task| &task.id == id) else {
            return Ok(None);
        };

        let mut next = guard.clone();
        let task = &mut next[index];
        if let Some(title) = changes.title {
            task.title = title.trim().to_string();
        }
        if changes.description.is_some() {
            task.description = normalise_description(changes.description);
        }
        if let Some(status) = changes.status {
            task.status = status;
        }
        if let Some(priority) = changes.priority {
            task.priority = priority;
        }
        if let Some(due_date) = changes.due_date {
            task.due_date = due_date;
        }
        task.updated_at = self.clock.now();
        let updated = task.clone();

        self.persist(&next).await?;
        *guard = next;
        Ok(Some(updated))
    }

    async fn delete(&self, id: &TaskId) -> Result<bool, RepositoryError> {
        let mut guard = self.tasks.write().await;
        if !guard.iter().any(|task| &task.id == id) {
            return Ok(false);
        }

        let next: Vec<Task> = guard.iter().filter(|task| &task.id != id).cloned().collect();
        self.persist(&next).await?;
        *guard = next;
        Ok(true)
    }
}
