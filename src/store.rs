//! Client-side task list with optimistic mutations.
//!
//! [`BoardState`] holds the canonical list the board renders and changes only
//! through [`BoardState::apply`], so every transition can be exercised without
//! a terminal. [`TaskStore`] pairs that state with a [`TaskApi`]: status
//! changes and deletions are applied locally first and rolled back to the
//! exact pre-mutation list when the request fails.

use crate::api::TaskApi;
use crate::error::ApiClientError;
use crate::models::{CreateTaskData, Task, TaskFilter, TaskId, TaskStatus, UpdateTaskData};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoardState {
    pub tasks: Vec<Task>,
    pub filter: TaskFilter,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BoardAction {
    LoadStarted,
    LoadSucceeded(Vec<Task>),
    LoadFailed(String),
    FilterChanged(TaskFilter),
    ErrorCleared,
    TaskCreated(Task),
    Failed(String),
    StatusChanged { id: TaskId, status: TaskStatus },
    TaskReconciled(Task),
    TaskRemoved(TaskId),
    RolledBack(Vec<Task>),
}

impl BoardState {
    pub fn apply(&mut self, action: BoardAction) {
        match action {
            BoardAction::LoadStarted => {
                self.loading = true;
                self.error = None;
            }
            BoardAction::LoadSucceeded(tasks) => {
                self.tasks = tasks;
                self.loading = false;
            }
            // Fail closed: an empty board beats a possibly wrong one
            BoardAction::LoadFailed(message) => {
                self.tasks.clear();
                self.error = Some(message);
                self.loading = false;
            }
            BoardAction::FilterChanged(filter) => self.filter = filter,
            BoardAction::ErrorCleared => self.error = None,
            BoardAction::TaskCreated(task) => self.tasks.insert(0, task),
            BoardAction::Failed(message) => self.error = Some(message),
            BoardAction::StatusChanged { id, status } => {
                if let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) {
                    task.status = status;
                }
            }
            BoardAction::TaskReconciled(updated) => {
                if let Some(task) = self.tasks.iter_mut().find(|task| task.id == updated.id) {
                    *task = updated;
                }
            }
            BoardAction::TaskRemoved(id) => self.tasks.retain(|task| task.id != id),
            BoardAction::RolledBack(snapshot) => self.tasks = snapshot,
        }
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    /// Tasks of one column, in list order.
    pub fn column(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks.iter().filter(|task| task.status == status).collect()
    }
}

pub struct TaskStore<A> {
    api: A,
    state: Mutex<BoardState>,
}

impl<A: TaskApi> TaskStore<A> {
    pub fn new(api: A) -> Self {
        TaskStore {
            api,
            state: Mutex::new(BoardState::default()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    // Never held across an await
    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, action: BoardAction) {
        self.lock().apply(action);
    }

    pub fn snapshot(&self) -> BoardState {
        self.lock().clone()
    }

    /// Fetches tasks for the current filter. Dropped if a load is already running.
    pub async fn load(&self) {
        let filter = {
            let mut state = self.lock();
            if state.loading {
                debug!("load already in flight, skipping");
                return;
            }
            state.apply(BoardAction::LoadStarted);
            state.filter.clone()
        };

        match self.api.get_tasks(&filter).await {
            Ok(tasks) => {
                debug!(count = tasks.len(), "loaded tasks");
                self.dispatch(BoardAction::LoadSucceeded(tasks));
            }
            Err(err) => {
                warn!(error = %err, "failed to load tasks");
                self.dispatch(BoardAction::LoadFailed(err.to_string()));
            }
        }
    }

    pub async fn set_filter(&self, filter: TaskFilter) {
        self.dispatch(BoardAction::FilterChanged(filter));
        self.load().await;
    }

    pub async fn clear_filters(&self) {
        self.set_filter(TaskFilter::default()).await;
    }

    pub async fn refresh(&self) {
        self.load().await;
    }

    pub fn clear_error(&self) {
        self.dispatch(BoardAction::ErrorCleared);
    }

    /// Creates a task; the error is both recorded and returned so the form
    /// can show it.
    pub async fn create_task(&self, data: CreateTaskData) -> Result<Task, ApiClientError> {
        self.dispatch(BoardAction::ErrorCleared);
        match self.api.create_task(&data).await {
            Ok(task) => {
                self.dispatch(BoardAction::TaskCreated(task.clone()));
                Ok(task)
            }
            Err(err) => {
                warn!(error = %err, "failed to create task");
                self.dispatch(BoardAction::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    pub async fn update_task_status(&self, id: &TaskId, status: TaskStatus) {
        let snapshot = {
            let mut state = self.lock();
            let snapshot = state.tasks.clone();
            state.apply(BoardAction::StatusChanged {
                id: id.clone(),
                status,
            });
            state.apply(BoardAction::ErrorCleared);
            snapshot
        };

        match self.api.update_task(id, &UpdateTaskData::status(status)).await {
            Ok(task) => self.dispatch(BoardAction::TaskReconciled(task)),
            Err(err) => {
                warn!(%id, error = %err, "status update failed, rolling back");
                let mut state = self.lock();
                state.apply(BoardAction::RolledBack(snapshot));
                state.apply(BoardAction::Failed(err.to_string()));
            }
        }
    }

    pub async fn delete_task(&self, id: &TaskId) {
        let snapshot = {
            let mut state = self.lock();
            let snapshot = state.tasks.clone();
            state.apply(BoardAction::TaskRemoved(id.clone()));
            state.apply(BoardAction::ErrorCleared);
            snapshot
        };

        if let Err(err) = self.api.delete_task(id).await {
            warn!(%id, error = %err, "delete failed, rolling back");
            let mut state = self.lock();
            state.apply(BoardAction::RolledBack(snapshot));
            state.apply(BoardAction::Failed(err.to_string()));
        }
    }

    /// Drop handler for a card moved onto a column.
    ///
    /// Returns `false` without touching state or the network when there is
    /// no target, the task is unknown, or it already has that status.
    pub async fn move_task(&self, id: &TaskId, target: Option<TaskStatus>) -> bool {
        let Some(target) = target else {
            return false;
        };
        let current = self.lock().task(id).map(|task| task.status);
        if current.is_none() || current == Some(target) {
            return false;
        }
        self.update_task_status(id, target).await;
        true
    }

    /// Fresh copy of one task for the detail view.
    pub async fn fetch_task(&self, id: &TaskId) -> Option<Task> {
        match self.api.get_task(id).await {
            Ok(Some(task)) => Some(task),
            Ok(None) => {
                self.dispatch(BoardAction::Failed("Task not found".to_string()));
                None
            }
            Err(err) => {
                self.dispatch(BoardAction::Failed(err.to_string()));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskPriority;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn task(id: &str, status: TaskStatus) -> Task {
        let stamp = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Task {
            id: TaskId::from(id),
            title: format!("Task {id}"),
            description: None,
            status,
            priority: TaskPriority::Medium,
            due_date: NaiveDate::from_ymd_opt(2999, 1, 1).unwrap(),
            created_at: stamp,
            updated_at: stamp,
        }
    }

    fn rejected(action: &'static str, message: &str) -> ApiClientError {
        ApiClientError::Rejected {
            action,
            status: 500,
            message: message.to_string(),
        }
    }

    // Backend double: serves `server_tasks`, fails on demand, counts requests
    #[derive(Default)]
    struct MockApi {
        server_tasks: Mutex<Vec<Task>>,
        fail_load: Mutex<Option<String>>,
        fail_mutation: Mutex<Option<String>>,
        requests: AtomicUsize,
        last_filter: Mutex<Option<TaskFilter>>,
        gate: Option<Arc<Notify>>,
        hold_updates: Option<Arc<Notify>>,
    }

    impl MockApi {
        fn with_tasks(tasks: Vec<Task>) -> Self {
            MockApi {
                server_tasks: Mutex::new(tasks),
                ..Default::default()
            }
        }

        fn fail_mutations(&self, message: &str) {
            *self.fail_mutation.lock().unwrap() = Some(message.to_string());
        }

        fn fail_loads(&self, message: &str) {
            *self.fail_load.lock().unwrap() = Some(message.to_string());
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }

        fn mutation_error(&self, action: &'static str) -> Result<(), ApiClientError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            match self.fail_mutation.lock().unwrap().clone() {
                Some(message) => Err(rejected(action, &message)),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl TaskApi for MockApi {
        async fn get_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ApiClientError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            *self.last_filter.lock().unwrap() = Some(filter.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(message) = self.fail_load.lock().unwrap().clone() {
                return Err(rejected("fetch tasks", &message));
            }
            let tasks = self.server_tasks.lock().unwrap().clone();
            Ok(tasks
                .into_iter()
                .filter(|t| filter.priority.map_or(true, |p| t.priority == p))
                .collect())
        }

        async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, ApiClientError> {
            self.mutation_error("fetch task")?;
            Ok(self.server_tasks.lock().unwrap().iter().find(|t| &t.id == id).cloned())
        }

        async fn create_task(&self, data: &CreateTaskData) -> Result<Task, ApiClientError> {
            self.mutation_error("create task")?;
            let mut created = task("server-1", data.status.unwrap_or_default());
            created.title = data.title.clone();
            self.server_tasks.lock().unwrap().insert(0, created.clone());
            Ok(created)
        }

        async fn update_task(
            &self,
            id: &TaskId,
            changes: &UpdateTaskData,
        ) -> Result<Task, ApiClientError> {
            self.mutation_error("update task")?;
            if let Some(gate) = &self.hold_updates {
                gate.notified().await;
            }
            let mut tasks = self.server_tasks.lock().unwrap();
            let task = tasks
                .iter_mut()
                .find(|t| &t.id == id)
                .ok_or_else(|| rejected("update task", "Task not found"))?;
            if let Some(status) = changes.status {
                task.status = status;
            }
            task.updated_at = Utc.with_ymd_and_hms(2025, 2, 2, 0, 0, 0).unwrap();
            Ok(task.clone())
        }

        async fn delete_task(&self, id: &TaskId) -> Result<(), ApiClientError> {
            self.mutation_error("delete task")?;
            self.server_tasks.lock().unwrap().retain(|t| &t.id != id);
            Ok(())
        }
    }

    async fn loaded_store(tasks: Vec<Task>) -> TaskStore<MockApi> {
        let store = TaskStore::new(MockApi::with_tasks(tasks));
        store.load().await;
        store
    }

    #[test]
    fn test_reducer_prepends_created_tasks() {
        let mut state = BoardState::default();
        state.apply(BoardAction::LoadSucceeded(vec![task("a", TaskStatus::Todo)]));
        state.apply(BoardAction::TaskCreated(task("b", TaskStatus::Todo)));
        let ids: Vec<&str> = state.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_reducer_columns_follow_status() {
        let mut state = BoardState::default();
        state.apply(BoardAction::LoadSucceeded(vec![
            task("a", TaskStatus::Todo),
            task("b", TaskStatus::Done),
        ]));
        state.apply(BoardAction::StatusChanged {
            id: TaskId::from("a"),
            status: TaskStatus::Done,
        });
        assert!(state.column(TaskStatus::Todo).is_empty());
        assert_eq!(state.column(TaskStatus::Done).len(), 2);
    }

    #[tokio::test]
    async fn test_load_replaces_list_and_clears_error() {
        let store = loaded_store(vec![task("a", TaskStatus::Todo)]).await;
        store.dispatch(BoardAction::Failed("old".to_string()));
        store.load().await;

        let state = store.snapshot();
        assert_eq!(state.tasks.len(), 1);
        assert_eq!(state.error, None);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_failed_load_fails_closed() {
        let store = loaded_store(vec![task("a", TaskStatus::Todo)]).await;
        store.api().fail_loads("Task store unavailable");
        store.refresh().await;

        let state = store.snapshot();
        assert!(state.tasks.is_empty());
        assert_eq!(
            state.error.as_deref(),
            Some("Failed to fetch tasks: Task store unavailable")
        );
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_concurrent_load_is_dropped() {
        let gate = Arc::new(Notify::new());
        let store = TaskStore::new(MockApi {
            server_tasks: Mutex::new(vec![task("a", TaskStatus::Todo)]),
            gate: Some(gate.clone()),
            ..Default::default()
        });

        tokio::join!(store.load(), async {
            store.load().await;
            gate.notify_one();
        });

        assert_eq!(store.api().requests(), 1);
        assert_eq!(store.snapshot().tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_filter_change_refetches_with_filter() {
        let store = loaded_store(vec![
            {
                let mut high = task("h", TaskStatus::Todo);
                high.priority = TaskPriority::High;
                high
            },
            task("m", TaskStatus::Todo),
        ])
        .await;

        let filter = TaskFilter {
            priority: Some(TaskPriority::High),
            ..Default::default()
        };
        store.set_filter(filter.clone()).await;

        let state = store.snapshot();
        assert_eq!(state.filter, filter);
        assert_eq!(state.tasks.len(), 1);
        assert_eq!(*store.api().last_filter.lock().unwrap(), Some(filter));

        store.clear_filters().await;
        assert_eq!(store.snapshot().tasks.len(), 2);
    }

    #[tokio::test]
    async fn test_create_prepends_server_task() {
        let store = loaded_store(vec![task("a", TaskStatus::Todo)]).await;
        let created = store
            .create_task(CreateTaskData {
                title: "Write docs".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let state = store.snapshot();
        assert_eq!(state.tasks[0], created);
        assert_eq!(created.id, TaskId::from("server-1"));
        assert_eq!(created.status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_list_and_reraises() {
        let store = loaded_store(vec![task("a", TaskStatus::Todo)]).await;
        let before = store.snapshot().tasks;
        store.api().fail_mutations("Title is required");

        let err = store.create_task(CreateTaskData::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to create task: Title is required");

        let state = store.snapshot();
        assert_eq!(state.tasks, before);
        assert_eq!(state.error.as_deref(), Some("Failed to create task: Title is required"));
    }

    #[tokio::test]
    async fn test_status_update_reconciles_with_server() {
        let store = loaded_store(vec![task("a", TaskStatus::Todo)]).await;
        store
            .update_task_status(&TaskId::from("a"), TaskStatus::InProgress)
            .await;

        let state = store.snapshot();
        let updated = state.task(&TaskId::from("a")).unwrap();
        assert_eq!(updated.status, TaskStatus::InProgress);
        assert_eq!(
            updated.updated_at,
            Utc.with_ymd_and_hms(2025, 2, 2, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_failed_status_update_restores_exact_snapshot() {
        let store = loaded_store(vec![
            task("a", TaskStatus::Todo),
            task("b", TaskStatus::InProgress),
            task("c", TaskStatus::Done),
        ])
        .await;
        let before = store.snapshot().tasks;
        store.api().fail_mutations("Network down");

        assert!(store.move_task(&TaskId::from("a"), Some(TaskStatus::Done)).await);

        let state = store.snapshot();
        assert_eq!(state.tasks, before);
        assert_eq!(state.column(TaskStatus::Todo)[0].id, TaskId::from("a"));
        assert_eq!(state.error.as_deref(), Some("Failed to update task: Network down"));
    }

    #[tokio::test]
    async fn test_optimistic_status_is_visible_before_response() {
        let gate = Arc::new(Notify::new());
        let store = TaskStore::new(MockApi {
            server_tasks: Mutex::new(vec![task("a", TaskStatus::Todo)]),
            hold_updates: Some(gate.clone()),
            ..Default::default()
        });
        store.load().await;
        let id = TaskId::from("a");

        tokio::join!(store.update_task_status(&id, TaskStatus::Done), async {
            let state = store.snapshot();
            assert_eq!(state.task(&id).map(|t| t.status), Some(TaskStatus::Done));
            gate.notify_one();
        });

        assert_eq!(store.snapshot().task(&id).map(|t| t.status), Some(TaskStatus::Done));
    }

    #[tokio::test]
    async fn test_delete_is_optimistic_and_rolls_back() {
        let store = loaded_store(vec![task("a", TaskStatus::Todo), task("b", TaskStatus::Todo)]).await;
        store.delete_task(&TaskId::from("a")).await;
        assert_eq!(store.snapshot().tasks.len(), 1);
        assert_eq!(store.snapshot().error, None);

        let before = store.snapshot().tasks;
        store.api().fail_mutations("Task not found");
        store.delete_task(&TaskId::from("b")).await;

        let state = store.snapshot();
        assert_eq!(state.tasks, before);
        assert_eq!(state.error.as_deref(), Some("Failed to delete task: Task not found"));
    }

    #[tokio::test]
    async fn test_noop_moves_make_no_request() {
        let store = loaded_store(vec![task("a", TaskStatus::Todo)]).await;
        let requests = store.api().requests();
        let before = store.snapshot();

        assert!(!store.move_task(&TaskId::from("a"), None).await);
        assert!(!store.move_task(&TaskId::from("a"), Some(TaskStatus::Todo)).await);
        assert!(!store.move_task(&TaskId::from("ghost"), Some(TaskStatus::Done)).await);

        assert_eq!(store.api().requests(), requests);
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_fetch_task_records_missing() {
        let store = loaded_store(vec![task("a", TaskStatus::Todo)]).await;
        assert_eq!(
            store.fetch_task(&TaskId::from("a")).await.map(|t| t.id),
            Some(TaskId::from("a"))
        );
        assert_eq!(store.fetch_task(&TaskId::from("zzz")).await, None);
        assert_eq!(store.snapshot().error.as_deref(), Some("Task not found"));
    }
}
