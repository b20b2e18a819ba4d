use crate::error::ApiClientError;
use crate::models::{CreateTaskData, Envelope, Task, TaskFilter, TaskId, UpdateTaskData};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// What the board needs from the backend.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn get_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ApiClientError>;

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, ApiClientError>;

    async fn create_task(&self, data: &CreateTaskData) -> Result<Task, ApiClientError>;

    async fn update_task(
        &self,
        id: &TaskId,
        changes: &UpdateTaskData,
    ) -> Result<Task, ApiClientError>;

    async fn delete_task(&self, id: &TaskId) -> Result<(), ApiClientError>;
}

// REST client for the kanban API
#[derive(Clone, Debug)]
pub struct HttpTaskApi {
    client: Client,
    base_url: String,
}

impl HttpTaskApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpTaskApi {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }

    fn task_url(&self, id: &TaskId) -> String {
        format!("{}/tasks/{}", self.base_url, id)
    }
}

impl Default for HttpTaskApi {
    fn default() -> Self {
        HttpTaskApi::new(DEFAULT_API_URL)
    }
}

// Unwraps `{success, data}`; failures carry the server's `error` text
async fn read_envelope<T: DeserializeOwned>(
    action: &'static str,
    res: Response,
) -> Result<Envelope<T>, ApiClientError> {
    let status = res.status();
    if status.is_success() {
        return res
            .json::<Envelope<T>>()
            .await
            .map_err(|source| ApiClientError::Http { action, source });
    }

    let error_text = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Envelope<()>>(&error_text)
        .ok()
        .and_then(|envelope| envelope.error)
        .unwrap_or_else(|| {
            if error_text.is_empty() {
                status.to_string()
            } else {
                error_text
            }
        });
    Err(ApiClientError::Rejected {
        action,
        status: status.as_u16(),
        message,
    })
}

async fn read_task(action: &'static str, res: Response) -> Result<Task, ApiClientError> {
    read_envelope::<Task>(action, res)
        .await?
        .data
        .ok_or(ApiClientError::Malformed { action })
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn get_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ApiClientError> {
        let action = "fetch tasks";
        let res = self
            .client
            .get(self.tasks_url())
            .query(filter)
            .send()
            .await
            .map_err(|source| ApiClientError::Http { action, source })?;

        Ok(read_envelope::<Vec<Task>>(action, res)
            .await?
            .data
            .unwrap_or_default())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, ApiClientError> {
        let action = "fetch task";
        let res = self
            .client
            .get(self.task_url(id))
            .send()
            .await
            .map_err(|source| ApiClientError::Http { action, source })?;

        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_task(action, res).await.map(Some)
    }

    async fn create_task(&self, data: &CreateTaskData) -> Result<Task, ApiClientError> {
        let action = "create task";
        let res = self
            .client
            .post(self.tasks_url())
            .json(data)
            .send()
            .await
            .map_err(|source| ApiClientError::Http { action, source })?;

        read_task(action, res).await
    }

    async fn update_task(
        &self,
        id: &TaskId,
        changes: &UpdateTaskData,
    ) -> Result<Task, ApiClientError> {
        let action = "update task";
        let res = self
            .client
            .put(self.task_url(id))
            .json(changes)
            .send()
            .await
            .map_err(|source| ApiClientError::Http { action, source })?;

        read_task(action, res).await
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), ApiClientError> {
        let action = "delete task";
        let res = self
            .client
            .delete(self.task_url(id))
            .send()
            .await
            .map_err(|source| ApiClientError::Http { action, source })?;

        read_envelope::<serde_json::Value>(action, res).await?;
        Ok(())
    }
}
