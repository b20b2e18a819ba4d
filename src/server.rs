use crate::error::{ServiceError, ValidationError};
use crate::filter::FilterValidator;
use crate::models::{CreateTaskData, Envelope, Task, TaskId, TaskQueryParams, UpdateTaskData};
use crate::repository::TaskRepository;
use crate::service::TaskService;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// HTTP boundary: maps requests onto the service and results onto status codes.
pub struct TaskController<R, V> {
    service: TaskService<R>,
    validator: V,
}

impl<R: TaskRepository, V: FilterValidator> TaskController<R, V> {
    pub fn new(service: TaskService<R>, validator: V) -> Self {
        TaskController { service, validator }
    }
}

type Shared<R, V> = State<Arc<TaskController<R, V>>>;

// Error half of every handler result
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Task not found".to_string()),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(Envelope::<()>::error(message))).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.0)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(err) => err.into(),
            ServiceError::Repository(err) => {
                error!(error = %err, "task store failure");
                ApiError::Internal(err.to_string())
            }
        }
    }
}

pub fn router<R, V>(controller: TaskController<R, V>) -> Router
where
    R: TaskRepository,
    V: FilterValidator,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/tasks", get(list_tasks::<R, V>).post(create_task::<R, V>))
        .route(
            "/api/tasks/{id}",
            get(get_task::<R, V>)
                .put(update_task::<R, V>)
                .delete(delete_task::<R, V>),
        )
        .route("/health", get(health))
        .fallback(route_not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(controller))
}

pub async fn serve(addr: SocketAddr, app: Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "kanban API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn list_tasks<R: TaskRepository, V: FilterValidator>(
    State(controller): Shared<R, V>,
    params: Result<Query<TaskQueryParams>, QueryRejection>,
) -> Result<Json<Envelope<Vec<Task>>>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let filter = controller.validator.validate_and_transform(&params)?;
    let tasks = controller.service.get_all_tasks(&filter).await?;
    Ok(Json(Envelope::data(tasks)))
}

async fn create_task<R: TaskRepository, V: FilterValidator>(
    State(controller): Shared<R, V>,
    payload: Result<Json<CreateTaskData>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Task>>), ApiError> {
    let Json(data) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let task = controller.service.create_task(data).await?;
    Ok((StatusCode::CREATED, Json(Envelope::data(task))))
}

async fn get_task<R: TaskRepository, V: FilterValidator>(
    State(controller): Shared<R, V>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Task>>, ApiError> {
    let task = controller
        .service
        .get_task_by_id(&TaskId(id))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(Envelope::data(task)))
}

async fn update_task<R: TaskRepository, V: FilterValidator>(
    State(controller): Shared<R, V>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTaskData>, JsonRejection>,
) -> Result<Json<Envelope<Task>>, ApiError> {
    let Json(changes) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let task = controller
        .service
        .update_task(&TaskId(id), changes)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(Envelope::data(task)))
}

async fn delete_task<R: TaskRepository, V: FilterValidator>(
    State(controller): Shared<R, V>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    if controller.service.delete_task(&TaskId(id)).await? {
        Ok(Json(Envelope::message("Task deleted successfully")))
    } else {
        Err(ApiError::NotFound)
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "Kanban API is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn route_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(Envelope::<()>::error("Route not found")))
}
