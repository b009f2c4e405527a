// HTTP handlers for /tasks. Every handler except the enumerations requires a
// bearer identity and passes it to the store as the owner.

use actix_web::{web, HttpResponse};
use log::error;

use crate::app_state::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::models::{CreateTaskInput, TaskFilter, UpdateTaskInput};
use crate::task_store::TaskStore;

fn logged<T>(action: &str, result: Result<T, AppError>) -> Result<T, AppError> {
    if let Err(e @ (AppError::Storage(_) | AppError::Internal(_))) = &result {
        error!("Error {}: {}", action, e);
    }
    result
}

/// GET /tasks?status=&priority=&search=
pub async fn list_tasks(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    query: web::Query<TaskFilter>,
) -> Result<HttpResponse, AppError> {
    let tasks = logged("listing tasks", data.tasks.list(&query, &user.id).await)?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// POST /tasks
pub async fn create_task(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    payload: web::Json<CreateTaskInput>,
) -> Result<HttpResponse, AppError> {
    let task = logged(
        "creating task",
        data.tasks.create(payload.into_inner(), &user.id).await,
    )?;
    Ok(HttpResponse::Created().json(task))
}

/// GET /tasks/{task_id}
pub async fn get_task(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let task = logged("fetching task", data.tasks.get_by_id(&path, &user.id).await)?;
    Ok(HttpResponse::Ok().json(task))
}

/// PATCH /tasks/{task_id}
pub async fn update_task(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateTaskInput>,
) -> Result<HttpResponse, AppError> {
    let task = logged(
        "updating task",
        data.tasks
            .update(&path, payload.into_inner(), &user.id)
            .await,
    )?;
    Ok(HttpResponse::Ok().json(task))
}

/// DELETE /tasks/{task_id}
pub async fn delete_task(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    logged("deleting task", data.tasks.remove(&path, &user.id).await)?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /tasks/statistics
pub async fn task_statistics(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let stats = logged("computing statistics", data.tasks.statistics(&user.id).await)?;
    Ok(HttpResponse::Ok().json(stats))
}

/// GET /tasks/overdue
pub async fn overdue_tasks(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let tasks = logged("listing overdue tasks", data.tasks.list_overdue(&user.id).await)?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// GET /tasks/statuses
pub async fn task_statuses() -> HttpResponse {
    HttpResponse::Ok().json(TaskStore::statuses())
}

/// GET /tasks/priorities
pub async fn task_priorities() -> HttpResponse {
    HttpResponse::Ok().json(TaskStore::priorities())
}
