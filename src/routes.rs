use actix_web::web;

use crate::auth::{login, register};
use crate::error::AppError;
use crate::tasks::{
    create_task, delete_task, get_task, list_tasks, overdue_tasks, task_priorities,
    task_statistics, task_statuses, update_task,
};
use crate::user_management::{get_current_user, get_user_by_id};

/// Route table shared by the server binary and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login)),
    )
    .service(
        web::scope("/users")
            .route("/me", web::get().to(get_current_user))
            .route("/{id}", web::get().to(get_user_by_id)),
    )
    .service(
        web::scope("/tasks")
            .route("", web::get().to(list_tasks))
            .route("", web::post().to(create_task))
            .route("/statuses", web::get().to(task_statuses))
            .route("/priorities", web::get().to(task_priorities))
            .route("/statistics", web::get().to(task_statistics))
            .route("/overdue", web::get().to(overdue_tasks))
            .route("/{task_id}", web::get().to(get_task))
            .route("/{task_id}", web::patch().to(update_task))
            .route("/{task_id}", web::delete().to(delete_task)),
    );
}
