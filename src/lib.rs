//! Multi-user task board: an owner-scoped task service over HTTP and a
//! client-side board controller with optimistic drag-and-drop.

pub mod app_state;
pub mod auth;
pub mod board;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod store;
pub mod task_store;
pub mod tasks;
pub mod user_management;

pub use app_state::AppState;
pub use error::AppError;
