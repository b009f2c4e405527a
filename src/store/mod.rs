//! Persistence seams for tasks and users.
//!
//! Every task operation goes through a [`TaskQuery`], which cannot be built
//! without an owner. Two backends exist: MongoDB for deployments and an
//! in-memory map for tests and local runs.

mod memory;
mod mongo;
mod query;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{Task, TaskStatistics, User};

pub use memory::{InMemoryTaskRepository, InMemoryUserRepository};
pub use mongo::{MongoDB, MongoTaskRepository, MongoUserRepository};
pub use query::{TaskOrder, TaskQuery};

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn insert(&self, task: &Task) -> Result<(), AppError>;

    /// Materialised list of every task matching `query`.
    async fn find(&self, query: &TaskQuery, order: TaskOrder) -> Result<Vec<Task>, AppError>;

    async fn find_one(&self, query: &TaskQuery) -> Result<Option<Task>, AppError>;

    /// Overwrites the stored task with the same id and owner.
    /// Returns `false` when no such task exists.
    async fn replace(&self, task: &Task) -> Result<bool, AppError>;

    /// Deletes matching tasks and returns how many were removed.
    async fn delete(&self, query: &TaskQuery) -> Result<u64, AppError>;

    async fn statistics(&self, query: &TaskQuery) -> Result<TaskStatistics, AppError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn insert(&self, user: &User) -> Result<(), AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError>;
}

pub(crate) fn email_taken() -> AppError {
    AppError::Conflict("User with this email already exists".to_string())
}
