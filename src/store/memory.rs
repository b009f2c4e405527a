use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{email_taken, TaskOrder, TaskQuery, TaskRepository, UserRepository};
use crate::error::AppError;
use crate::models::{Task, TaskStatistics, User};

/// Task repository held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<Vec<Task>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn insert(&self, task: &Task) -> Result<(), AppError> {
        let mut tasks = self.tasks.write().await;
        if tasks.iter().any(|t| t.id == task.id) {
            return Err(AppError::Conflict(format!("Task {} already exists", task.id)));
        }
        tasks.push(task.clone());
        Ok(())
    }

    async fn find(&self, query: &TaskQuery, order: TaskOrder) -> Result<Vec<Task>, AppError> {
        let tasks = self.tasks.read().await;
        let mut found: Vec<Task> = tasks.iter().filter(|t| query.matches(t)).cloned().collect();
        order.sort(&mut found);
        Ok(found)
    }

    async fn find_one(&self, query: &TaskQuery) -> Result<Option<Task>, AppError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.iter().find(|t| query.matches(t)).cloned())
    }

    async fn replace(&self, task: &Task) -> Result<bool, AppError> {
        let mut tasks = self.tasks.write().await;
        match tasks
            .iter_mut()
            .find(|t| t.id == task.id && t.owner_id == task.owner_id)
        {
            Some(slot) => {
                *slot = task.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, query: &TaskQuery) -> Result<u64, AppError> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|t| !query.matches(t));
        Ok((before - tasks.len()) as u64)
    }

    async fn statistics(&self, query: &TaskQuery) -> Result<TaskStatistics, AppError> {
        let tasks = self.tasks.read().await;
        let mut stats = TaskStatistics::default();
        for task in tasks.iter().filter(|t| query.matches(t)) {
            *stats.by_status.entry(task.status).or_insert(0) += 1;
            *stats.by_priority.entry(task.priority).or_insert(0) += 1;
        }
        Ok(stats)
    }
}

/// User repository held in process memory. Emails are unique.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(email_taken());
        }
        users.push(user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }
}
