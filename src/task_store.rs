use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use log::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    parse_due_date, CreateTaskInput, Task, TaskFilter, TaskPriority, TaskStatistics, TaskStatus,
    UpdateTaskInput,
};
use crate::store::{TaskOrder, TaskQuery, TaskRepository};

/// Authoritative task operations. Every call is scoped to `owner_id`, the
/// authenticated caller, and a task owned by someone else is reported exactly
/// like a missing one.
#[derive(Clone)]
pub struct TaskStore {
    repo: Arc<dyn TaskRepository>,
}

// BSON dates carry milliseconds; keep returned records identical to stored ones.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn due_date(raw: &str) -> Result<DateTime<Utc>, AppError> {
    Ok(parse_due_date(raw)?.trunc_subsecs(3))
}

fn required_title(title: Option<&str>) -> Result<String, AppError> {
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => Err(AppError::Validation("title should not be empty".to_string())),
    }
}

impl TaskStore {
    pub fn new(repo: Arc<dyn TaskRepository>) -> Self {
        TaskStore { repo }
    }

    pub async fn create(&self, input: CreateTaskInput, owner_id: &str) -> Result<Task, AppError> {
        let title = required_title(input.title.as_deref())?;
        let due_date = input.due_date.as_deref().map(due_date).transpose()?;
        let now = now();

        let task = Task {
            id: Uuid::new_v4().to_string(),
            title,
            description: input.description,
            status: input.status.unwrap_or_default(),
            priority: input.priority.unwrap_or_default(),
            owner_id: owner_id.to_string(),
            due_date,
            created_at: now,
            updated_at: now,
        };
        self.repo.insert(&task).await?;
        info!("Task created: {} (owner {})", task.id, owner_id);
        Ok(task)
    }

    /// Newest first.
    pub async fn list(&self, filter: &TaskFilter, owner_id: &str) -> Result<Vec<Task>, AppError> {
        let query = TaskQuery::from_filter(owner_id, filter);
        self.repo.find(&query, TaskOrder::NewestFirst).await
    }

    pub async fn get_by_id(&self, id: &str, owner_id: &str) -> Result<Task, AppError> {
        let query = TaskQuery::owned_by(owner_id).with_id(id);
        self.repo
            .find_one(&query)
            .await?
            .ok_or_else(AppError::task_not_found)
    }

    pub async fn update(
        &self,
        id: &str,
        patch: UpdateTaskInput,
        owner_id: &str,
    ) -> Result<Task, AppError> {
        let mut task = self.get_by_id(id, owner_id).await?;

        if let Some(title) = patch.title.as_deref() {
            task.title = required_title(Some(title))?;
        }
        if let Some(description) = patch.description {
            task.description = Some(description);
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(raw) = patch.due_date.as_deref() {
            task.due_date = Some(due_date(raw)?);
        }
        task.updated_at = now().max(task.created_at);

        if !self.repo.replace(&task).await? {
            return Err(AppError::task_not_found());
        }
        info!("Task updated: {}", task.id);
        Ok(task)
    }

    pub async fn remove(&self, id: &str, owner_id: &str) -> Result<(), AppError> {
        let task = self.get_by_id(id, owner_id).await?;
        let query = TaskQuery::owned_by(owner_id).with_id(&task.id);
        if self.repo.delete(&query).await? == 0 {
            return Err(AppError::task_not_found());
        }
        info!("Task deleted: {}", task.id);
        Ok(())
    }

    pub async fn statistics(&self, owner_id: &str) -> Result<TaskStatistics, AppError> {
        self.repo.statistics(&TaskQuery::owned_by(owner_id)).await
    }

    /// Tasks past their due date that are not done, soonest due first.
    pub async fn list_overdue(&self, owner_id: &str) -> Result<Vec<Task>, AppError> {
        let query = TaskQuery::owned_by(owner_id)
            .due_before(Utc::now())
            .excluding_status(TaskStatus::Done);
        self.repo.find(&query, TaskOrder::DueSoonest).await
    }

    pub fn statuses() -> Vec<&'static str> {
        TaskStatus::ALL.iter().map(TaskStatus::as_str).collect()
    }

    pub fn priorities() -> Vec<&'static str> {
        TaskPriority::ALL.iter().map(TaskPriority::as_str).collect()
    }
}
