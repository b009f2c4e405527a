use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{
    AuthResponse, CreateTaskInput, LoginInput, PublicUser, RegisterInput, Task, TaskFilter,
    TaskStatistics, UpdateTaskInput,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status}: {message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    Validation(String),

    #[error("task {0} is not on the board")]
    UnknownTask(String),

    #[error("task {0} has not been saved yet")]
    Unsaved(String),

    #[error("not signed in")]
    NotAuthenticated,
}

/// Remote task service as seen by the board.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn register(&self, input: &RegisterInput) -> Result<AuthResponse, ClientError>;

    async fn login(&self, input: &LoginInput) -> Result<AuthResponse, ClientError>;

    async fn list_tasks(&self, token: &str, filter: &TaskFilter) -> Result<Vec<Task>, ClientError>;

    async fn create_task(&self, token: &str, input: &CreateTaskInput) -> Result<Task, ClientError>;

    async fn update_task(
        &self,
        token: &str,
        id: &str,
        patch: &UpdateTaskInput,
    ) -> Result<Task, ClientError>;

    async fn delete_task(&self, token: &str, id: &str) -> Result<(), ClientError>;
}

/// `TaskApi` over HTTP.
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

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
        if res.status().is_success() {
            Ok(res.json::<T>().await?)
        } else {
            Err(Self::failure(res).await)
        }
    }

    async fn failure(res: Response) -> ClientError {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|body| body.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or(text);
        ClientError::Api { status, message }
    }

    pub async fn me(&self, token: &str) -> Result<PublicUser, ClientError> {
        let res = self
            .client
            .get(self.url("/users/me"))
            .bearer_auth(token)
            .send()
            .await?;
        Self::read(res).await
    }

    pub async fn statistics(&self, token: &str) -> Result<TaskStatistics, ClientError> {
        let res = self
            .client
            .get(self.url("/tasks/statistics"))
            .bearer_auth(token)
            .send()
            .await?;
        Self::read(res).await
    }

    pub async fn overdue(&self, token: &str) -> Result<Vec<Task>, ClientError> {
        let res = self
            .client
            .get(self.url("/tasks/overdue"))
            .bearer_auth(token)
            .send()
            .await?;
        Self::read(res).await
    }

    pub async fn statuses(&self) -> Result<Vec<String>, ClientError> {
        let res = self.client.get(self.url("/tasks/statuses")).send().await?;
        Self::read(res).await
    }

    pub async fn priorities(&self) -> Result<Vec<String>, ClientError> {
        let res = self.client.get(self.url("/tasks/priorities")).send().await?;
        Self::read(res).await
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn register(&self, input: &RegisterInput) -> Result<AuthResponse, ClientError> {
        let res = self
            .client
            .post(self.url("/auth/register"))
            .json(input)
            .send()
            .await?;
        Self::read(res).await
    }

    async fn login(&self, input: &LoginInput) -> Result<AuthResponse, ClientError> {
        let res = self
            .client
            .post(self.url("/auth/login"))
            .json(input)
            .send()
            .await?;
        Self::read(res).await
    }

    async fn list_tasks(&self, token: &str, filter: &TaskFilter) -> Result<Vec<Task>, ClientError> {
        let res = self
            .client
            .get(self.url("/tasks"))
            .bearer_auth(token)
            .query(filter)
            .send()
            .await?;
        Self::read(res).await
    }

    async fn create_task(&self, token: &str, input: &CreateTaskInput) -> Result<Task, ClientError> {
        let res = self
            .client
            .post(self.url("/tasks"))
            .bearer_auth(token)
            .json(input)
            .send()
            .await?;
        Self::read(res).await
    }

    async fn update_task(
        &self,
        token: &str,
        id: &str,
        patch: &UpdateTaskInput,
    ) -> Result<Task, ClientError> {
        let res = self
            .client
            .patch(self.url(&format!("/tasks/{}", id)))
            .bearer_auth(token)
            .json(patch)
            .send()
            .await?;
        Self::read(res).await
    }

    async fn delete_task(&self, token: &str, id: &str) -> Result<(), ClientError> {
        let res = self
            .client
            .delete(self.url(&format!("/tasks/{}", id)))
            .bearer_auth(token)
            .send()
            .await?;
        if res.status().is_success() {
            Ok(())
        } else {
            Err(Self::failure(res).await)
        }
    }
}
