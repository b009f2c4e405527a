#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use taskboard::board::{ClientError, TaskApi};
use taskboard::config::{Config, StorageBackend};
use taskboard::models::{
    AuthResponse, CreateTaskInput, LoginInput, RegisterInput, Task, TaskFilter, UpdateTaskInput,
};
use taskboard::store::{InMemoryTaskRepository, InMemoryUserRepository};
use taskboard::{AppError, AppState};

pub fn test_config() -> Config {
    Config {
        storage: StorageBackend::Memory,
        jwt_secret: "integration-secret".to_string(),
        jwt_ttl_hours: 1,
        bcrypt_cost: 4,
        bind_address: "127.0.0.1:0".to_string(),
        frontend_origin: "http://localhost:3000".to_string(),
    }
}

pub fn test_state() -> AppState {
    AppState::new(
        Arc::new(InMemoryTaskRepository::new()),
        Arc::new(InMemoryUserRepository::new()),
        &test_config(),
    )
}

pub fn registration(email: &str) -> RegisterInput {
    RegisterInput {
        email: email.to_string(),
        password: "password123".to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
    }
}

fn to_client(err: AppError) -> ClientError {
    use actix_web::ResponseError;
    ClientError::Api {
        status: err.status_code().as_u16(),
        message: err.to_string(),
    }
}

/// `TaskApi` backed directly by the server-side services, with switchable
/// failure injection for task mutations.
pub struct LocalTaskApi {
    state: AppState,
    fail_mutations: AtomicBool,
    fail_list: AtomicBool,
    mutation_calls: AtomicUsize,
}

impl LocalTaskApi {
    pub fn new(state: AppState) -> Self {
        LocalTaskApi {
            state,
            fail_mutations: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            mutation_calls: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    fn owner(&self, token: &str) -> Result<String, ClientError> {
        self.state
            .auth()
            .validate(token)
            .map(|user| user.id)
            .map_err(to_client)
    }

    fn mutation(&self) -> Result<(), ClientError> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(ClientError::Api {
                status: 500,
                message: "Internal server error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TaskApi for LocalTaskApi {
    async fn register(&self, input: &RegisterInput) -> Result<AuthResponse, ClientError> {
        self.state
            .accounts
            .register(input.clone())
            .await
            .map_err(to_client)
    }

    async fn login(&self, input: &LoginInput) -> Result<AuthResponse, ClientError> {
        self.state.accounts.login(input.clone()).await.map_err(to_client)
    }

    async fn list_tasks(&self, token: &str, filter: &TaskFilter) -> Result<Vec<Task>, ClientError> {
        let owner = self.owner(token)?;
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ClientError::Api {
                status: 500,
                message: "Internal server error".to_string(),
            });
        }
        self.state.tasks.list(filter, &owner).await.map_err(to_client)
    }

    async fn create_task(&self, token: &str, input: &CreateTaskInput) -> Result<Task, ClientError> {
        let owner = self.owner(token)?;
        self.mutation()?;
        self.state
            .tasks
            .create(input.clone(), &owner)
            .await
            .map_err(to_client)
    }

    async fn update_task(
        &self,
        token: &str,
        id: &str,
        patch: &UpdateTaskInput,
    ) -> Result<Task, ClientError> {
        let owner = self.owner(token)?;
        self.mutation()?;
        self.state
            .tasks
            .update(id, patch.clone(), &owner)
            .await
            .map_err(to_client)
    }

    async fn delete_task(&self, token: &str, id: &str) -> Result<(), ClientError> {
        let owner = self.owner(token)?;
        self.mutation()?;
        self.state.tasks.remove(id, &owner).await.map_err(to_client)
    }
}

pub fn local_api() -> LocalTaskApi {
    LocalTaskApi::new(test_state())
}
