use std::sync::Arc;

use crate::auth::{AccountService, AuthProvider};
use crate::config::Config;
use crate::store::{TaskRepository, UserRepository};
use crate::task_store::TaskStore;

#[derive(Clone)]
pub struct AppState {
    pub tasks: TaskStore,
    pub accounts: AccountService,
}

impl AppState {
    pub fn new(
        task_repo: Arc<dyn TaskRepository>,
        user_repo: Arc<dyn UserRepository>,
        config: &Config,
    ) -> Self {
        let auth = AuthProvider::new(config.jwt_secret.clone(), config.jwt_ttl_hours);
        AppState {
            tasks: TaskStore::new(task_repo),
            accounts: AccountService::new(user_repo, auth, config.bcrypt_cost),
        }
    }

    pub fn auth(&self) -> &AuthProvider {
        self.accounts.auth()
    }
}
