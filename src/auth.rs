use std::sync::{Arc, OnceLock};

use actix_web::{web, HttpResponse};
use bcrypt::{hash, verify};
use chrono::{Duration, SubsecRound, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::AppError;
use crate::models::{AuthResponse, LoginInput, PublicUser, RegisterInput, User};
use crate::store::UserRepository;

const NAME_MAX: usize = 50;
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 100;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: usize,
}

/// Identity attached to a request once its bearer token has been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
    pub email: String,
}

/// Issues and validates signed bearer tokens bound to a user id.
#[derive(Clone)]
pub struct AuthProvider {
    secret: String,
    ttl: Duration,
}

impl AuthProvider {
    pub fn new(secret: impl Into<String>, ttl_hours: i64) -> Self {
        AuthProvider {
            secret: secret.into(),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let expiration = Utc::now() + self.ttl;
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            exp: expiration.timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| AppError::Internal(format!("Token encode error: {}", e)))
    }

    pub fn validate(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;
        Ok(AuthenticatedUser {
            id: token_data.claims.sub,
            email: token_data.claims.email,
        })
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"))
}

fn validate_registration(input: &RegisterInput) -> Result<(), AppError> {
    if !email_pattern().is_match(&input.email) {
        return Err(AppError::Validation("email must be an email".to_string()));
    }
    for (field, value) in [("firstName", &input.first_name), ("lastName", &input.last_name)] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{} should not be empty", field)));
        }
        if value.chars().count() > NAME_MAX {
            return Err(AppError::Validation(format!(
                "{} must be shorter than or equal to {} characters",
                field, NAME_MAX
            )));
        }
    }
    let password_len = input.password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&password_len) {
        return Err(AppError::Validation(format!(
            "password must be between {} and {} characters",
            PASSWORD_MIN, PASSWORD_MAX
        )));
    }
    Ok(())
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".to_string())
}

/// Registration and login on top of a user repository.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    auth: AuthProvider,
    bcrypt_cost: u32,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepository>, auth: AuthProvider, bcrypt_cost: u32) -> Self {
        AccountService {
            users,
            auth,
            bcrypt_cost,
        }
    }

    pub fn auth(&self) -> &AuthProvider {
        &self.auth
    }

    pub async fn register(&self, input: RegisterInput) -> Result<AuthResponse, AppError> {
        validate_registration(&input)?;
        if self.users.find_by_email(&input.email).await?.is_some() {
            return Err(crate::store::email_taken());
        }

        let cost = self.bcrypt_cost;
        let password = input.password;
        let password_hash = tokio::task::spawn_blocking(move || hash(password, cost))
            .await
            .map_err(|e| AppError::Internal(format!("hash worker failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Error hashing password: {}", e)))?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: input.email,
            password_hash,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            created_at: Utc::now().trunc_subsecs(3),
        };
        self.users.insert(&user).await?;
        info!("User registered: {}", user.id);

        Ok(AuthResponse {
            access_token: self.auth.issue(&user)?,
            user: PublicUser::from(&user),
        })
    }

    pub async fn login(&self, input: LoginInput) -> Result<AuthResponse, AppError> {
        let user = match self.users.find_by_email(&input.email).await? {
            Some(user) => user,
            None => {
                warn!("Login attempt for unknown email");
                return Err(invalid_credentials());
            }
        };

        let stored = user.password_hash.clone();
        let password = input.password;
        let matches = tokio::task::spawn_blocking(move || verify(password, &stored))
            .await
            .map_err(|e| AppError::Internal(format!("hash worker failed: {}", e)))?
            .unwrap_or(false);
        if !matches {
            warn!("Password mismatch for user {}", user.id);
            return Err(invalid_credentials());
        }

        Ok(AuthResponse {
            access_token: self.auth.issue(&user)?,
            user: PublicUser::from(&user),
        })
    }

    pub async fn find_public(&self, id: &str) -> Result<PublicUser, AppError> {
        self.users
            .find_by_id(id)
            .await?
            .map(|user| PublicUser::from(&user))
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

// POST /auth/register
pub async fn register(
    data: web::Data<AppState>,
    payload: web::Json<RegisterInput>,
) -> Result<HttpResponse, AppError> {
    let response = data.accounts.register(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

// POST /auth/login
pub async fn login(
    data: web::Data<AppState>,
    payload: web::Json<LoginInput>,
) -> Result<HttpResponse, AppError> {
    let response = data.accounts.login(payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryUserRepository;

    fn accounts() -> AccountService {
        AccountService::new(
            Arc::new(InMemoryUserRepository::new()),
            AuthProvider::new("test-secret", 1),
            4,
        )
    }

    fn registration(email: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: "password123".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
        }
    }

    #[tokio::test]
    async fn register_issues_a_token_for_the_new_user() {
        let accounts = accounts();
        let response = accounts.register(registration("test@example.com")).await.unwrap();
        assert_eq!(response.user.email, "test@example.com");
        assert_eq!(response.user.first_name, "Test");

        let identity = accounts.auth().validate(&response.access_token).unwrap();
        assert_eq!(identity.id, response.user.id);
        assert_eq!(identity.email, "test@example.com");
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let accounts = accounts();
        accounts.register(registration("test@example.com")).await.unwrap();
        let again = accounts.register(registration("test@example.com")).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn register_validates_fields() {
        let accounts = accounts();
        let bad_email = accounts.register(registration("not-an-email")).await;
        assert!(matches!(bad_email, Err(AppError::Validation(_))));

        let short_password = RegisterInput {
            password: "12345".to_string(),
            ..registration("a@example.com")
        };
        assert!(matches!(
            accounts.register(short_password).await,
            Err(AppError::Validation(_))
        ));

        let long_name = RegisterInput {
            first_name: "x".repeat(51),
            ..registration("b@example.com")
        };
        assert!(matches!(accounts.register(long_name).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn login_checks_credentials() {
        let accounts = accounts();
        let registered = accounts.register(registration("test@example.com")).await.unwrap();

        let ok = accounts
            .login(LoginInput {
                email: "test@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(ok.user, registered.user);

        let wrong_password = accounts
            .login(LoginInput {
                email: "test@example.com".to_string(),
                password: "nope-nope".to_string(),
            })
            .await;
        assert!(matches!(wrong_password, Err(AppError::Unauthorized(_))));

        let unknown = accounts
            .login(LoginInput {
                email: "ghost@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await;
        assert!(matches!(unknown, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let user = User {
            id: "u1".to_string(),
            email: "a@example.com".to_string(),
            password_hash: String::new(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            created_at: Utc::now(),
        };
        let token = AuthProvider::new("one", 1).issue(&user).unwrap();
        assert!(matches!(
            AuthProvider::new("two", 1).validate(&token),
            Err(AppError::Unauthorized(_))
        ));
    }
}
