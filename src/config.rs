use std::env;
use std::str::FromStr;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Mongo { uri: String, database_name: String },
    Memory,
}

#[derive(Clone)]
pub struct Config {
    pub storage: StorageBackend,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub bind_address: String,
    pub frontend_origin: String,
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value '{}'", name, raw))),
        Err(_) => Ok(default),
    }
}

fn required_var(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Config(format!("{} must be set", name)))
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();

        let storage = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "mongo".to_string())
            .to_lowercase()
            .as_str()
        {
            "mongo" => StorageBackend::Mongo {
                uri: required_var("MONGO_URI")?,
                database_name: env::var("DATABASE_NAME")
                    .unwrap_or_else(|_| "taskmanagement".to_string()),
            },
            "memory" => StorageBackend::Memory,
            other => {
                return Err(AppError::Config(format!(
                    "STORAGE_BACKEND must be 'mongo' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let bcrypt_cost = parse_var("BCRYPT_COST", 10u32)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(AppError::Config("BCRYPT_COST must be between 4 and 31".to_string()));
        }

        Ok(Self {
            storage,
            jwt_secret: required_var("JWT_SECRET")?,
            jwt_ttl_hours: parse_var("JWT_TTL_HOURS", 24i64)?,
            bcrypt_cost,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }
}
