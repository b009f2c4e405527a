// src/main.rs

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::info;

use taskboard::config::{Config, StorageBackend};
use taskboard::middleware::Authentication;
use taskboard::store::{
    InMemoryTaskRepository, InMemoryUserRepository, MongoDB, MongoTaskRepository,
    MongoUserRepository, TaskRepository, UserRepository,
};
use taskboard::{routes, AppError, AppState};

async fn build_state(config: &Config) -> Result<AppState, AppError> {
    let (tasks, users): (Arc<dyn TaskRepository>, Arc<dyn UserRepository>) = match &config.storage {
        StorageBackend::Mongo { uri, database_name } => {
            let mongodb = MongoDB::init(uri, database_name).await?;
            (
                Arc::new(MongoTaskRepository::new(&mongodb)),
                Arc::new(MongoUserRepository::init(&mongodb).await?),
            )
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on shutdown");
            (
                Arc::new(InMemoryTaskRepository::new()),
                Arc::new(InMemoryUserRepository::new()),
            )
        }
    };
    Ok(AppState::new(tasks, users, config))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(io::Error::other)?;
    let state = build_state(&config).await.map_err(io::Error::other)?;

    let Config {
        bind_address,
        frontend_origin,
        ..
    } = config;

    info!("Server running at http://{}", bind_address);
    info!("Allowed CORS Origin: {}", frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Authentication::new(state.auth().clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
    })
    .bind(bind_address)?
    .run()
    .await
}
