use actix_web::{web, HttpResponse};
use log::error;

use crate::app_state::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::AppError;

/// GET /users/me
pub async fn get_current_user(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    // A token can outlive its account; treat that as a bad credential.
    match data.accounts.find_public(&user.id).await {
        Ok(profile) => Ok(HttpResponse::Ok().json(profile)),
        Err(AppError::NotFound(_)) => Err(AppError::Unauthorized("Unauthorized".to_string())),
        Err(e) => {
            error!("Error fetching current user: {}", e);
            Err(e)
        }
    }
}

/// GET /users/{id}
pub async fn get_user_by_id(
    _user: AuthenticatedUser,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let profile = data.accounts.find_public(&path).await?;
    Ok(HttpResponse::Ok().json(profile))
}
