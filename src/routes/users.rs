use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::local::normalize_username;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", post(register))
        .route("/api/users/{username}", get(find))
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
}

/// Claim a handle. The same rules apply as for the local profile.
async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegisterForm>,
) -> AppResult<(StatusCode, Json<User>)> {
    let username = normalize_username(&form.username)?;
    let user = state.repo.register_user(&username).await?;
    tracing::info!("Registered user {}", user.username);
    Ok((StatusCode::CREATED, Json(user)))
}

async fn find(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<User>> {
    let username = username.trim().to_lowercase();
    let user = state
        .repo
        .find_user(&username)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(user))
}
