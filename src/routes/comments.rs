use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::{Comment, NewComment};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

const DEFAULT_USERNAME: &str = "Reader";

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/chapters/{id}/comments",
        get(list_comments).post(create_comment),
    )
}

#[derive(Deserialize)]
pub struct CreateCommentForm {
    pub username: Option<String>,
    pub message: String,
}

async fn list_comments(
    State(state): State<AppState>,
    Path(chapter_id): Path<String>,
) -> AppResult<Json<Vec<Comment>>> {
    Ok(Json(state.repo.list_comments(&chapter_id).await?))
}

async fn create_comment(
    State(state): State<AppState>,
    Path(chapter_id): Path<String>,
    Json(form): Json<CreateCommentForm>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let message = form.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }

    let chapter = state
        .repo
        .get_chapter(&chapter_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let username = form
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DEFAULT_USERNAME.to_string());

    let comment = state
        .repo
        .insert_comment(NewComment {
            chapter_id: chapter.id,
            comic_id: chapter.comic_id,
            username,
            message: message.to_string(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
