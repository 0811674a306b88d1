use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::cascade::CascadeDeleter;
use crate::db::models::Chapter;
use crate::error::{AppError, AppResult};
use crate::extractors::AdminKey;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/chapters/{id}", get(get_chapter).delete(delete_chapter))
}

async fn get_chapter(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Chapter>> {
    let chapter = state.repo.get_chapter(&id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(chapter))
}

/// Removes the chapter's page blobs and rows before the chapter itself.
async fn delete_chapter(
    State(state): State<AppState>,
    _admin: AdminKey,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let report = CascadeDeleter::new(state.repo.as_ref(), state.blobs.as_ref())
        .delete_chapter(&id)
        .await?;

    let status = if report.completed {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(report)).into_response())
}
