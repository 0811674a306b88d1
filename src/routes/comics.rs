use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::admin::{self, NewComicForm};
use crate::cascade::CascadeDeleter;
use crate::db::models::{Chapter, Comic, ComicUpdate, Page};
use crate::error::{AppError, AppResult};
use crate::extractors::AdminKey;
use crate::routes::UploadForm;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/comics", get(list_comics).post(create_comic))
        .route(
            "/api/comics/{id}",
            get(get_comic).patch(update_comic).delete(delete_comic),
        )
        .route(
            "/api/comics/{id}/chapters",
            get(list_chapters).post(create_chapter),
        )
}

#[derive(serde::Serialize)]
pub struct CreatedChapter {
    pub chapter: Chapter,
    pub pages: Vec<Page>,
}

// --- Handlers ---

async fn list_comics(State(state): State<AppState>) -> AppResult<Json<Vec<Comic>>> {
    Ok(Json(state.repo.list_comics().await?))
}

async fn get_comic(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Comic>> {
    let comic = state.repo.get_comic(&id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(comic))
}

async fn create_comic(
    State(state): State<AppState>,
    _admin: AdminKey,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Comic>)> {
    let mut form = UploadForm::read(multipart).await?;
    let comic_form = NewComicForm {
        title: form.field("title").unwrap_or_default(),
        description: form.field("description"),
        author: form.field("author"),
        status: form.field("status"),
        genres: form.field("genres").unwrap_or_default(),
        cover: form.take_file("cover"),
    };

    let comic = admin::create_comic(state.repo.as_ref(), state.blobs.as_ref(), comic_form).await?;
    Ok((StatusCode::CREATED, Json(comic)))
}

async fn update_comic(
    State(state): State<AppState>,
    _admin: AdminKey,
    Path(id): Path<String>,
    Json(update): Json<ComicUpdate>,
) -> AppResult<Json<Comic>> {
    let comic = admin::update_comic(state.repo.as_ref(), &id, update).await?;
    Ok(Json(comic))
}

/// Runs the cascade and returns its report. A report that stopped early is a 500.
async fn delete_comic(
    State(state): State<AppState>,
    _admin: AdminKey,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let report = CascadeDeleter::new(state.repo.as_ref(), state.blobs.as_ref())
        .delete_comic(&id)
        .await?;

    let status = if report.completed {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(report)).into_response())
}

async fn list_chapters(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Chapter>>> {
    if state.repo.get_comic(&id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    Ok(Json(state.repo.list_chapters(&id).await?))
}

async fn create_chapter(
    State(state): State<AppState>,
    _admin: AdminKey,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<CreatedChapter>)> {
    let mut form = UploadForm::read(multipart).await?;

    let chapter_number = form
        .field("chapter_number")
        .unwrap_or_default()
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest("Chapter number must be a whole number".into()))?;
    let title = form.field("title").unwrap_or_default();
    let files = form.take_files("pages");

    let (chapter, pages) = admin::create_chapter(
        state.repo.as_ref(),
        state.blobs.as_ref(),
        &id,
        &title,
        chapter_number,
        files,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(CreatedChapter { chapter, pages })))
}
