use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use serde::Deserialize;

use crate::admin;
use crate::db::models::Page;
use crate::error::{AppError, AppResult};
use crate::extractors::AdminKey;
use crate::routes::UploadForm;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/chapters/{id}/pages",
            get(list_pages).post(append_pages),
        )
        .route("/api/chapters/{id}/pages/order", put(reorder_pages))
        .route("/api/pages/{id}", delete(delete_page))
}

/// Either a full ordering or a single move.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PageOrder {
    Ids { page_ids: Vec<String> },
    Move { from: usize, to: usize },
}

async fn list_pages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Page>>> {
    if state.repo.get_chapter(&id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    Ok(Json(state.repo.list_pages(&id).await?))
}

async fn append_pages(
    State(state): State<AppState>,
    _admin: AdminKey,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Vec<Page>>)> {
    let mut form = UploadForm::read(multipart).await?;
    let files = form.take_files("pages");
    let pages = admin::append_pages(state.repo.as_ref(), state.blobs.as_ref(), &id, files).await?;
    Ok((StatusCode::CREATED, Json(pages)))
}

async fn reorder_pages(
    State(state): State<AppState>,
    _admin: AdminKey,
    Path(id): Path<String>,
    Json(order): Json<PageOrder>,
) -> AppResult<Json<Vec<Page>>> {
    if state.repo.get_chapter(&id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let pages = state.repo.list_pages(&id).await?;

    let ordered = match order {
        PageOrder::Ids { page_ids } => admin::order_pages_by_ids(pages, &page_ids)?,
        PageOrder::Move { from, to } => admin::reorder_pages(pages, from, to)?,
    };
    admin::save_page_order(state.repo.as_ref(), &ordered).await?;

    tracing::info!("Reordered {} pages of chapter {}", ordered.len(), id);
    Ok(Json(ordered))
}

async fn delete_page(
    State(state): State<AppState>,
    _admin: AdminKey,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    admin::delete_page(state.repo.as_ref(), state.blobs.as_ref(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
