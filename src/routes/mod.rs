pub mod blobs;
pub mod chapters;
pub mod comics;
pub mod comments;
pub mod pages;
pub mod users;

use std::collections::HashMap;

use axum::extract::{DefaultBodyLimit, Multipart};
use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{AllowMethods, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::admin::Upload;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// The full HTTP surface with tracing, ready to serve.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    Router::new()
        .merge(comics::router())
        .merge(chapters::router())
        .merge(pages::router())
        .merge(comments::router())
        .merge(users::router())
        .merge(blobs::router())
        // Page uploads are whole chapters of images
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let list: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
        .collect();
    let layer = CorsLayer::new()
        .allow_methods(AllowMethods::any())
        .allow_headers(Any);
    if list.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(list)
    }
}

/// Text fields and file parts of a multipart upload, files kept in the order received.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<(String, Upload)>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?;

            match file_name {
                Some(file_name) if !data.is_empty() => {
                    form.files.push((name, Upload::new(file_name, data)))
                }
                Some(_) => {}
                None => {
                    form.fields
                        .insert(name, String::from_utf8_lossy(&data).into_owned());
                }
            }
        }
        Ok(form)
    }

    pub fn field(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        let idx = self.files.iter().position(|(n, _)| n == name)?;
        Some(self.files.remove(idx).1)
    }

    pub fn take_files(&mut self, name: &str) -> Vec<Upload> {
        let (wanted, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(n, _)| n == name);
        self.files = rest;
        wanted.into_iter().map(|(_, upload)| upload).collect()
    }
}
