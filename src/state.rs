use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::blobs::BlobStore;
use crate::config::Config;
use crate::content::ContentRepository;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub repo: Arc<dyn ContentRepository>,
    pub blobs: Arc<dyn BlobStore>,
}
