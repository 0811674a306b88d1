// Content repository - the remote CRUD surface for comics, chapters, pages and comments
mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::*;

pub use self::sqlite::SqliteContentRepository;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Database error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Every listing states its order explicitly; callers rely on it.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    // --- comics ---

    /// Newest first.
    async fn list_comics(&self) -> Result<Vec<Comic>, ContentError>;

    async fn get_comic(&self, id: &str) -> Result<Option<Comic>, ContentError>;

    async fn insert_comic(&self, comic: NewComic) -> Result<Comic, ContentError>;

    async fn update_comic(&self, id: &str, update: ComicUpdate) -> Result<Comic, ContentError>;

    async fn delete_comic(&self, id: &str) -> Result<bool, ContentError>;

    // --- chapters ---

    /// Ascending `chapter_number`.
    async fn list_chapters(&self, comic_id: &str) -> Result<Vec<Chapter>, ContentError>;

    async fn get_chapter(&self, id: &str) -> Result<Option<Chapter>, ContentError>;

    async fn chapter_ids_for_comic(&self, comic_id: &str) -> Result<Vec<String>, ContentError>;

    /// Returns the stored row so dependent uploads can reference its id.
    async fn insert_chapter(&self, chapter: NewChapter) -> Result<Chapter, ContentError>;

    async fn delete_chapter(&self, id: &str) -> Result<bool, ContentError>;

    async fn delete_chapters_for_comic(&self, comic_id: &str) -> Result<u64, ContentError>;

    // --- pages ---

    /// Ascending `page_number`.
    async fn list_pages(&self, chapter_id: &str) -> Result<Vec<Page>, ContentError>;

    async fn get_page(&self, id: &str) -> Result<Option<Page>, ContentError>;

    async fn insert_page(&self, page: NewPage) -> Result<Page, ContentError>;

    async fn set_page_number(&self, id: &str, page_number: i64) -> Result<(), ContentError>;

    async fn delete_page(&self, id: &str) -> Result<bool, ContentError>;

    async fn delete_pages_for_chapter(&self, chapter_id: &str) -> Result<u64, ContentError>;

    // --- comments ---

    /// Newest first.
    async fn list_comments(&self, chapter_id: &str) -> Result<Vec<Comment>, ContentError>;

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, ContentError>;

    // --- users ---

    async fn register_user(&self, username: &str) -> Result<User, ContentError>;

    async fn find_user(&self, username: &str) -> Result<Option<User>, ContentError>;
}
