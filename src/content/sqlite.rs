use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{ContentError, ContentRepository};
use crate::db::models::*;
use crate::state::DbPool;

/// SQLite implementation
pub struct SqliteContentRepository {
    pool: DbPool,
}

impl SqliteContentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const COMIC_COLUMNS: &str =
    "id, title, description, cover_url, cover_key, author, status, genres, created_at";
const PAGE_COLUMNS: &str = "id, chapter_id, image_url, image_key, page_number";

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn comic_from_row(row: &Row<'_>) -> rusqlite::Result<Comic> {
    let genres_json: String = row.get(7)?;
    Ok(Comic {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        cover_url: row.get(3)?,
        cover_key: row.get(4)?,
        author: row.get(5)?,
        status: row.get(6)?,
        // Rows written by hand may hold anything here
        genres: serde_json::from_str(&genres_json).unwrap_or_default(),
        created_at: row.get(8)?,
    })
}

fn chapter_from_row(row: &Row<'_>) -> rusqlite::Result<Chapter> {
    Ok(Chapter {
        id: row.get(0)?,
        comic_id: row.get(1)?,
        title: row.get(2)?,
        chapter_number: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<Page> {
    Ok(Page {
        id: row.get(0)?,
        chapter_id: row.get(1)?,
        image_url: row.get(2)?,
        image_key: row.get(3)?,
        page_number: row.get(4)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        chapter_id: row.get(1)?,
        comic_id: row.get(2)?,
        username: row.get(3)?,
        message: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn query_comic(conn: &Connection, id: &str) -> Result<Option<Comic>, ContentError> {
    let comic = conn
        .query_row(
            &format!("SELECT {} FROM comics WHERE id = ?1", COMIC_COLUMNS),
            params![id],
            comic_from_row,
        )
        .optional()?;
    Ok(comic)
}

fn query_chapter(conn: &Connection, id: &str) -> Result<Option<Chapter>, ContentError> {
    let chapter = conn
        .query_row(
            "SELECT id, comic_id, title, chapter_number, created_at FROM chapters WHERE id = ?1",
            params![id],
            chapter_from_row,
        )
        .optional()?;
    Ok(chapter)
}

fn query_page(conn: &Connection, id: &str) -> Result<Option<Page>, ContentError> {
    let page = conn
        .query_row(
            &format!("SELECT {} FROM pages WHERE id = ?1", PAGE_COLUMNS),
            params![id],
            page_from_row,
        )
        .optional()?;
    Ok(page)
}

fn constraint_code(err: &rusqlite::Error) -> Option<std::os::raw::c_int> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            Some(e.extended_code)
        }
        _ => None,
    }
}

/// Map constraint violations on insert to domain errors.
fn map_insert_error(err: rusqlite::Error, unique: &str, parent: &str) -> ContentError {
    match constraint_code(&err) {
        Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
        | Some(rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => {
            ContentError::Conflict(unique.to_string())
        }
        Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
            ContentError::NotFound(parent.to_string())
        }
        _ => err.into(),
    }
}

#[async_trait]
impl ContentRepository for SqliteContentRepository {
    async fn list_comics(&self) -> Result<Vec<Comic>, ContentError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM comics ORDER BY created_at DESC, rowid DESC",
            COMIC_COLUMNS
        ))?;
        let comics = stmt
            .query_map([], comic_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comics)
    }

    async fn get_comic(&self, id: &str) -> Result<Option<Comic>, ContentError> {
        let conn = self.pool.get()?;
        query_comic(&conn, id)
    }

    async fn insert_comic(&self, comic: NewComic) -> Result<Comic, ContentError> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();
        let genres = serde_json::to_string(&comic.genres)?;

        conn.execute(
            "INSERT INTO comics (id, title, description, cover_url, cover_key, author, status, genres, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                comic.title,
                comic.description,
                comic.cover_url,
                comic.cover_key,
                comic.author,
                comic.status,
                genres,
                now(),
            ],
        )?;

        query_comic(&conn, &id)?.ok_or_else(|| ContentError::NotFound(format!("comic {}", id)))
    }

    async fn update_comic(&self, id: &str, update: ComicUpdate) -> Result<Comic, ContentError> {
        let conn = self.pool.get()?;
        let mut comic = query_comic(&conn, id)?
            .ok_or_else(|| ContentError::NotFound(format!("comic {}", id)))?;

        if let Some(title) = update.title {
            comic.title = title;
        }
        if let Some(description) = update.description {
            comic.description = Some(description);
        }
        if let Some(author) = update.author {
            comic.author = Some(author);
        }
        if let Some(status) = update.status {
            comic.status = Some(status);
        }
        if let Some(genres) = update.genres {
            comic.genres = genres;
        }

        conn.execute(
            "UPDATE comics SET title = ?2, description = ?3, author = ?4, status = ?5, genres = ?6
             WHERE id = ?1",
            params![
                id,
                comic.title,
                comic.description,
                comic.author,
                comic.status,
                serde_json::to_string(&comic.genres)?,
            ],
        )?;

        Ok(comic)
    }

    async fn delete_comic(&self, id: &str) -> Result<bool, ContentError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM comics WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    async fn list_chapters(&self, comic_id: &str) -> Result<Vec<Chapter>, ContentError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, comic_id, title, chapter_number, created_at
             FROM chapters
             WHERE comic_id = ?1
             ORDER BY chapter_number ASC",
        )?;
        let chapters = stmt
            .query_map(params![comic_id], chapter_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(chapters)
    }

    async fn get_chapter(&self, id: &str) -> Result<Option<Chapter>, ContentError> {
        let conn = self.pool.get()?;
        query_chapter(&conn, id)
    }

    async fn chapter_ids_for_comic(&self, comic_id: &str) -> Result<Vec<String>, ContentError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM chapters WHERE comic_id = ?1 ORDER BY chapter_number ASC",
        )?;
        let ids = stmt
            .query_map(params![comic_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    async fn insert_chapter(&self, chapter: NewChapter) -> Result<Chapter, ContentError> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();

        conn.execute(
            "INSERT INTO chapters (id, comic_id, title, chapter_number, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                chapter.comic_id,
                chapter.title,
                chapter.chapter_number,
                now()
            ],
        )
        .map_err(|e| {
            map_insert_error(
                e,
                &format!("chapter {} already exists", chapter.chapter_number),
                &format!("comic {}", chapter.comic_id),
            )
        })?;

        query_chapter(&conn, &id)?.ok_or_else(|| ContentError::NotFound(format!("chapter {}", id)))
    }

    async fn delete_chapter(&self, id: &str) -> Result<bool, ContentError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM chapters WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    async fn delete_chapters_for_comic(&self, comic_id: &str) -> Result<u64, ContentError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM chapters WHERE comic_id = ?1", params![comic_id])?;
        Ok(rows as u64)
    }

    async fn list_pages(&self, chapter_id: &str) -> Result<Vec<Page>, ContentError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM pages WHERE chapter_id = ?1 ORDER BY page_number ASC",
            PAGE_COLUMNS
        ))?;
        let pages = stmt
            .query_map(params![chapter_id], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    async fn get_page(&self, id: &str) -> Result<Option<Page>, ContentError> {
        let conn = self.pool.get()?;
        query_page(&conn, id)
    }

    async fn insert_page(&self, page: NewPage) -> Result<Page, ContentError> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();

        conn.execute(
            "INSERT INTO pages (id, chapter_id, image_url, image_key, page_number)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                page.chapter_id,
                page.image_url,
                page.image_key,
                page.page_number
            ],
        )
        .map_err(|e| map_insert_error(e, "page", &format!("chapter {}", page.chapter_id)))?;

        query_page(&conn, &id)?.ok_or_else(|| ContentError::NotFound(format!("page {}", id)))
    }

    async fn set_page_number(&self, id: &str, page_number: i64) -> Result<(), ContentError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE pages SET page_number = ?2 WHERE id = ?1",
            params![id, page_number],
        )?;
        if rows == 0 {
            return Err(ContentError::NotFound(format!("page {}", id)));
        }
        Ok(())
    }

    async fn delete_page(&self, id: &str) -> Result<bool, ContentError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM pages WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    async fn delete_pages_for_chapter(&self, chapter_id: &str) -> Result<u64, ContentError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM pages WHERE chapter_id = ?1",
            params![chapter_id],
        )?;
        Ok(rows as u64)
    }

    async fn list_comments(&self, chapter_id: &str) -> Result<Vec<Comment>, ContentError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, chapter_id, comic_id, username, message, created_at
             FROM comments
             WHERE chapter_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let comments = stmt
            .query_map(params![chapter_id], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, ContentError> {
        let conn = self.pool.get()?;
        let stored = Comment {
            id: uuid::Uuid::now_v7().to_string(),
            chapter_id: comment.chapter_id,
            comic_id: comment.comic_id,
            username: comment.username,
            message: comment.message,
            created_at: now(),
        };

        conn.execute(
            "INSERT INTO comments (id, chapter_id, comic_id, username, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                stored.id,
                stored.chapter_id,
                stored.comic_id,
                stored.username,
                stored.message,
                stored.created_at
            ],
        )?;

        Ok(stored)
    }

    async fn register_user(&self, username: &str) -> Result<User, ContentError> {
        let conn = self.pool.get()?;
        let user = User {
            id: uuid::Uuid::now_v7().to_string(),
            username: username.to_string(),
            created_at: now(),
        };

        conn.execute(
            "INSERT INTO users (id, username, created_at) VALUES (?1, ?2, ?3)",
            params![user.id, user.username, user.created_at],
        )
        .map_err(|e| map_insert_error(e, "Username already taken", "user"))?;

        Ok(user)
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, ContentError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                "SELECT id, username, created_at FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }
}
