// Admin mutation flows: creating and editing comics, chapters and pages.
//
// Every flow validates its input before the first remote call, and uploads
// run one after another so page numbers follow the order files were given in.

use bytes::Bytes;
use thiserror::Error;

use crate::blobs::{key_from_public_url, BlobError, BlobStore, Bucket};
use crate::content::{ContentError, ContentRepository};
use crate::db::models::*;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Blob(#[from] BlobError),
}

/// A file handed to an upload flow.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewComicForm {
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub status: Option<String>,
    /// Comma separated
    pub genres: String,
    pub cover: Option<Upload>,
}

/// Split a comma separated genre list, dropping blanks.
pub fn parse_genres(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(|g| g.trim())
        .filter(|g| !g.is_empty())
        .map(String::from)
        .collect()
}

fn non_blank(value: &str, what: &str) -> Result<String, AdminError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AdminError::Validation(format!("{} cannot be empty", what)));
    }
    Ok(trimmed.to_string())
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let t = v.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

pub async fn create_comic(
    repo: &dyn ContentRepository,
    blobs: &dyn BlobStore,
    form: NewComicForm,
) -> Result<Comic, AdminError> {
    let title = non_blank(&form.title, "Title")?;

    let (cover_url, cover_key) = match form.cover {
        Some(cover) => {
            let stored = blobs
                .store(Bucket::Covers, None, &cover.file_name, cover.data)
                .await?;
            (Some(stored.public_url), Some(stored.key))
        }
        None => (None, None),
    };

    let comic = repo
        .insert_comic(NewComic {
            title,
            description: blank_to_none(form.description),
            cover_url,
            cover_key,
            author: blank_to_none(form.author),
            status: blank_to_none(form.status),
            genres: parse_genres(&form.genres),
        })
        .await?;

    tracing::info!("Created comic {} ({})", comic.id, comic.title);
    Ok(comic)
}

pub async fn update_comic(
    repo: &dyn ContentRepository,
    id: &str,
    mut update: ComicUpdate,
) -> Result<Comic, AdminError> {
    if let Some(title) = update.title.as_deref() {
        update.title = Some(non_blank(title, "Title")?);
    }
    if let Some(genres) = update.genres.take() {
        update.genres = Some(
            genres
                .into_iter()
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect(),
        );
    }
    Ok(repo.update_comic(id, update).await?)
}

/// Insert the chapter row, then upload each file and insert its page in order.
pub async fn create_chapter(
    repo: &dyn ContentRepository,
    blobs: &dyn BlobStore,
    comic_id: &str,
    title: &str,
    chapter_number: i64,
    files: Vec<Upload>,
) -> Result<(Chapter, Vec<Page>), AdminError> {
    let title = non_blank(title, "Chapter title")?;
    if files.is_empty() {
        return Err(AdminError::Validation(
            "A chapter needs at least one page".into(),
        ));
    }

    let chapter = repo
        .insert_chapter(NewChapter {
            comic_id: comic_id.to_string(),
            title,
            chapter_number,
        })
        .await?;

    let pages = upload_pages(repo, blobs, &chapter.id, 0, files).await?;
    tracing::info!(
        "Created chapter {} with {} pages for comic {}",
        chapter.id,
        pages.len(),
        comic_id
    );
    Ok((chapter, pages))
}

/// Upload more pages after the chapter's existing ones.
pub async fn append_pages(
    repo: &dyn ContentRepository,
    blobs: &dyn BlobStore,
    chapter_id: &str,
    files: Vec<Upload>,
) -> Result<Vec<Page>, AdminError> {
    if files.is_empty() {
        return Err(AdminError::Validation("Select images first".into()));
    }
    if repo.get_chapter(chapter_id).await?.is_none() {
        return Err(ContentError::NotFound(format!("chapter {}", chapter_id)).into());
    }

    let start = repo.list_pages(chapter_id).await?.len() as i64;
    upload_pages(repo, blobs, chapter_id, start, files).await
}

async fn upload_pages(
    repo: &dyn ContentRepository,
    blobs: &dyn BlobStore,
    chapter_id: &str,
    start: i64,
    files: Vec<Upload>,
) -> Result<Vec<Page>, AdminError> {
    let mut pages = Vec::with_capacity(files.len());
    for (i, file) in files.into_iter().enumerate() {
        let stored = blobs
            .store(Bucket::Pages, Some(chapter_id), &file.file_name, file.data)
            .await?;
        let page = repo
            .insert_page(NewPage {
                chapter_id: chapter_id.to_string(),
                image_url: stored.public_url,
                image_key: Some(stored.key),
                page_number: start + i as i64 + 1,
            })
            .await?;
        pages.push(page);
    }
    Ok(pages)
}

/// Move the page at `from` to `to` and renumber everything `1..=n`.
pub fn reorder_pages(mut pages: Vec<Page>, from: usize, to: usize) -> Result<Vec<Page>, AdminError> {
    if from >= pages.len() || to >= pages.len() {
        return Err(AdminError::Validation(format!(
            "Cannot move page {} to {} in a chapter of {}",
            from,
            to,
            pages.len()
        )));
    }
    let page = pages.remove(from);
    pages.insert(to, page);
    Ok(renumber(pages))
}

/// Arrange `pages` in the order of `ids`, which must name each page exactly once.
pub fn order_pages_by_ids(pages: Vec<Page>, ids: &[String]) -> Result<Vec<Page>, AdminError> {
    if ids.len() != pages.len() {
        return Err(AdminError::Validation(format!(
            "Expected {} page ids, got {}",
            pages.len(),
            ids.len()
        )));
    }

    let mut remaining = pages;
    let mut ordered = Vec::with_capacity(ids.len());
    for id in ids {
        let idx = remaining
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| AdminError::Validation(format!("Unknown or repeated page {}", id)))?;
        ordered.push(remaining.swap_remove(idx));
    }
    Ok(renumber(ordered))
}

fn renumber(pages: Vec<Page>) -> Vec<Page> {
    pages
        .into_iter()
        .enumerate()
        .map(|(idx, page)| Page {
            page_number: idx as i64 + 1,
            ..page
        })
        .collect()
}

/// Persist the page number of every page, one update at a time.
pub async fn save_page_order(
    repo: &dyn ContentRepository,
    pages: &[Page],
) -> Result<(), AdminError> {
    for page in pages {
        repo.set_page_number(&page.id, page.page_number).await?;
    }
    Ok(())
}

/// Remove one page: blob first, then the row, then close the numbering gap.
pub async fn delete_page(
    repo: &dyn ContentRepository,
    blobs: &dyn BlobStore,
    page_id: &str,
) -> Result<Page, AdminError> {
    let page = repo
        .get_page(page_id)
        .await?
        .ok_or_else(|| ContentError::NotFound(format!("page {}", page_id)))?;

    let key = page
        .image_key
        .clone()
        .or_else(|| key_from_public_url(&page.image_url, Bucket::Pages));
    match key {
        Some(key) => blobs.remove(Bucket::Pages, &[key]).await?,
        None => tracing::warn!("Page {} has no resolvable storage key", page.id),
    }

    repo.delete_page(&page.id).await?;

    let remaining = renumber(repo.list_pages(&page.chapter_id).await?);
    save_page_order(repo, &remaining).await?;
    Ok(page)
}
