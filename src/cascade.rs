// Cascade delete - removes a comic or chapter together with everything that points at it
//
// The datastore has no cascading foreign keys, so dependents are removed here in a
// fixed order: page blobs, page rows, chapter rows, cover blob, comic row. Chapters are
// processed one at a time. There is no rollback; the report records how far it got.

use serde::Serialize;

use crate::blobs::{key_from_public_url, BlobStore, Bucket};
use crate::content::{ContentError, ContentRepository};

/// One step that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum CascadeStep {
    ListedChapters { comic_id: String, count: usize },
    ListedPages { chapter_id: String, count: usize },
    RemovedBlobs { bucket: Bucket, keys: Vec<String> },
    /// The owner has a URL but no storage key could be resolved for it.
    BlobSkipped { bucket: Bucket, owner_id: String, url: String },
    DeletedPages { chapter_id: String, count: u64 },
    DeletedChapters { comic_id: String, count: u64 },
    DeletedChapter { chapter_id: String },
    DeletedComic { comic_id: String },
}

/// A step that failed. Blob failures do not stop the pipeline; row failures do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeFailure {
    pub stage: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub steps: Vec<CascadeStep>,
    pub failures: Vec<CascadeFailure>,
    /// True once the target row itself is gone.
    pub completed: bool,
    /// Set when a comic was deleted, so callers can drop any selection pointing at it.
    pub deleted_comic: Option<String>,
}

impl CascadeReport {
    pub fn is_clean(&self) -> bool {
        self.completed && self.failures.is_empty()
    }

    fn fail(&mut self, stage: impl Into<String>, error: impl ToString) {
        let stage = stage.into();
        let error = error.to_string();
        tracing::error!("Cascade step {} failed: {}", stage, error);
        self.failures.push(CascadeFailure { stage, error });
    }
}

pub struct CascadeDeleter<'a> {
    repo: &'a dyn ContentRepository,
    blobs: &'a dyn BlobStore,
}

impl<'a> CascadeDeleter<'a> {
    pub fn new(repo: &'a dyn ContentRepository, blobs: &'a dyn BlobStore) -> Self {
        Self { repo, blobs }
    }

    pub async fn delete_comic(&self, comic_id: &str) -> Result<CascadeReport, ContentError> {
        let comic = self
            .repo
            .get_comic(comic_id)
            .await?
            .ok_or_else(|| ContentError::NotFound(format!("comic {}", comic_id)))?;

        tracing::info!("Cascade delete of comic {} ({})", comic.id, comic.title);
        let mut report = CascadeReport::default();

        let chapter_ids = match self.repo.chapter_ids_for_comic(&comic.id).await {
            Ok(ids) => ids,
            Err(e) => {
                report.fail(format!("list chapters of {}", comic.id), e);
                return Ok(report);
            }
        };
        report.steps.push(CascadeStep::ListedChapters {
            comic_id: comic.id.clone(),
            count: chapter_ids.len(),
        });

        for chapter_id in &chapter_ids {
            if !self.purge_pages(chapter_id, &mut report).await {
                return Ok(report);
            }
        }

        match self.repo.delete_chapters_for_comic(&comic.id).await {
            Ok(count) => report.steps.push(CascadeStep::DeletedChapters {
                comic_id: comic.id.clone(),
                count,
            }),
            Err(e) => {
                report.fail(format!("delete chapters of {}", comic.id), e);
                return Ok(report);
            }
        }

        if let Some(url) = comic.cover_url.as_deref() {
            let key = comic
                .cover_key
                .clone()
                .or_else(|| key_from_public_url(url, Bucket::Covers));
            match key {
                Some(key) => self.remove_blobs(Bucket::Covers, vec![key], &mut report).await,
                None => skip_blob(&mut report, Bucket::Covers, &comic.id, url),
            }
        }

        match self.repo.delete_comic(&comic.id).await {
            Ok(_) => {
                report.steps.push(CascadeStep::DeletedComic {
                    comic_id: comic.id.clone(),
                });
                report.completed = true;
                report.deleted_comic = Some(comic.id.clone());
            }
            Err(e) => report.fail(format!("delete comic {}", comic.id), e),
        }

        Ok(report)
    }

    pub async fn delete_chapter(&self, chapter_id: &str) -> Result<CascadeReport, ContentError> {
        let chapter = self
            .repo
            .get_chapter(chapter_id)
            .await?
            .ok_or_else(|| ContentError::NotFound(format!("chapter {}", chapter_id)))?;

        tracing::info!("Cascade delete of chapter {}", chapter.id);
        let mut report = CascadeReport::default();

        if !self.purge_pages(&chapter.id, &mut report).await {
            return Ok(report);
        }

        match self.repo.delete_chapter(&chapter.id).await {
            Ok(_) => {
                report.steps.push(CascadeStep::DeletedChapter {
                    chapter_id: chapter.id.clone(),
                });
                report.completed = true;
            }
            Err(e) => report.fail(format!("delete chapter {}", chapter.id), e),
        }

        Ok(report)
    }

    /// Page blobs, then page rows. Returns false if the pipeline must stop.
    async fn purge_pages(&self, chapter_id: &str, report: &mut CascadeReport) -> bool {
        let pages = match self.repo.list_pages(chapter_id).await {
            Ok(pages) => pages,
            Err(e) => {
                report.fail(format!("list pages of {}", chapter_id), e);
                return false;
            }
        };
        report.steps.push(CascadeStep::ListedPages {
            chapter_id: chapter_id.to_string(),
            count: pages.len(),
        });

        let mut keys = Vec::with_capacity(pages.len());
        for page in &pages {
            let key = page
                .image_key
                .clone()
                .or_else(|| key_from_public_url(&page.image_url, Bucket::Pages));
            match key {
                Some(key) => keys.push(key),
                None => skip_blob(report, Bucket::Pages, &page.id, &page.image_url),
            }
        }
        if !keys.is_empty() {
            self.remove_blobs(Bucket::Pages, keys, report).await;
        }

        match self.repo.delete_pages_for_chapter(chapter_id).await {
            Ok(count) => {
                report.steps.push(CascadeStep::DeletedPages {
                    chapter_id: chapter_id.to_string(),
                    count,
                });
                true
            }
            Err(e) => {
                report.fail(format!("delete pages of {}", chapter_id), e);
                false
            }
        }
    }

    async fn remove_blobs(&self, bucket: Bucket, keys: Vec<String>, report: &mut CascadeReport) {
        match self.blobs.remove(bucket, &keys).await {
            Ok(()) => report.steps.push(CascadeStep::RemovedBlobs { bucket, keys }),
            Err(e) => {
                tracing::warn!("Leaving {} orphaned {} blobs", keys.len(), bucket);
                report.fail(format!("remove {} blobs", bucket), e);
            }
        }
    }
}

fn skip_blob(report: &mut CascadeReport, bucket: Bucket, owner_id: &str, url: &str) {
    tracing::warn!("No storage key for {} of {} ({})", bucket, owner_id, url);
    report.steps.push(CascadeStep::BlobSkipped {
        bucket,
        owner_id: owner_id.to_string(),
        url: url.to_string(),
    });
}
